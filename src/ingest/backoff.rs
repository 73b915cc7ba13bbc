//! Doubling backoff with a hard cap
//!
//! Starting at `initial`, each failure yields the current delay and doubles it.
//! Once the doubled delay passes `max` the budget is spent: with 1s/8s that is
//! sleeps of 1, 2, 4, 8 and then give up.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffStep {
    /// How long to wait before the next attempt
    pub delay: Duration,
    /// No further attempt may be made after this wait
    pub exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    #[inline]
    pub fn current(&self) -> Duration {
        self.current
    }

    #[inline]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Back to the initial delay after a successful page
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Yield the current delay and double it.
    ///
    /// The step that spends the budget still carries its delay: the loop
    /// waits that long (8s with the defaults) before giving up, with no
    /// attempt after it.
    pub fn next_step(&mut self) -> BackoffStep {
        let delay = self.current;
        self.current = self.current.saturating_mul(2);
        BackoffStep {
            delay,
            exhausted: self.current > self.max,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_doubles_until_cap() {
        let mut backoff = Backoff::default();
        let steps: Vec<(u64, bool)> = (0..4)
            .map(|_| {
                let step = backoff.next_step();
                (step.delay.as_secs(), step.exhausted)
            })
            .collect();
        assert_eq!(steps, vec![(1, false), (2, false), (4, false), (8, true)]);
    }

    #[test]
    fn test_reset_restores_initial() {
        let mut backoff = Backoff::default();
        backoff.next_step();
        backoff.next_step();
        assert_eq!(backoff.current(), Duration::from_secs(4));
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(1));
    }

    #[test]
    fn test_initial_equal_to_cap_allows_one_wait() {
        let mut backoff = Backoff::new(Duration::from_secs(8), Duration::from_secs(8));
        let step = backoff.next_step();
        assert_eq!(step.delay, Duration::from_secs(8));
        assert!(step.exhausted);
    }
}
