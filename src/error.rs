//! Pipeline error kinds
//!
//! Transient fetch failures are recovered inside the ingestion loop. Every
//! other kind surfaces to the caller and names the page or game it concerns.

/// Why a single fetch attempt did not produce a usable page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Upstream answered with a non-success status (throttling, 5xx, ...)
    Status(u16),
    /// The request never produced a response (connect, timeout, body read)
    Transport(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "status {}", code),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Retryable fetch failure for a page
    TransientFetch { page: u32, failure: FetchFailure },
    /// Backoff cap exceeded while retrying a page; fatal to the run
    RetryExhausted {
        page: u32,
        attempts: u32,
        last_failure: FetchFailure,
    },
    /// A 200 response whose body is not a JSON array
    MalformedPage { page: u32, reason: String },
    /// Move data violates a per-game invariant
    MalformedGame { game_id: String, reason: String },
    /// Sink write failed
    Storage { key: String, reason: String },
    /// Invalid configuration value
    Config(String),
}

impl PipelineError {
    pub fn malformed_game(game_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedGame {
            game_id: game_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Only transient fetch failures are recovered by the backoff loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetch { .. })
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransientFetch { page, failure } => {
                write!(f, "transient fetch failure at page {}: {}", page, failure)
            }
            Self::RetryExhausted {
                page,
                attempts,
                last_failure,
            } => write!(
                f,
                "exceeded retry limit at page {} after {} attempts (last: {})",
                page, attempts, last_failure
            ),
            Self::MalformedPage { page, reason } => {
                write!(f, "malformed page {}: {}", page, reason)
            }
            Self::MalformedGame { game_id, reason } => {
                write!(f, "malformed game {}: {}", game_id, reason)
            }
            Self::Storage { key, reason } => write!(f, "storage write to {} failed: {}", key, reason),
            Self::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
