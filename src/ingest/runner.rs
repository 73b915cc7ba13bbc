//! Ingestion state machine
//!
//! One fetch in flight at a time. The loop ends on the first empty page, or
//! fails once the backoff budget for a single page is spent. Pages stored
//! before a failure stay stored.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::backoff::Backoff;
use super::fetch::PageFetcher;
use super::ndjson;
use crate::config::IngestConfig;
use crate::error::{FetchFailure, PipelineError};
use crate::models::Page;
use crate::storage::ObjectSink;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Outcome of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Non-empty page written; the loop moves to the next page
    Stored {
        page: u32,
        key: String,
        records: usize,
    },
    /// Attempt failed; slept `delay` and will retry the same page
    Retrying {
        page: u32,
        failure: FetchFailure,
        delay: Duration,
    },
    /// Empty page received; nothing more to fetch
    Finished { page: u32 },
}

/// Loop state, threaded through every step
#[derive(Debug, Clone)]
pub struct IngestState {
    pub page: u32,
    pub backoff: Backoff,
    /// Failed attempts on the current page
    pub attempts: u32,
    pub pages_written: u32,
    pub records_written: u64,
    pub retries: u32,
    pub finished: bool,
}

impl IngestState {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            page: 0,
            backoff,
            attempts: 0,
            pages_written: 0,
            records_written: 0,
            retries: 0,
            finished: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_written: u32,
    pub records_written: u64,
    pub retries: u32,
    /// Index of the empty page that ended the run
    pub last_page: u32,
}

pub struct IngestLoop<'a> {
    fetcher: &'a dyn PageFetcher,
    sink: &'a dyn ObjectSink,
    sleeper: &'a dyn Sleeper,
    bucket: String,
    key_prefix: String,
    state: IngestState,
    run_id: Uuid,
}

impl<'a> IngestLoop<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        sink: &'a dyn ObjectSink,
        sleeper: &'a dyn Sleeper,
        bucket: impl Into<String>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            fetcher,
            sink,
            sleeper,
            bucket: bucket.into(),
            key_prefix: config.key_prefix.trim_end_matches('/').to_string(),
            state: IngestState::new(Backoff::new(
                config.initial_backoff(),
                config.max_backoff(),
            )),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn page_key(&self, page: u32) -> String {
        format!("{}/{}.json", self.key_prefix, page)
    }

    /// Drive the loop until the empty page or a fatal error
    pub async fn run(&mut self) -> Result<IngestSummary, PipelineError> {
        let started_at = Utc::now();
        info!(
            run_id = %self.run_id,
            bucket = %self.bucket,
            start_page = self.state.page,
            "Starting paginated ingestion"
        );

        loop {
            if let Step::Finished { .. } = self.step().await? {
                break;
            }
        }

        let summary = IngestSummary {
            run_id: self.run_id,
            started_at,
            finished_at: Utc::now(),
            pages_written: self.state.pages_written,
            records_written: self.state.records_written,
            retries: self.state.retries,
            last_page: self.state.page,
        };
        info!(
            run_id = %summary.run_id,
            pages = summary.pages_written,
            records = summary.records_written,
            retries = summary.retries,
            "Ingestion complete"
        );
        Ok(summary)
    }

    /// One fetch attempt and its transition
    pub async fn step(&mut self) -> Result<Step, PipelineError> {
        let page = self.state.page;
        if self.state.finished {
            return Ok(Step::Finished { page });
        }

        let failure = match self.fetcher.fetch_page(page).await {
            Ok(resp) => match ndjson::parse_page(&resp.body) {
                // An empty array ends the data regardless of status.
                Ok(records) if records.is_empty() => {
                    self.state.finished = true;
                    info!(page, status = resp.status, "Last page of results received");
                    return Ok(Step::Finished { page });
                }
                Ok(records) if resp.is_success() => {
                    return self.store_page(Page::new(page, records)).await;
                }
                Err(e) if resp.is_success() => {
                    error!(page, error = %e, "Success response without a JSON array body");
                    return Err(PipelineError::MalformedPage {
                        page,
                        reason: e.to_string(),
                    });
                }
                _ => FetchFailure::Status(resp.status),
            },
            Err(failure) => failure,
        };

        self.retry(page, failure).await
    }

    async fn store_page(&mut self, page: Page) -> Result<Step, PipelineError> {
        let key = self.page_key(page.index);
        let body = ndjson::records_to_ndjson(&page.records);

        self.sink
            .put(&self.bucket, &key, Bytes::from(body))
            .await
            .map_err(|e| {
                error!(page = page.index, key = %key, error = %e, "Storage write failed");
                PipelineError::Storage {
                    key: key.clone(),
                    reason: format!("{:#}", e),
                }
            })?;

        let records = page.len();
        self.state.backoff.reset();
        self.state.attempts = 0;
        self.state.pages_written += 1;
        self.state.records_written += records as u64;
        self.state.page += 1;

        info!(page = page.index, key = %key, records, "Success writing results page {}", page.index);
        Ok(Step::Stored {
            page: page.index,
            key,
            records,
        })
    }

    async fn retry(&mut self, page: u32, failure: FetchFailure) -> Result<Step, PipelineError> {
        let step = self.state.backoff.next_step();
        self.state.attempts += 1;

        warn!(
            page,
            %failure,
            attempt = self.state.attempts,
            backoff_secs = step.delay.as_secs_f64(),
            "Fetch failed; waiting before retry"
        );
        self.sleeper.sleep(step.delay).await;

        if step.exhausted {
            error!(page, attempts = self.state.attempts, "Exceeded retry limit at page {}, exiting", page);
            return Err(PipelineError::RetryExhausted {
                page,
                attempts: self.state.attempts,
                last_failure: failure,
            });
        }

        self.state.retries += 1;
        Ok(Step::Retrying {
            page,
            failure,
            delay: step.delay,
        })
    }
}
