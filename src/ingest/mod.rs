//! Paginated ingestion
//!
//! Pages are pulled one at a time from the upstream API, flattened into
//! newline-delimited JSON, and written to the object store as
//! `{prefix}/{page}.json`. Throttling and transport failures are absorbed by
//! a doubling backoff with a hard cap.

pub mod backoff;
pub mod fetch;
pub mod ndjson;
pub mod runner;

pub use backoff::{Backoff, BackoffStep};
pub use fetch::{FetchResponse, HttpPageFetcher, PageFetcher};
pub use runner::{IngestLoop, IngestState, IngestSummary, Sleeper, Step, TokioSleeper};
