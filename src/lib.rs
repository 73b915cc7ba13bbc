//! Drop-token ETL
//!
//! Pulls paginated player records into an object store as NDJSON and derives
//! per-game outcome facts from the move-level dataset.

pub mod analytics;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod outcome;
pub mod storage;

pub use config::PipelineConfig;
pub use error::{FetchFailure, PipelineError};
pub use models::{GameFact, GameResult, MoveRecord, Page, PlayerDim};
