//! Per-game outcome facts derived from the move dataset

pub mod derive;
pub mod moves_csv;

pub use derive::{derive, derive_game, DeriveOptions, Derivation};
pub use moves_csv::{parse_moves_csv, read_moves_csv};

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::info;

use crate::models::GameFact;
use crate::storage::ObjectSink;

/// Serialize facts as NDJSON, one game per line
pub fn facts_to_ndjson(facts: &[GameFact]) -> Result<String> {
    let lines = facts
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to serialize game facts")?;
    Ok(lines.join("\n"))
}

pub async fn write_facts(
    sink: &dyn ObjectSink,
    bucket: &str,
    key: &str,
    facts: &[GameFact],
) -> Result<()> {
    let body = facts_to_ndjson(facts)?;
    sink.put(bucket, key, Bytes::from(body))
        .await
        .with_context(|| format!("Failed to write game facts to {}/{}", bucket, key))?;
    info!(bucket, key, games = facts.len(), "Game facts written");
    Ok(())
}
