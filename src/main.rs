//! drop-token-etl
//!
//! 1. Page through the players API into `<bucket>/players/{page}.json`
//! 2. When a moves dataset is configured, derive per-game facts, write them
//!    to `<bucket>/games_f/games.json`, and publish the analytics report
//!
//! Configuration comes from `drop_token.toml` (or `DROP_TOKEN_CONFIG`) and
//! `DROP_TOKEN_*` environment variables; `.env` files are honoured.

use anyhow::{Context, Result};
use bytes::Bytes;
use dotenv::dotenv;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drop_token_etl::{
    analytics::{self, AnalyticsReport},
    config::PipelineConfig,
    ingest::{HttpPageFetcher, IngestLoop, TokioSleeper},
    outcome::{self, DeriveOptions},
    storage::{LocalObjectStore, ObjectSink},
};

const REPORT_KEY: &str = "analytics/report.json";

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = PipelineConfig::from_env()?;
    info!(
        endpoint = %config.ingest.endpoint,
        bucket = %config.storage.bucket,
        root = ?config.storage.root,
        "🚀 drop-token ETL starting"
    );

    let store = LocalObjectStore::new(&config.storage.root);
    let fetcher = HttpPageFetcher::new(&config.ingest.endpoint, config.ingest.http_timeout())?;
    let sleeper = TokioSleeper;

    let mut ingest = IngestLoop::new(
        &fetcher,
        &store,
        &sleeper,
        &config.storage.bucket,
        &config.ingest,
    );
    let ingested = ingest.run().await;
    match ingested {
        Ok(summary) => info!(
            pages = summary.pages_written,
            records = summary.records_written,
            "✅ Player ingestion finished"
        ),
        Err(e) => {
            error!(
                error = %e,
                pages_kept = ingest.state().pages_written,
                "❌ Player ingestion aborted"
            );
            return Err(e.into());
        }
    }

    let Some(moves_path) = config.outcome.moves_csv.as_ref() else {
        info!("No moves dataset configured; skipping outcome derivation");
        return Ok(());
    };

    let moves = outcome::read_moves_csv(moves_path)?;
    info!(moves = moves.len(), path = ?moves_path, "Moves dataset loaded");

    let derivation = outcome::derive(&moves, &DeriveOptions::from(&config.outcome));
    info!(
        games = derivation.facts.len(),
        rejected = derivation.failures.len(),
        inconsistent_draws = derivation.inconsistent_draws().count(),
        "🎲 Game outcomes derived"
    );

    outcome::write_facts(
        &store,
        &config.storage.bucket,
        &config.storage.facts_key,
        &derivation.facts,
    )
    .await?;

    let prefix = format!("{}/", config.ingest.key_prefix.trim_end_matches('/'));
    let players = analytics::load_players(&store, &config.storage.bucket, &prefix).await?;
    let report = AnalyticsReport::build(&derivation.facts, &players);
    let body = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    store
        .put(&config.storage.bucket, REPORT_KEY, Bytes::from(body))
        .await?;

    info!(
        players = players.len(),
        single_game_players = report.single_game_players.len(),
        nationalities = report.games_by_nationality.len(),
        key = REPORT_KEY,
        "📊 Analytics report written"
    );
    Ok(())
}

fn load_env() {
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drop_token_etl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
