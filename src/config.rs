//! Pipeline configuration
//!
//! Loaded from a TOML file, then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::DEFAULT_BOARD_CELLS;

const DEFAULT_CONFIG_PATH: &str = "drop_token.toml";

pub const DEFAULT_ENDPOINT: &str =
    "https://x37sv76kth.execute-api.us-west-1.amazonaws.com/prod/users";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub outcome: OutcomeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            storage: StorageConfig::default(),
            outcome: OutcomeConfig::default(),
        }
    }
}

/// Remote paginated source and retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Key prefix for stored pages (`{prefix}/{page}.json`)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_key_prefix() -> String {
    "players".to_string()
}

fn default_initial_backoff_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    8
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            key_prefix: default_key_prefix(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl IngestConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Object store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Filesystem root standing in for the object store
    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Key the derived game facts are written to
    #[serde(default = "default_facts_key")]
    pub facts_key: String,
}

fn default_bucket() -> String {
    "9dt".to_string()
}

fn default_store_root() -> PathBuf {
    PathBuf::from("./object_store")
}

fn default_facts_key() -> String {
    "games_f/games.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            root: default_store_root(),
            facts_key: default_facts_key(),
        }
    }
}

/// Outcome derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeConfig {
    /// Moves dataset (CSV with header). Derivation is skipped when unset.
    #[serde(default)]
    pub moves_csv: Option<PathBuf>,

    /// Cells on the board; a consistent draw fills every one of them
    #[serde(default = "default_board_cells")]
    pub board_cells: u32,

    /// Reject games where a player moves twice in a row instead of
    /// trusting the parity rule
    #[serde(default)]
    pub strict_alternation: bool,
}

fn default_board_cells() -> u32 {
    DEFAULT_BOARD_CELLS
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            moves_csv: None,
            board_cells: default_board_cells(),
            strict_alternation: false,
        }
    }
}

impl PipelineConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// TOML file from `DROP_TOKEN_CONFIG` (or defaults), then env overrides.
    ///
    /// Only a missing file falls back to defaults; a file that exists but
    /// does not parse is a config error.
    pub fn from_env() -> Result<Self, PipelineError> {
        let path = std::env::var("DROP_TOKEN_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::load(&path)
                .map_err(|e| PipelineError::Config(format!("{}: {:#}", path, e)))?
        } else {
            tracing::debug!(path = %path, "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), PipelineError> {
        if let Ok(v) = std::env::var("DROP_TOKEN_ENDPOINT") {
            self.ingest.endpoint = v;
        }
        if let Some(secs) = env_parse("DROP_TOKEN_INITIAL_BACKOFF_SECS")? {
            self.ingest.initial_backoff_secs = secs;
        }
        if let Some(secs) = env_parse("DROP_TOKEN_MAX_BACKOFF_SECS")? {
            self.ingest.max_backoff_secs = secs;
        }
        if let Some(secs) = env_parse("DROP_TOKEN_HTTP_TIMEOUT_SECS")? {
            self.ingest.http_timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("DROP_TOKEN_BUCKET") {
            self.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("DROP_TOKEN_STORE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DROP_TOKEN_MOVES_CSV") {
            self.outcome.moves_csv = Some(PathBuf::from(v));
        }
        if let Some(cells) = env_parse("DROP_TOKEN_BOARD_CELLS")? {
            self.outcome.board_cells = cells;
        }
        if let Ok(v) = std::env::var("DROP_TOKEN_STRICT_ALTERNATION") {
            self.outcome.strict_alternation = parse_flag(&v).ok_or_else(|| {
                PipelineError::Config(format!(
                    "DROP_TOKEN_STRICT_ALTERNATION: expected a boolean, got {:?}",
                    v
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let ingest = &self.ingest;
        if ingest.initial_backoff_secs == 0 || ingest.max_backoff_secs == 0 {
            return Err(PipelineError::Config(
                "backoff values must be positive".into(),
            ));
        }
        if ingest.initial_backoff_secs > ingest.max_backoff_secs {
            return Err(PipelineError::Config(format!(
                "initial backoff {}s exceeds max backoff {}s",
                ingest.initial_backoff_secs, ingest.max_backoff_secs
            )));
        }
        if ingest.endpoint.trim().is_empty() {
            return Err(PipelineError::Config("endpoint is empty".into()));
        }
        if self.outcome.board_cells < 2 {
            return Err(PipelineError::Config(format!(
                "board must have at least 2 cells, got {}",
                self.outcome.board_cells
            )));
        }
        Ok(())
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>, PipelineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PipelineError::Config(format!("{}: {:?} ({})", name, v, e))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
