use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub ingest: IngestConfig,
    pub snapshots: SnapshotConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Shared secret the sorting device must present on every batch.
    pub api_key: String,
    #[serde(default = "default_max_recent_events")]
    pub max_recent_events: i64,
    #[serde(default = "default_daily_series_cap")]
    pub daily_series_cap: i64,
}

fn default_max_recent_events() -> i64 {
    50
}
fn default_daily_series_cap() -> i64 {
    90
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    /// Directory the static dashboard reads totals.json / daily.json /
    /// events.json from.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Append-only operational log. When absent or unopenable the log goes
    /// to stderr instead.
    pub path: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.ingest.api_key.trim().is_empty() {
        anyhow::bail!("ingest.api_key must not be empty");
    }

    if config.ingest.max_recent_events < 1 {
        anyhow::bail!("ingest.max_recent_events must be >= 1");
    }

    if config.ingest.daily_series_cap < 1 {
        anyhow::bail!("ingest.daily_series_cap must be >= 1");
    }

    Ok(config)
}
