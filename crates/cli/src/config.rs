//! Configuration loading from porelog.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use storage::PipelineConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Where stored events and metrics live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Batch size, automatic dumps, dump format.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Where dump files are written.
    #[serde(default)]
    pub dump: DumpConfig,

    /// Polling timer used by `simulate`.
    #[serde(default)]
    pub poll: PollConfig,
}

/// Which key-value backend holds stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite file that survives restarts.
    #[default]
    Local,
    /// In-memory SQLite, gone when the process exits.
    Session,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Database file for the local backend. Defaults to the user data dir.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct DumpConfig {
    #[serde(default = "default_dump_dir")]
    pub dir: PathBuf,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            dir: default_dump_dir(),
        }
    }
}

fn default_dump_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Metric type recorded on each tick.
    #[serde(default = "default_metric")]
    pub metric: String,

    /// Value recorded on each tick.
    #[serde(default = "default_value")]
    pub value: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            metric: default_metric(),
            value: default_value(),
        }
    }
}

fn default_interval_ms() -> u64 {
    63
}

fn default_metric() -> String {
    "test".to_string()
}

fn default_value() -> f64 {
    100.0
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll.interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::DumpFormat;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.storage.backend, Backend::Local);
        assert!(config.storage.path.is_none());
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.dump.dir, PathBuf::from("."));
        assert_eq!(config.poll.interval_ms, 63);
        assert_eq!(config.poll.metric, "test");
        assert_eq!(config.poll.value, 100.0);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[storage]
backend = "session"

[pipeline]
batch_size = 50
auto_dump = true
format = "parsed"

[dump]
dir = "/tmp/dumps"

[poll]
interval_ms = 250
metric = "current"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.storage.backend, Backend::Session);
        assert_eq!(config.pipeline.batch_size, 50);
        assert!(config.pipeline.auto_dump);
        assert_eq!(config.pipeline.max_stored_items, 30);
        assert_eq!(config.pipeline.format, DumpFormat::Parsed);
        assert_eq!(config.dump.dir, PathBuf::from("/tmp/dumps"));
        assert_eq!(config.poll.interval_ms, 250);
        assert_eq!(config.poll.metric, "current");
        assert_eq!(config.poll.value, 100.0);
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = Config::parse("[storage]\nbackend = \"cloud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let err = Config::parse("[pipeline]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let err = Config::parse("[poll]\ninterval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("porelog.toml");
        std::fs::write(&path, "[storage]\npath = \"data/store.db\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.path, Some(PathBuf::from("data/store.db")));
    }
}
