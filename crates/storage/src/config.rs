//! Pipeline tuning knobs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of metrics buffered before a batch is flushed.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Stored entries (events plus metric batches) that trigger an automatic dump.
pub const DEFAULT_MAX_STORED_ITEMS: u64 = 30;

/// How persisted entries appear inside a dump file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// Each entry is the stored JSON text, embedded as a string.
    #[default]
    Raw,
    /// Each entry is parsed and embedded as a JSON object.
    Parsed,
}

/// Pipeline configuration, usually the `[pipeline]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Dump automatically once `max_stored_items` entries are persisted.
    #[serde(default)]
    pub auto_dump: bool,

    #[serde(default = "default_max_stored_items")]
    pub max_stored_items: u64,

    #[serde(default)]
    pub format: DumpFormat,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_stored_items() -> u64 {
    DEFAULT_MAX_STORED_ITEMS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            auto_dump: false,
            max_stored_items: DEFAULT_MAX_STORED_ITEMS,
            format: DumpFormat::Raw,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.max_stored_items == 0 {
            return Err(Error::InvalidConfig(
                "max_stored_items must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
