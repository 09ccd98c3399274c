//! Dump files and the sinks that receive them.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::{DumpFormat, Result, Timestamp};

/// A finished dump, ready to be written somewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpFile {
    pub name: String,
    pub contents: String,
    pub events: u64,
    pub metrics: u64,
}

/// Destination for dump files.
pub trait DumpSink {
    fn write(&mut self, file: &DumpFile) -> Result<()>;
}

/// Keeps dumps in memory.
impl DumpSink for Vec<DumpFile> {
    fn write(&mut self, file: &DumpFile) -> Result<()> {
        self.push(file.clone());
        Ok(())
    }
}

/// Writes each dump into a directory.
///
/// Files are written to a `.tmp` sibling, synced, then renamed into place, so
/// a crash never leaves a half-written dump under its final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DumpSink for DirectorySink {
    fn write(&mut self, file: &DumpFile) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&file.name);
        let temp_path = path.with_extension("tmp");

        let mut out = File::create(&temp_path)?;
        out.write_all(file.contents.as_bytes())?;
        out.sync_all()?;
        fs::rename(&temp_path, &path)?;

        tracing::info!(path = %path.display(), "Wrote dump file");
        Ok(())
    }
}

/// `dump_<n>_events_<events>_metrics<metrics>_ts_<ts>.json`
///
/// There is no underscore between `metrics` and its count; existing tooling
/// matches on this exact shape.
pub fn file_name(dump_number: u64, events: u64, metrics: u64, timestamp: Timestamp) -> String {
    format!("dump_{dump_number}_events_{events}_metrics{metrics}_ts_{timestamp}.json")
}

#[derive(Serialize)]
struct Document {
    events: Vec<Value>,
    metrics: Vec<Value>,
}

/// Serialize stored entries into the dump document.
///
/// Entries are the raw stored strings in index order; `None` marks an index
/// with nothing stored and is written as `null`. In the parsed format an entry
/// that is not valid JSON is kept as its raw string.
pub(crate) fn render(
    events: Vec<Option<String>>,
    metrics: Vec<Option<String>>,
    format: DumpFormat,
) -> Result<String> {
    let document = Document {
        events: entries(events, format),
        metrics: entries(metrics, format),
    };
    Ok(serde_json::to_string(&document)?)
}

fn entries(raw: Vec<Option<String>>, format: DumpFormat) -> Vec<Value> {
    raw.into_iter()
        .map(|entry| match (entry, format) {
            (None, _) => Value::Null,
            (Some(text), DumpFormat::Raw) => Value::String(text),
            (Some(text), DumpFormat::Parsed) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored entry is not JSON, dumping it as text");
                    Value::String(text)
                }
            },
        })
        .collect()
}
