//! Event and metric storage for the instrument control panel.
//!
//! The control panel produces two kinds of telemetry: events, such as a
//! voltage change request and the controller's reply, and metrics, a steady
//! stream of sampled readings. This crate keeps both in a string key-value
//! store until an operator dumps them to a JSON file.
//!
//! # Overview
//!
//! - **Events** are written through immediately, one entry per event.
//! - **Metrics** collect in memory and are written as one batch every
//!   `batch_size` samples (1000 by default).
//! - **Counters** (`eventCount`, `metricCount`) hold the next free index of
//!   each namespace, so entries live at `event-0..eventCount` and
//!   `metric-0..metricCount`.
//! - **Dumps** export every stored entry into one file, then remove the
//!   entries and reset both counters.
//!
//! # Core Concepts
//!
//! ## KeyValueStore
//!
//! The [`KeyValueStore`] trait is the persistence boundary. [`SqliteStore`]
//! is the real backend, either file-backed (persists across runs) or in
//! memory (lives for the session). [`MemoryStore`] is a plain map with an
//! optional byte quota.
//!
//! ## Pipeline
//!
//! The [`Pipeline`] owns a store, a [`DumpSink`], and the metric buffer.
//! [`SharedPipeline`] wraps it for use from several threads or tasks.
//!
//! # Example
//!
//! ```no_run
//! use storage::{DirectorySink, Pipeline, SqliteStore};
//!
//! let store = SqliteStore::open("store.db")?;
//! let mut pipeline = Pipeline::new(store, DirectorySink::new("dumps"));
//!
//! pipeline.store_event("click", Some("/setVoltage?value=0.5"), "ok")?;
//! pipeline.store_metric("current", 1.25)?;
//!
//! let status = pipeline.status()?;
//! println!("{} events, {} buffered", status.events, status.buffered_metrics);
//!
//! let file = pipeline.dump(storage::now_millis())?;
//! println!("wrote {}", file.name);
//! # Ok::<(), storage::Error>(())
//! ```

mod config;
pub mod counters;
pub mod dump;
mod error;
mod kv;
mod pipeline;
mod record;
mod shared;
mod store;

pub use config::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_STORED_ITEMS, DumpFormat, PipelineConfig};
pub use dump::{DirectorySink, DumpFile, DumpSink};
pub use error::{Error, Result};
pub use kv::{KeyValueStore, MemoryStore};
pub use pipeline::{Pipeline, Status};
pub use record::{Event, Metric, MetricBatch, Namespace, Timestamp, now_millis};
pub use shared::SharedPipeline;
pub use store::SqliteStore;
