//! Thread-safe handle to a pipeline.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::{DumpFile, DumpSink, KeyValueStore, Pipeline, Result, Status, Timestamp};

/// A cloneable handle that serializes every operation on one [`Pipeline`].
///
/// Counter updates are read-modify-write against the store, and a dump reads,
/// exports, and clears in several steps. Holding the lock for the whole call
/// keeps concurrent callers from losing updates or dropping entries mid-dump.
pub struct SharedPipeline<S, D> {
    inner: Arc<Mutex<Pipeline<S, D>>>,
}

impl<S, D> Clone for SharedPipeline<S, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyValueStore, D: DumpSink> SharedPipeline<S, D> {
    pub fn new(pipeline: Pipeline<S, D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    pub fn store_event(&self, kind: &str, url: Option<&str>, value: &str) -> Result<()> {
        self.inner.lock().store_event(kind, url, value)
    }

    pub fn store_metric(&self, kind: &str, value: f64) -> Result<()> {
        self.inner.lock().store_metric(kind, value)
    }

    pub fn flush(&self) -> Result<bool> {
        self.inner.lock().flush()
    }

    pub fn dump(&self, timestamp: Timestamp) -> Result<DumpFile> {
        self.inner.lock().dump(timestamp)
    }

    pub fn status(&self) -> Result<Status> {
        self.inner.lock().status()
    }

    /// Lock the pipeline for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, Pipeline<S, D>> {
        self.inner.lock()
    }
}

impl<S: KeyValueStore, D: DumpSink> From<Pipeline<S, D>> for SharedPipeline<S, D> {
    fn from(pipeline: Pipeline<S, D>) -> Self {
        Self::new(pipeline)
    }
}
