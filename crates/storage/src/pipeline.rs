//! The event/metric pipeline.

use tracing::{debug, info, warn};

use crate::dump::{self, DumpFile, DumpSink};
use crate::{
    Event, KeyValueStore, Metric, MetricBatch, Namespace, PipelineConfig, Result, Timestamp,
    counters, now_millis,
};

/// Snapshot of the pipeline's counters, as shown on the status panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    /// Dumps taken by this pipeline instance.
    pub dumps: u64,
    /// Events currently persisted.
    pub events: u64,
    /// Metric batches currently persisted.
    pub metric_batches: u64,
    /// Metrics waiting in memory for the next flush.
    pub buffered_metrics: usize,
}

/// Buffers metrics, persists events and batches, and dumps them to a sink.
///
/// Events are written through immediately. Metrics collect in memory and are
/// written as one [`MetricBatch`] once `batch_size` of them have arrived.
/// Unflushed metrics are lost if the pipeline is dropped.
pub struct Pipeline<S, D> {
    store: S,
    sink: D,
    config: PipelineConfig,
    buffer: Vec<Metric>,
    dumps: u64,
    clock: fn() -> Timestamp,
}

impl<S: KeyValueStore, D: DumpSink> Pipeline<S, D> {
    /// Create a pipeline with the default configuration.
    pub fn new(store: S, sink: D) -> Self {
        let config = PipelineConfig::default();
        Self {
            store,
            sink,
            buffer: Vec::with_capacity(config.batch_size),
            config,
            dumps: 0,
            clock: now_millis,
        }
    }

    /// Create a pipeline with an explicit configuration.
    pub fn with_config(store: S, sink: D, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            sink,
            buffer: Vec::with_capacity(config.batch_size),
            config,
            dumps: 0,
            clock: now_millis,
        })
    }

    /// Replace the wall clock used to stamp records.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    /// Persist an event immediately.
    pub fn store_event(&mut self, kind: &str, url: Option<&str>, value: &str) -> Result<()> {
        let event = Event::new((self.clock)(), kind, url.map(str::to_string), value);
        let index = self
            .store
            .append(Namespace::Event, &serde_json::to_string(&event)?)?;
        debug!(index, kind, "Stored event");

        self.maybe_auto_dump();
        Ok(())
    }

    /// Buffer a metric sample, flushing once the buffer is full.
    pub fn store_metric(&mut self, kind: &str, value: f64) -> Result<()> {
        self.buffer.push(Metric::new((self.clock)(), kind, value));
        if self.buffer.len() < self.config.batch_size {
            return Ok(());
        }
        self.flush()?;
        self.maybe_auto_dump();
        Ok(())
    }

    /// Write buffered metrics as one batch.
    ///
    /// Returns `false` without writing anything when the buffer is empty. If
    /// the write fails the metrics stay buffered.
    pub fn flush(&mut self) -> Result<bool> {
        if self.buffer.is_empty() {
            return Ok(false);
        }

        let batch = MetricBatch {
            value: std::mem::take(&mut self.buffer),
        };
        match self.persist_batch(&batch) {
            Ok(index) => {
                info!(index, metrics = batch.value.len(), "Flushed metrics to storage");
                self.buffer.reserve(self.config.batch_size);
                Ok(true)
            }
            Err(e) => {
                self.buffer = batch.value;
                Err(e)
            }
        }
    }

    fn persist_batch(&mut self, batch: &MetricBatch) -> Result<u64> {
        self.store
            .append(Namespace::Metric, &serde_json::to_string(batch)?)
    }

    /// Export everything persisted to the sink, then clear it.
    ///
    /// Buffered metrics are flushed first so they are part of the dump. If the
    /// sink fails nothing is cleared.
    pub fn dump(&mut self, timestamp: Timestamp) -> Result<DumpFile> {
        self.flush()?;

        let events = counters::count(&self.store, Namespace::Event)?;
        let metrics = counters::count(&self.store, Namespace::Metric)?;
        info!(events, metrics, "Dumping stored items");

        let event_entries = self.read_range(Namespace::Event, events)?;
        let metric_entries = self.read_range(Namespace::Metric, metrics)?;
        let file = DumpFile {
            name: dump::file_name(self.dumps, events, metrics, timestamp),
            contents: dump::render(event_entries, metric_entries, self.config.format)?,
            events,
            metrics,
        };

        self.sink.write(&file)?;
        self.dumps += 1;

        self.store.clear(Namespace::Metric, metrics)?;
        self.store.clear(Namespace::Event, events)?;
        info!(file = %file.name, "Dump complete");

        Ok(file)
    }

    fn read_range(&self, ns: Namespace, count: u64) -> Result<Vec<Option<String>>> {
        (0..count)
            .map(|index| {
                let key = ns.entry_key(index);
                let entry = self.store.get(&key)?;
                if entry.is_none() {
                    warn!(%key, "Counted entry missing from storage");
                }
                Ok(entry)
            })
            .collect()
    }

    /// Dump if automatic dumps are on and the store is full enough.
    ///
    /// The write that triggered the check has already succeeded, so a failed
    /// dump is logged rather than reported to the caller.
    fn maybe_auto_dump(&mut self) {
        if !self.config.auto_dump {
            return;
        }
        if let Err(e) = self.auto_dump() {
            warn!(error = %e, "Automatic dump failed");
        }
    }

    fn auto_dump(&mut self) -> Result<()> {
        let stored = self.event_count()? + self.metric_count()?;
        if stored >= self.config.max_stored_items {
            info!(
                stored,
                max = self.config.max_stored_items,
                "Stored items exceed max threshold"
            );
            self.dump((self.clock)())?;
        }
        Ok(())
    }

    pub fn event_count(&self) -> Result<u64> {
        counters::count(&self.store, Namespace::Event)
    }

    pub fn metric_count(&self) -> Result<u64> {
        counters::count(&self.store, Namespace::Metric)
    }

    /// Metrics waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Dumps taken since this pipeline was created.
    pub fn dumps(&self) -> u64 {
        self.dumps
    }

    pub fn status(&self) -> Result<Status> {
        Ok(Status {
            dumps: self.dumps,
            events: self.event_count()?,
            metric_batches: self.metric_count()?,
            buffered_metrics: self.buffer.len(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }
}
