//! String key-value persistence.

use std::collections::HashMap;

use crate::counters::parse_count;
use crate::{Error, Namespace, Result};

/// A string-keyed, string-valued store.
///
/// This is the only surface the pipeline touches for durable state, so any
/// backend that can hold strings by key can be plugged in.
pub trait KeyValueStore {
    /// Read the value stored at `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` at `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Add one to the count stored at `key` and return the new count.
    ///
    /// A missing or unparsable value counts as zero. The default is a plain
    /// read-modify-write; backends that can do better override it.
    fn increment(&mut self, key: &str) -> Result<u64> {
        let next = self.get(key)?.as_deref().map(parse_count).unwrap_or(0) + 1;
        self.set(key, &next.to_string())?;
        Ok(next)
    }

    /// Store `value` at the next free index of `ns` and advance its count.
    ///
    /// Returns the index written. The default reads the count, writes the
    /// entry, then writes the new count as separate steps; backends shared
    /// between writers override it to do all three atomically.
    fn append(&mut self, ns: Namespace, value: &str) -> Result<u64> {
        let index = self
            .get(ns.count_key())?
            .as_deref()
            .map(parse_count)
            .unwrap_or(0);
        self.set(&ns.entry_key(index), value)?;
        self.set(ns.count_key(), &(index + 1).to_string())?;
        Ok(index)
    }

    /// Remove entries `0..count` of `ns` and reset its count to zero.
    fn clear(&mut self, ns: Namespace, count: u64) -> Result<()> {
        for index in 0..count {
            self.remove(&ns.entry_key(index))?;
        }
        self.set(ns.count_key(), "0")
    }
}

/// In-memory store, optionally bounded by a byte quota.
///
/// Usage is the total length of all keys and values, which is how browser
/// storage quotas are accounted.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    used: usize,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes pushing usage past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently in use.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self.entries.get(key).map_or(0, |v| key.len() + v.len());
        let needed = self.used - previous + key.len() + value.len();
        if let Some(limit) = self.quota {
            if needed > limit {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.used = needed;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(value) = self.entries.remove(key) {
            self.used -= key.len() + value.len();
        }
        Ok(())
    }
}
