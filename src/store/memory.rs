use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::{PersistentStore, StoreChange, change_feed, merge, publish};
use crate::error::{Error, Result};

/// Process-local store; echoes its own writes on the change feed.
#[derive(Debug)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
    feed: broadcast::Sender<StoreChange>,
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(Map::new()),
            feed: change_feed(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every read and write fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().ok().and_then(|v| v.get(key).cloned())
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        self.check()?;
        let values = self
            .values
            .lock()
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        self.check()?;
        let changes = {
            let mut values = self
                .values
                .lock()
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            merge(&mut values, entries)
        };
        publish(&self.feed, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}
