//! Flat key-value persistence with a change feed.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::Result;

const CHANGE_FEED_CAPACITY: usize = 64;

/// A key whose stored value changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub new_value: Value,
}

#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Values for whichever of `keys` are present.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Merge `entries` into the store.
    async fn set(&self, entries: Map<String, Value>) -> Result<()>;

    /// Feed of changed keys, whoever wrote them.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

pub(crate) fn change_feed() -> broadcast::Sender<StoreChange> {
    broadcast::channel(CHANGE_FEED_CAPACITY).0
}

/// Changes `incoming` makes relative to `current`, applied in place.
pub(crate) fn merge(current: &mut Map<String, Value>, incoming: Map<String, Value>) -> Vec<StoreChange> {
    let mut changes = Vec::new();
    for (key, value) in incoming {
        if current.get(&key) != Some(&value) {
            changes.push(StoreChange {
                key: key.clone(),
                new_value: value.clone(),
            });
        }
        current.insert(key, value);
    }
    changes
}

pub(crate) fn publish(feed: &broadcast::Sender<StoreChange>, changes: Vec<StoreChange>) {
    for change in changes {
        // No subscriber is fine.
        let _ = feed.send(change);
    }
}
