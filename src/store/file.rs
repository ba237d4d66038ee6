//! A single JSON object on disk.
//!
//! Writes merge into what is currently on disk, so a hand edit of one key is
//! not clobbered by the next session write. [`JsonFileStore::poll_external`]
//! turns edits made by anyone else into change events.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use super::{PersistentStore, StoreChange, change_feed, merge, publish};
use crate::error::{Error, Result};

pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Last contents this process wrote or observed.
    known: Mutex<Map<String, Value>>,
    feed: broadcast::Sender<StoreChange>,
}

impl JsonFileStore {
    /// Open the store, creating the directory if needed. An unreadable file
    /// is moved aside and the store starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let known = match read_disk(&path).await? {
            Disk::Object(map) => map,
            Disk::Corrupt(reason) => {
                let aside = path.with_extension("json.corrupt");
                warn!(
                    %reason,
                    aside = %aside.display(),
                    "state file unreadable, starting fresh"
                );
                if let Err(e) = tokio::fs::rename(&path, &aside).await {
                    warn!(error = %e, "failed to move unreadable state file aside");
                }
                Map::new()
            }
        };
        Ok(Self {
            path,
            known: Mutex::new(known),
            feed: change_feed(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compare disk against what we last saw; publish the differences.
    pub async fn poll_external(&self) -> Result<usize> {
        let on_disk = read_disk(&self.path).await?.into_object()?;
        let changes = {
            let mut known = self.known.lock().await;
            merge(&mut known, on_disk)
        };
        let count = changes.len();
        if count > 0 {
            debug!(count, path = %self.path.display(), "external edits detected");
        }
        publish(&self.feed, changes);
        Ok(count)
    }

    /// Poll for external edits until the process exits.
    pub fn spawn_watch(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = self.poll_external().await {
                    warn!(error = %e, "failed to poll state file");
                }
            }
        })
    }
}

/// What the state file held.
enum Disk {
    Object(Map<String, Value>),
    /// Not a JSON object; carries the reason.
    Corrupt(String),
}

impl Disk {
    fn into_object(self) -> Result<Map<String, Value>> {
        match self {
            Disk::Object(map) => Ok(map),
            Disk::Corrupt(reason) => Err(Error::StoreUnavailable(reason)),
        }
    }
}

/// Only I/O failures are errors; bad contents come back as [`Disk::Corrupt`].
async fn read_disk(path: &Path) -> Result<Disk> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Disk::Object(Map::new()));
        }
        Err(e) => return Err(Error::StoreUnavailable(e.to_string())),
    };
    if text.trim().is_empty() {
        return Ok(Disk::Object(Map::new()));
    }
    Ok(match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Disk::Object(map),
        Ok(_) => Disk::Corrupt(format!("{} does not hold a JSON object", path.display())),
        Err(e) => Disk::Corrupt(format!("{}: {}", path.display(), e)),
    })
}

async fn write_object(path: &Path, map: &Map<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(map)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))
}

#[async_trait]
impl PersistentStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let on_disk = read_disk(&self.path).await?.into_object()?;
        Ok(on_disk
            .into_iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .collect())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        let mut known = self.known.lock().await;
        let mut on_disk = match read_disk(&self.path).await? {
            Disk::Object(map) => map,
            // Rewrite from what we last saw; this write heals the file.
            Disk::Corrupt(reason) => {
                warn!(%reason, "state file unreadable, overwriting");
                known.clone()
            }
        };
        // Edits nobody has announced yet go out first, as their own changes.
        let external = merge(&mut known, on_disk.clone());
        let ours = merge(&mut on_disk, entries);
        write_object(&self.path, &on_disk).await?;
        *known = on_disk;
        drop(known);

        publish(&self.feed, external);
        publish(&self.feed, ours);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}
