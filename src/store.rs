//! File-backed metadata store.
//!
//! The whole collection lives in one JSON file. Every mutation is a full
//! load-modify-save cycle performed while holding the store's lock, so
//! requests against one store serialize instead of overwriting each other.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::sync::{Mutex, MutexGuard};

use crate::types::models::modpack::ModpackRecord;

pub const METADATA_FILE: &str = "modpacks.json";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to encode modpack metadata: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to write modpack metadata: {0}")]
    Io(#[from] std::io::Error),
}

pub struct MetadataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Exclusive access to the metadata file for one read-modify-write cycle.
pub struct StoreGuard<'a> {
    store: &'a MetadataStore,
    _guard: MutexGuard<'a, ()>,
}

impl MetadataStore {
    pub fn new(root: &Path) -> MetadataStore {
        MetadataStore {
            path: root.join(METADATA_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn lock(&self) -> StoreGuard<'_> {
        StoreGuard {
            store: self,
            _guard: self.lock.lock().await,
        }
    }

    /// Consistent copy of the current collection.
    pub async fn snapshot(&self) -> Vec<ModpackRecord> {
        self.lock().await.load().await
    }
}

impl StoreGuard<'_> {
    /// Reads the full record list. A missing or unreadable file reads as empty.
    pub async fn load(&self) -> Vec<ModpackRecord> {
        let path = &self.store.path;
        let contents = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return vec![],
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                return vec![];
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(records) => records,
            Err(e) => {
                log::error!("Failed to parse {}: {}", path.display(), e);
                vec![]
            }
        }
    }

    /// Overwrites the metadata file with `records`.
    pub async fn save(&self, records: &[ModpackRecord]) -> Result<(), StoreError> {
        let path = &self.store.path;
        let mut bytes = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut serializer)?;

        let staging = path.with_extension("json.tmp");
        let written = async {
            tokio::fs::write(&staging, &bytes).await?;
            tokio::fs::rename(&staging, path).await
        }
        .await;

        written.map_err(|e| {
            log::error!("Failed to save {}: {}", path.display(), e);
            StoreError::Io(e)
        })
    }
}
