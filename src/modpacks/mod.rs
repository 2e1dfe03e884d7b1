//! Modpack intake, storage layout and metadata bookkeeping.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/modpacks.json
//! <root>/<id>/<id>.zip
//! <root>/<id>/icon.<ext>
//! ```

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{SubsecRound, Utc};
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::task;

use crate::config::StorageConfig;
use crate::hashing;
use crate::integration::modrinth::ModrinthClient;
use crate::modpack_zip::{self, ARCHIVE_EXTENSION};
use crate::store::MetadataStore;
use crate::types::manifest::is_valid_identifier;
use crate::types::models::modpack::{self, ModpackRecord, Release};

pub mod builder;
mod error;

pub use error::ModpackError;

const ICON_PREFIX: &str = "icon";

pub struct ModpackService {
    config: StorageConfig,
    store: MetadataStore,
    mods: ModrinthClient,
}

impl ModpackService {
    pub fn new(config: StorageConfig, mods: ModrinthClient) -> ModpackService {
        let store = MetadataStore::new(config.root());
        ModpackService {
            config,
            store,
            mods,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.config
    }

    pub fn modpack_dir(&self, id: &str) -> PathBuf {
        self.config.root().join(id)
    }

    pub fn archive_path(&self, id: &str) -> PathBuf {
        self.modpack_dir(id).join(archive_name(id))
    }

    pub async fn list(&self) -> Vec<ModpackRecord> {
        self.store.snapshot().await
    }

    pub async fn get(&self, id: &str) -> Result<ModpackRecord, ModpackError> {
        ensure_identifier(id)?;
        self.store
            .snapshot()
            .await
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ModpackError::NotFound(id.to_string()))
    }

    /// Accepts an uploaded archive, validates it and installs it under its
    /// manifest identifier, creating or updating the matching record.
    pub async fn upload<S, B, E>(&self, filename: &str, stream: S) -> Result<String, ModpackError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        if !is_archive_name(filename) {
            return Err(ModpackError::UnsupportedFileType);
        }

        let scratch = tempfile::Builder::new()
            .prefix("modpack-upload-")
            .tempdir()?;
        let upload = scratch
            .path()
            .join(format!("upload.{}", ARCHIVE_EXTENSION));
        let received = self.receive(stream, &upload).await?;
        log::info!("Received {} ({} bytes)", filename, received);

        let path = upload.clone();
        let inspected = task::spawn_blocking(move || modpack_zip::inspect(&path)).await??;

        self.publish(inspected.release(), &upload, inspected.icon())
            .await
    }

    async fn receive<S, B, E>(&self, stream: S, destination: &Path) -> Result<u64, ModpackError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut stream = std::pin::pin!(stream);
        let limit = self.config.max_upload_bytes();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut received = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ModpackError::Upload(e.to_string()))?;
            let chunk = chunk.as_ref();
            received += chunk.len() as u64;
            if received > limit {
                return Err(ModpackError::TooLarge(self.config.max_upload_mb()));
            }
            file.write_all(chunk).await?;
        }

        file.flush().await?;
        Ok(received)
    }

    /// Installs `archive` (and `icon`) as the current release of `release.id`.
    ///
    /// Holds the store lock for the whole cycle. The new directory is staged
    /// beside the live one and only swapped in once the records are saved.
    pub(crate) async fn publish(
        &self,
        release: Release,
        archive: &Path,
        icon: Option<&Path>,
    ) -> Result<String, ModpackError> {
        let id = release.id.clone();
        let store = self.store.lock().await;
        let mut records = store.load().await;
        let now = Utc::now().trunc_subsecs(6);

        let index = match records.iter().position(|r| r.id == id) {
            Some(i) => {
                log::info!("Updating modpack {} to version {}", id, release.version);
                records[i].apply_release(release, now);
                i
            }
            None => {
                log::info!("Adding modpack {} version {}", id, release.version);
                records.push(ModpackRecord::create(release, now));
                records.len() - 1
            }
        };

        let staging = self.sibling_dir(&id, "staging");
        let staged = self.stage(&id, &staging, archive, icon).await;
        let (file_hash, file_size, icon_url) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                discard(&staging).await;
                return Err(e);
            }
        };

        let record = &mut records[index];
        record.icon_url = icon_url;
        record.file_size = file_size;
        record.file_hash = file_hash;
        record.download_url = modpack::download_url(&id);

        if let Err(e) = store.save(&records).await {
            discard(&staging).await;
            return Err(e.into());
        }

        self.swap_in(&id, &staging).await?;
        Ok(id)
    }

    async fn stage(
        &self,
        id: &str,
        staging: &Path,
        archive: &Path,
        icon: Option<&Path>,
    ) -> Result<(String, u64, Option<String>), ModpackError> {
        discard(staging).await;
        tokio::fs::create_dir_all(staging).await?;

        let stored = staging.join(archive_name(id));
        tokio::fs::copy(archive, &stored).await?;

        let icon_url = match icon {
            Some(icon) => {
                let name = match icon.extension() {
                    Some(ext) => format!("{}.{}", ICON_PREFIX, ext.to_string_lossy()),
                    None => ICON_PREFIX.to_string(),
                };
                tokio::fs::copy(icon, staging.join(name)).await?;
                Some(modpack::icon_url(id))
            }
            None => None,
        };

        let hashed = stored.clone();
        let file_hash = task::spawn_blocking(move || hashing::hash_file(&hashed)).await??;
        let file_size = tokio::fs::metadata(&stored).await?.len();
        Ok((file_hash, file_size, icon_url))
    }

    async fn swap_in(&self, id: &str, staging: &Path) -> Result<(), ModpackError> {
        let dir = self.modpack_dir(id);
        let retired = self.sibling_dir(id, "old");
        let had_previous = tokio::fs::try_exists(&dir).await?;
        if had_previous {
            discard(&retired).await;
            tokio::fs::rename(&dir, &retired).await?;
        }

        tokio::fs::rename(staging, &dir).await.inspect_err(|e| {
            log::error!("Failed to move {} into place: {}", staging.display(), e);
        })?;
        if had_previous {
            discard(&retired).await;
        }
        Ok(())
    }

    // Hidden siblings; identifiers never start with a dot.
    fn sibling_dir(&self, id: &str, suffix: &str) -> PathBuf {
        self.config.root().join(format!(".{}.{}", id, suffix))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ModpackError> {
        ensure_identifier(id)?;

        let store = self.store.lock().await;
        let mut records = store.load().await;
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ModpackError::NotFound(id.to_string()))?;
        records.remove(index);
        store.save(&records).await?;

        let dir = self.modpack_dir(id);
        if tokio::fs::try_exists(&dir).await? {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                log::warn!("Deleted modpack {} but left {} behind: {}", id, dir.display(), e);
            }
        }
        log::info!("Deleted modpack {}", id);
        Ok(())
    }

    /// Counts one download of `id` and returns the archive to serve.
    pub async fn record_download(&self, id: &str) -> Result<PathBuf, ModpackError> {
        ensure_identifier(id)?;

        let store = self.store.lock().await;
        let mut records = store.load().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ModpackError::NotFound(id.to_string()))?;

        let archive = self.archive_path(id);
        if !tokio::fs::try_exists(&archive).await? {
            log::warn!("Modpack {} has a record but no archive", id);
            return Err(ModpackError::NotFound(id.to_string()));
        }

        record.download_count += 1;
        store.save(&records).await?;
        Ok(archive)
    }

    /// The modpack's icon file, or the configured fallback icon.
    pub async fn icon(&self, id: &str) -> Result<PathBuf, ModpackError> {
        if is_valid_identifier(id) {
            if let Some(icon) = self.find_icon(id).await? {
                return Ok(icon);
            }
        }

        let fallback = self.config.default_icon();
        if tokio::fs::try_exists(fallback).await? {
            Ok(fallback.to_path_buf())
        } else {
            Err(ModpackError::IconNotFound(id.to_string()))
        }
    }

    async fn find_icon(&self, id: &str) -> Result<Option<PathBuf>, ModpackError> {
        let mut entries = match tokio::fs::read_dir(self.modpack_dir(id)).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let archive_name = archive_name(id);
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(ICON_PREFIX)
                && name != archive_name
                && entry.file_type().await?.is_file()
            {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

fn archive_name(id: &str) -> String {
    format!("{}.{}", id, ARCHIVE_EXTENSION)
}

async fn discard(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

fn is_archive_name(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

// Identifiers that could never have been stored are simply unknown.
fn ensure_identifier(id: &str) -> Result<(), ModpackError> {
    if is_valid_identifier(id) {
        Ok(())
    } else {
        Err(ModpackError::NotFound(id.to_string()))
    }
}
