//! Sidecar metadata for managed assets.
//!
//! Each asset has a small JSON file `<data_dir>/<identifier>.json`:
//!
//! ```json
//! { "version": "1.67.2", "lastChecked": "2026-10-19T08:00:00Z", "path": "/…/api-linter" }
//! { "version": "9f1c…", "source": "https://…/master.tar.gz", "lastChecked": "…", "path": "…" }
//! ```
//!
//! A missing or unreadable sidecar means "never checked". Writes go to a uniquely
//! named temp file that is synced and renamed into place, so readers see either
//! the old or the new record. Concurrent writers race on the rename and the last
//! one wins; installs that need more hold the provisioner's install lock.

use aipguard_core::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::asset::AssetKind;

/// What is installed for one asset and when it was last checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// Release version (executable) or commit SHA (corpus).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Archive URL the asset came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Last time a check for a newer version completed.
    pub last_checked: DateTime<Utc>,
    /// Where the asset is installed.
    pub path: PathBuf,
}

/// Reads and writes sidecars in the data directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Create a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sidecar path for an asset.
    #[must_use]
    pub fn path_for(&self, kind: AssetKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.identifier()))
    }

    /// Load the record for `kind`; `None` when absent or corrupt.
    pub async fn load(&self, kind: AssetKind) -> Option<AssetMetadata> {
        let path = self.path_for(kind);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(asset = %kind, "No metadata file");
                return None;
            }
            Err(e) => {
                warn!(
                    asset = %kind,
                    path = %path.display(),
                    error = %e,
                    "Unreadable metadata, treating as never checked"
                );
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(
                    asset = %kind,
                    path = %path.display(),
                    error = %e,
                    "Corrupt metadata, treating as never checked"
                );
                None
            }
        }
    }

    /// Persist the record for `kind`.
    ///
    /// `lastChecked` never moves backwards: if the stored record is newer its
    /// timestamp is kept.
    pub async fn save(&self, kind: AssetKind, meta: &AssetMetadata) -> Result<()> {
        let mut meta = meta.clone();
        if let Some(existing) = self.load(kind).await
            && existing.last_checked > meta.last_checked
        {
            meta.last_checked = existing.last_checked;
        }

        let contents = serde_json::to_string_pretty(&meta)
            .map_err(|e| Error::serialization(format!("Failed to serialize metadata: {e}")))?;
        write_atomic(&self.path_for(kind), contents.as_bytes()).await?;

        debug!(asset = %kind, last_checked = %meta.last_checked, "Saved metadata");
        Ok(())
    }

    /// Advance `lastChecked` to `now` without touching anything else.
    ///
    /// Without a stored record there is nothing to advance.
    pub async fn touch(&self, kind: AssetKind, now: DateTime<Utc>) -> Result<()> {
        match self.load(kind).await {
            Some(mut meta) => {
                meta.last_checked = now;
                self.save(kind, &meta).await
            }
            None => {
                debug!(asset = %kind, "No metadata to touch");
                Ok(())
            }
        }
    }
}

/// Write `contents` to `path` through a synced temp file and a rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(Error::io_at(parent, "create_dir_all"))?;
    }

    // Unique per writer so concurrent saves never share a temp file.
    let file_name = path
        .file_name()
        .map_or_else(|| "metadata".into(), |n| n.to_string_lossy().into_owned());
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let result = async {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(Error::io_at(&temp_path, "open"))?;

        file.write_all(contents)
            .await
            .map_err(Error::io_at(&temp_path, "write_all"))?;
        file.sync_all()
            .await
            .map_err(Error::io_at(&temp_path, "sync_all"))?;

        drop(file);

        fs::rename(&temp_path, path)
            .await
            .map_err(Error::io_at(path, "rename"))
    }
    .await;

    if result.is_err() {
        aipguard_core::cleanup::remove_file(&temp_path).await;
    }
    result
}
