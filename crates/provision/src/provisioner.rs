//! Ensure the executable and corpora are present and fresh.

use aipguard_core::{Error, HttpFetch, ProvisionConfig, Result, cleanup};
use chrono::{DateTime, TimeDelta, Utc};
use fs4::tokio::AsyncFileExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::asset::{AssetKind, Corpus, EXECUTABLE_REPO};
use crate::extract::{self, ArchiveFormat};
use crate::metadata::{AssetMetadata, MetadataStore};
use crate::platform::Platform;

/// Result of [`Provisioner::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Path to hand to the caller: the executable, or a corpus import directory.
    pub path: PathBuf,
    /// A newer executable release that was found but not installed.
    pub update: Option<AvailableUpdate>,
}

/// A newer api-linter release than the installed one.
///
/// Reported, never applied implicitly: pass it to [`Provisioner::apply_update`] or
/// [`Provisioner::decline_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    /// Installed version, `None` when its metadata was lost.
    pub current: Option<String>,
    /// Latest published version.
    pub latest: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    sha: String,
}

/// Whether the last check is older than `interval` (or never happened).
#[must_use]
pub fn is_check_due(meta: Option<&AssetMetadata>, interval: Duration, now: DateTime<Utc>) -> bool {
    let Some(meta) = meta else {
        return true;
    };
    let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(meta.last_checked) > interval
}

/// Whether `latest` is a newer release than `current`.
///
/// Versions compare by their dotted numeric core; on a tie a final release beats a
/// pre-release (`1.68.0` > `1.68.0-rc1`). A `latest` tag without a numeric core is
/// never newer, while one replaces an unparseable `current`.
#[must_use]
pub fn is_newer(latest: &str, current: &str) -> bool {
    match (ReleaseVersion::parse(latest), ReleaseVersion::parse(current)) {
        (Some(latest), Some(current)) => latest > current,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// `major.minor.patch[-pre][+build]`, ordered by core, then final over
/// pre-release, then pre-release label.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct ReleaseVersion<'a> {
    core: Vec<u64>,
    is_final: bool,
    pre: &'a str,
}

impl<'a> ReleaseVersion<'a> {
    fn parse(tag: &'a str) -> Option<Self> {
        let tag = tag.trim().trim_start_matches('v');
        let tag = tag.split_once('+').map_or(tag, |(version, _build)| version);
        let (core, pre) = tag.split_once('-').unwrap_or((tag, ""));
        let core = core
            .split('.')
            .map(|part| part.parse().ok())
            .collect::<Option<Vec<u64>>>()?;
        Some(Self {
            core,
            is_final: pre.is_empty(),
            pre,
        })
    }
}

/// Acquires and refreshes the managed assets.
///
/// All state lives in the data directory plus an in-memory map that backs off
/// after failed update checks, so several provisioners can coexist in tests.
pub struct Provisioner {
    config: ProvisionConfig,
    http: Arc<dyn HttpFetch>,
    store: MetadataStore,
    platform: Platform,
    suppressed_until: Mutex<HashMap<AssetKind, Instant>>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Create a provisioner for the current platform.
    pub fn new(config: ProvisionConfig, http: Arc<dyn HttpFetch>) -> Result<Self> {
        Ok(Self::with_platform(config, http, Platform::current()?))
    }

    /// Create a provisioner for an explicit platform.
    #[must_use]
    pub fn with_platform(
        config: ProvisionConfig,
        http: Arc<dyn HttpFetch>,
        platform: Platform,
    ) -> Self {
        let store = MetadataStore::new(config.data_dir.clone());
        Self {
            config,
            http,
            store,
            platform,
            suppressed_until: Mutex::new(HashMap::new()),
        }
    }

    /// The metadata store backing this provisioner.
    #[must_use]
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Where the managed executable lives (ignores any custom path).
    #[must_use]
    pub fn managed_executable_path(&self) -> PathBuf {
        self.config.data_dir.join(self.platform.executable_name())
    }

    /// Directory a corpus is installed to.
    #[must_use]
    pub fn corpus_dir(&self, corpus: Corpus) -> PathBuf {
        self.config.data_dir.join(corpus.identifier())
    }

    /// Directory of a corpus that is passed to api-linter as an import path.
    #[must_use]
    pub fn corpus_import_dir(&self, corpus: Corpus) -> PathBuf {
        let dir = self.corpus_dir(corpus);
        match corpus.import_subdir() {
            Some(sub) => dir.join(sub),
            None => dir,
        }
    }

    /// Import directories of the corpora that are currently installed.
    #[must_use]
    pub fn corpus_import_dirs(&self) -> Vec<PathBuf> {
        Corpus::ALL
            .iter()
            .map(|c| self.corpus_import_dir(*c))
            .filter(|dir| dir.is_dir())
            .collect()
    }

    /// Make sure `kind` is installed, refreshing it when its check is due.
    pub async fn ensure(&self, kind: AssetKind) -> Result<Provisioned> {
        match kind {
            AssetKind::Executable => self.ensure_executable().await,
            AssetKind::Corpus(corpus) => self.ensure_corpus(corpus).await,
        }
    }

    /// Make sure the api-linter executable is installed.
    ///
    /// A configured custom path is returned unchanged without touching the
    /// network or the data directory.
    pub async fn ensure_executable(&self) -> Result<Provisioned> {
        if let Some(custom) = &self.config.custom_executable_path {
            debug!(path = %custom.display(), "Using configured api-linter");
            return Ok(Provisioned {
                path: custom.clone(),
                update: None,
            });
        }

        let path = self.managed_executable_path();
        if path.is_file() {
            let update = self.check_executable_update().await;
            return Ok(Provisioned { path, update });
        }

        info!(path = %path.display(), "api-linter not installed, downloading");
        let version = self.latest_version().await?;
        self.install_executable(&version).await?;
        Ok(Provisioned { path, update: None })
    }

    /// Install the release named in `update`.
    pub async fn apply_update(&self, update: &AvailableUpdate) -> Result<PathBuf> {
        info!(from = ?update.current, to = %update.latest, "Updating api-linter");
        self.install_executable(&update.latest).await?;
        Ok(self.managed_executable_path())
    }

    /// Keep the installed release and postpone the next check by a full interval.
    ///
    /// When the installed release's record was lost, a record without a version is
    /// written so the postponement still holds.
    pub async fn decline_update(&self, update: &AvailableUpdate) -> Result<()> {
        debug!(latest = %update.latest, "Update declined");
        let kind = AssetKind::Executable;
        let now = Utc::now();
        if self.store.load(kind).await.is_some() {
            return self.store.touch(kind, now).await;
        }
        let meta = AssetMetadata {
            version: None,
            source: None,
            last_checked: now,
            path: self.managed_executable_path(),
        };
        self.store.save(kind, &meta).await
    }

    /// Check for a newer release now, ignoring the refresh interval.
    ///
    /// `None` when a custom executable is configured, nothing is installed yet,
    /// or the installed release is current.
    pub async fn check_update(&self) -> Result<Option<AvailableUpdate>> {
        if self.config.custom_executable_path.is_some()
            || !self.managed_executable_path().is_file()
        {
            return Ok(None);
        }
        let latest = self.latest_version().await?;
        let current = self
            .store
            .load(AssetKind::Executable)
            .await
            .and_then(|m| m.version);
        Ok(self.compare_release(current, latest).await)
    }

    /// Make sure a corpus is installed, returning its import directory.
    ///
    /// A stale corpus is re-downloaded when its branch moved; if that fails the
    /// existing copy keeps being used. A failed first download is not retried
    /// until the backoff has passed.
    pub async fn ensure_corpus(&self, corpus: Corpus) -> Result<Provisioned> {
        let kind = AssetKind::Corpus(corpus);
        let import_dir = self.corpus_import_dir(corpus);

        if self.corpus_dir(corpus).is_dir() {
            let meta = self.store.load(kind).await;
            if is_check_due(meta.as_ref(), self.config.refresh_interval_corpus, Utc::now())
                && !self.is_suppressed(kind)
                && let Err(e) = self.refresh_corpus(corpus, meta.as_ref()).await
            {
                warn!(asset = %kind, error = %e, "Corpus refresh failed, keeping existing copy");
                self.suppress(kind);
            }
            return Ok(Provisioned {
                path: import_dir,
                update: None,
            });
        }

        if self.is_suppressed(kind) {
            return Err(Error::provisioning(
                kind.identifier(),
                "skipped after a recent failed download",
            ));
        }
        info!(asset = %kind, "Corpus not installed, downloading");
        let commit = self.resolve_commit(corpus).await;
        if let Err(e) = self.install_corpus(corpus, commit).await {
            self.suppress(kind);
            return Err(e);
        }
        Ok(Provisioned {
            path: import_dir,
            update: None,
        })
    }

    async fn check_executable_update(&self) -> Option<AvailableUpdate> {
        let kind = AssetKind::Executable;
        let meta = self.store.load(kind).await;
        if !is_check_due(meta.as_ref(), self.config.refresh_interval_executable, Utc::now()) {
            return None;
        }
        if self.is_suppressed(kind) {
            debug!("Skipping release check after recent failure");
            return None;
        }

        let latest = match self.latest_version().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, "Release check failed, using installed api-linter");
                self.suppress(kind);
                return None;
            }
        };

        self.compare_release(meta.and_then(|m| m.version), latest)
            .await
    }

    async fn compare_release(
        &self,
        current: Option<String>,
        latest: String,
    ) -> Option<AvailableUpdate> {
        match current {
            Some(current) if !is_newer(&latest, &current) => {
                debug!(%current, "api-linter is up to date");
                if let Err(e) = self.store.touch(AssetKind::Executable, Utc::now()).await {
                    warn!(error = %e, "Failed to record release check");
                }
                None
            }
            current => {
                info!(current = ?current, %latest, "Newer api-linter release available");
                Some(AvailableUpdate { current, latest })
            }
        }
    }

    async fn latest_version(&self) -> Result<String> {
        let url = format!(
            "{}/repos/{EXECUTABLE_REPO}/releases/latest",
            self.config.endpoints.api_base
        );
        let json = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| Error::provisioning(AssetKind::Executable.identifier(), e.to_string()))?;
        let release: Release = serde_json::from_value(json).map_err(|e| {
            Error::provisioning(
                AssetKind::Executable.identifier(),
                format!("unexpected release metadata from {url}: {e}"),
            )
        })?;
        Ok(release.tag_name.trim_start_matches('v').to_string())
    }

    async fn resolve_commit(&self, corpus: Corpus) -> Option<String> {
        let url = format!(
            "{}/repos/{}/commits/{}",
            self.config.endpoints.api_base,
            corpus.repo(),
            corpus.git_ref()
        );
        let commit = self
            .http
            .get_json(&url)
            .await
            .and_then(|json| {
                serde_json::from_value::<Commit>(json)
                    .map_err(|e| Error::serialization(e.to_string()))
            });
        match commit {
            Ok(commit) => Some(commit.sha),
            Err(e) => {
                debug!(corpus = corpus.identifier(), error = %e, "Could not resolve corpus commit");
                None
            }
        }
    }

    async fn refresh_corpus(&self, corpus: Corpus, meta: Option<&AssetMetadata>) -> Result<()> {
        let kind = AssetKind::Corpus(corpus);
        let commit = self.resolve_commit(corpus).await;
        if let (Some(new), Some(old)) = (&commit, meta.and_then(|m| m.version.as_ref()))
            && new == old
        {
            debug!(asset = %kind, commit = %new, "Corpus unchanged");
            return self.store.touch(kind, Utc::now()).await;
        }
        info!(asset = %kind, "Refreshing corpus");
        self.install_corpus(corpus, commit).await
    }

    async fn install_executable(&self, version: &str) -> Result<()> {
        let kind = AssetKind::Executable;
        let _lock = self.install_lock(kind).await?;

        let target = self.platform.release_target()?;
        let asset = format!("api-linter-{version}-{}-{}.tar.gz", target.os, target.arch);
        let url = format!(
            "{}/{EXECUTABLE_REPO}/releases/download/v{version}/{asset}",
            self.config.endpoints.download_base
        );
        let dest = self.managed_executable_path();
        let binary_name = self.platform.executable_name();

        self.download_and_extract(kind, &url, move |staging| {
            let binary = extract::find_file(staging, binary_name)?;
            extract::set_executable(&binary)?;
            extract::replace_file(&binary, &dest)
        })
        .await?;

        self.record(
            kind,
            AssetMetadata {
                version: Some(version.to_string()),
                source: Some(url),
                last_checked: Utc::now(),
                path: self.managed_executable_path(),
            },
        )
        .await;
        info!(%version, path = %self.managed_executable_path().display(), "Installed api-linter");
        Ok(())
    }

    async fn install_corpus(&self, corpus: Corpus, commit: Option<String>) -> Result<()> {
        let kind = AssetKind::Corpus(corpus);
        let _lock = self.install_lock(kind).await?;

        let url = format!(
            "{}/{}/archive/refs/heads/{}.tar.gz",
            self.config.endpoints.download_base,
            corpus.repo(),
            corpus.git_ref()
        );
        let dest = self.corpus_dir(corpus);
        let target = dest.clone();

        self.download_and_extract(kind, &url, move |staging| {
            let top = extract::single_top_level_dir(staging)?;
            extract::replace_dir(&top, &target)
        })
        .await?;

        self.record(
            kind,
            AssetMetadata {
                version: commit,
                source: Some(url),
                last_checked: Utc::now(),
                path: dest.clone(),
            },
        )
        .await;
        info!(asset = %kind, path = %dest.display(), "Installed corpus");
        Ok(())
    }

    /// Download `url` into the data dir, extract it to a staging dir and run `place`
    /// on the staging dir. Temp archive and staging dir are removed afterwards.
    async fn download_and_extract<F>(&self, kind: AssetKind, url: &str, place: F) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<()> + Send + 'static,
    {
        let data_dir = &self.config.data_dir;
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(Error::io_at(data_dir, "create_dir_all"))?;

        let format = ArchiveFormat::from_name(url).ok_or_else(|| {
            Error::provisioning(kind.identifier(), format!("unknown archive type: {url}"))
        })?;
        let id = uuid::Uuid::new_v4();
        let archive = data_dir.join(format!(".{}.{id}.download", kind.identifier()));
        let staging = data_dir.join(format!(".{}.{id}.staging", kind.identifier()));

        let downloaded = self
            .http
            .download(url, &archive)
            .await
            .map_err(|e| Error::provisioning(kind.identifier(), e.to_string()));

        let result = match downloaded {
            Ok(bytes) => {
                debug!(asset = %kind, bytes, "Archive downloaded");
                let archive = archive.clone();
                let staging = staging.clone();
                tokio::task::spawn_blocking(move || {
                    extract::extract(&archive, format, &staging)?;
                    place(&staging)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(Error::provisioning(
                        kind.identifier(),
                        format!("extraction task failed: {e}"),
                    ))
                })
            }
            Err(e) => Err(e),
        };

        cleanup::remove_file(&archive).await;
        cleanup::remove_dir_all(&staging).await;

        if let Err(e) = &result {
            warn!(asset = %kind, %url, error = %e, "Provisioning failed");
        }
        result
    }

    async fn record(&self, kind: AssetKind, meta: AssetMetadata) {
        // The asset itself is in place; a lost record only forces an early re-check.
        if let Err(e) = self.store.save(kind, &meta).await {
            warn!(asset = %kind, error = %e, "Failed to save metadata");
        }
    }

    async fn install_lock(&self, kind: AssetKind) -> Result<Option<InstallLock>> {
        if !self.config.cross_process_lock {
            return Ok(None);
        }
        InstallLock::acquire(&self.config.data_dir, kind).await.map(Some)
    }

    fn is_suppressed(&self, kind: AssetKind) -> bool {
        let map = self
            .suppressed_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(&kind).is_some_and(|until| Instant::now() < *until)
    }

    fn suppress(&self, kind: AssetKind) {
        let mut map = self
            .suppressed_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(kind, Instant::now() + self.config.failed_check_backoff);
    }
}

/// Exclusive lock on `<data_dir>/.<identifier>.lock`, released on drop.
#[derive(Debug)]
struct InstallLock {
    _file: tokio::fs::File,
}

impl InstallLock {
    async fn acquire(data_dir: &Path, kind: AssetKind) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(Error::io_at(data_dir, "create_dir_all"))?;
        let path = data_dir.join(format!(".{}.lock", kind.identifier()));
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .await
            .map_err(Error::io_at(&path, "open"))?;

        debug!(path = %path.display(), "Waiting for install lock");
        let file = tokio::task::spawn_blocking(move || {
            file.lock_exclusive().map(|()| file)
        })
        .await
        .map_err(|e| Error::provisioning(kind.identifier(), format!("lock task failed: {e}")))?
        .map_err(Error::io_at(&path, "lock_exclusive"))?;

        Ok(Self { _file: file })
    }
}
