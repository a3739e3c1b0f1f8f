//! Typed configuration.
//!
//! [`Settings`] is the loosely-sourced surface (CLI flags, env vars, or a JSON blob
//! handed over by an editor host). [`Settings::validate`] runs once at that boundary
//! and produces the immutable [`ProvisionConfig`] and [`InvocationOptions`] the rest
//! of the crates consume.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default hours between checks for a newer api-linter release.
pub const DEFAULT_EXECUTABLE_REFRESH_HOURS: u64 = 24;

/// Default hours before a corpus is considered stale.
pub const DEFAULT_CORPUS_REFRESH_HOURS: u64 = 24 * 7;

/// Default minutes to wait after a failed update check before trying again.
pub const DEFAULT_FAILED_CHECK_BACKOFF_MINUTES: u64 = 10;

/// Default timeout for a single HTTP request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Default api-linter run timeout.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 60;

/// User-facing settings with explicit defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Use this executable instead of the managed download.
    pub executable_path: Option<PathBuf>,
    /// Override the managed data directory.
    pub data_dir: Option<PathBuf>,
    /// Hours between release checks.
    pub executable_refresh_hours: u64,
    /// Hours before corpora are refreshed.
    pub corpus_refresh_hours: u64,
    /// Hold an exclusive file lock while installing an asset.
    pub cross_process_lock: bool,
    /// api-linter config file passed through `--config`.
    pub config_file: Option<String>,
    /// Extra import paths, in precedence order.
    pub import_paths: Vec<String>,
    /// Rule ids passed through `--disable-rule`.
    pub disabled_rules: Vec<String>,
    /// Rule ids passed through `--enable-rule`.
    pub enabled_rules: Vec<String>,
    /// Descriptor set files passed through `--descriptor-set-in`.
    pub descriptor_sets: Vec<String>,
    /// Pass `--ignore-comment-disables`.
    pub ignore_comment_disables: bool,
    /// Pass `--set-exit-status`.
    pub set_exit_status: bool,
    /// Seconds before a single api-linter run is abandoned, 0 disables the timeout.
    pub run_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable_path: None,
            data_dir: None,
            executable_refresh_hours: DEFAULT_EXECUTABLE_REFRESH_HOURS,
            corpus_refresh_hours: DEFAULT_CORPUS_REFRESH_HOURS,
            cross_process_lock: false,
            config_file: None,
            import_paths: Vec::new(),
            disabled_rules: Vec::new(),
            enabled_rules: Vec::new(),
            descriptor_sets: Vec::new(),
            ignore_comment_disables: false,
            set_exit_status: false,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document, filling in defaults for absent keys.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("invalid settings: {e}")))
    }

    /// Validate and split the settings into provisioning and invocation parts.
    pub fn validate(self) -> Result<(ProvisionConfig, InvocationOptions)> {
        let refresh_interval_executable =
            refresh_interval("executableRefreshHours", self.executable_refresh_hours)?;
        let refresh_interval_corpus =
            refresh_interval("corpusRefreshHours", self.corpus_refresh_hours)?;
        if let Some(path) = &self.executable_path
            && path.as_os_str().is_empty()
        {
            return Err(Error::configuration("executablePath must not be empty"));
        }
        for rule in self.disabled_rules.iter().chain(&self.enabled_rules) {
            if rule.trim().is_empty() || rule.chars().any(char::is_whitespace) {
                return Err(Error::configuration(format!("invalid rule id '{rule}'")));
            }
        }

        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => ProvisionConfig::default_data_dir()?,
        };

        let provision = ProvisionConfig {
            custom_executable_path: self.executable_path,
            refresh_interval_executable,
            refresh_interval_corpus,
            data_dir,
            cross_process_lock: self.cross_process_lock,
            ..ProvisionConfig::default()
        };

        let invocation = InvocationOptions {
            config_file: self.config_file.filter(|s| !s.trim().is_empty()),
            import_paths: dedup(self.import_paths),
            disabled_rules: dedup(self.disabled_rules),
            enabled_rules: dedup(self.enabled_rules),
            descriptor_sets: self.descriptor_sets,
            ignore_comment_disables: self.ignore_comment_disables,
            set_exit_status: self.set_exit_status,
            timeout: (self.run_timeout_secs > 0)
                .then(|| Duration::from_secs(self.run_timeout_secs)),
        };

        Ok((provision, invocation))
    }
}

/// Remote endpoints used for downloads. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base of the GitHub REST API.
    pub api_base: String,
    /// Base for release assets and source archives.
    pub download_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            download_base: "https://github.com".to_string(),
        }
    }
}

/// Configuration for the dependency provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// User-supplied executable; bypasses all download logic when set.
    pub custom_executable_path: Option<PathBuf>,
    /// How long an installed executable goes without a release check.
    pub refresh_interval_executable: Duration,
    /// How long a corpus goes without a refresh.
    pub refresh_interval_corpus: Duration,
    /// Directory holding the executable, corpora and their metadata.
    pub data_dir: PathBuf,
    /// Remote endpoints.
    pub endpoints: Endpoints,
    /// Suppression window after a failed update check.
    pub failed_check_backoff: Duration,
    /// Hold an exclusive file lock while installing an asset.
    pub cross_process_lock: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            custom_executable_path: None,
            refresh_interval_executable: Duration::from_secs(
                DEFAULT_EXECUTABLE_REFRESH_HOURS * SECS_PER_HOUR,
            ),
            refresh_interval_corpus: Duration::from_secs(
                DEFAULT_CORPUS_REFRESH_HOURS * SECS_PER_HOUR,
            ),
            data_dir: Self::default_data_dir().unwrap_or_else(|_| PathBuf::from(".aipguard")),
            endpoints: Endpoints::default(),
            failed_check_backoff: Duration::from_secs(DEFAULT_FAILED_CHECK_BACKOFF_MINUTES * 60),
            cross_process_lock: false,
        }
    }
}

impl ProvisionConfig {
    /// Create a config rooted at `data_dir` with default intervals.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Get the default data directory.
    ///
    /// Uses platform-appropriate paths:
    /// - Linux: `~/.local/share/aipguard`
    /// - macOS: `~/Library/Application Support/aipguard`
    /// - Windows: `%APPDATA%\aipguard`
    ///
    /// Can be overridden with the `AIPGUARD_DATA_DIR` environment variable.
    pub fn default_data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("AIPGUARD_DATA_DIR")
            && !dir.is_empty()
        {
            return Ok(PathBuf::from(dir));
        }

        let base = dirs::data_dir()
            .ok_or_else(|| Error::configuration("Could not determine data directory"))?;
        Ok(base.join("aipguard"))
    }
}

/// Options for a single api-linter invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOptions {
    /// `--config` file, may contain `${workspaceFolder}`.
    pub config_file: Option<String>,
    /// Configured import paths in precedence order, may contain placeholders.
    pub import_paths: Vec<String>,
    /// Rules to disable.
    pub disabled_rules: Vec<String>,
    /// Rules to enable.
    pub enabled_rules: Vec<String>,
    /// Descriptor set files.
    pub descriptor_sets: Vec<String>,
    /// Ignore `(-- api-linter: ... --)` comments in the sources.
    pub ignore_comment_disables: bool,
    /// Make api-linter exit 1 when it reports problems.
    pub set_exit_status: bool,
    /// Abandon a run after this long.
    pub timeout: Option<Duration>,
}

const SECS_PER_HOUR: u64 = 60 * 60;

/// Convert a user-supplied interval in hours, rejecting zero and overflow.
fn refresh_interval(name: &str, hours: u64) -> Result<Duration> {
    if hours == 0 {
        return Err(Error::configuration(format!("{name} must be at least 1")));
    }
    hours
        .checked_mul(SECS_PER_HOUR)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::configuration(format!("{name} is out of range: {hours}")))
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
