//! Provision, invoke and decode: one lint of one file.

use aipguard_core::{DiagnosticRecord, Error, ErrorCategory, InvocationOptions, Result};
use aipguard_provision::{AssetKind, AvailableUpdate, Corpus, Provisioner};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::args::{self, ImportContext};
use crate::decode::decode;
use crate::runner;
use crate::tracker::{LatestRequests, ReportGate};

/// How a lint request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintOutcome {
    /// The run finished and these diagnostics apply to the file.
    Completed(Vec<DiagnosticRecord>),
    /// A newer request for the same file was issued while this one ran.
    Superseded,
}

/// Lints files with a provisioned api-linter.
///
/// Holds the only shared state of a session: the request tracker, the failure
/// gate and the last update notice. Provisioning is serialized within the process
/// so concurrent lints of several files do not all download the same asset.
#[derive(Debug)]
pub struct Linter {
    provisioner: Arc<Provisioner>,
    options: InvocationOptions,
    workspace_root: Option<PathBuf>,
    requests: LatestRequests,
    gate: ReportGate,
    provision_guard: tokio::sync::Mutex<()>,
    pending_update: Mutex<Option<AvailableUpdate>>,
}

impl Linter {
    /// Create a linter.
    #[must_use]
    pub fn new(provisioner: Arc<Provisioner>, options: InvocationOptions) -> Self {
        Self {
            provisioner,
            options,
            workspace_root: None,
            requests: LatestRequests::default(),
            gate: ReportGate::default(),
            provision_guard: tokio::sync::Mutex::new(()),
            pending_update: Mutex::new(None),
        }
    }

    /// Resolve `${workspaceFolder}` and workspace-local corpora against `root`.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// The newer api-linter release reported by the most recent provisioning, if any.
    pub fn available_update(&self) -> Option<AvailableUpdate> {
        self.pending_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether `err` should be shown to the user.
    ///
    /// The same message for the same failing stage is shown once until a lint
    /// succeeds again.
    pub fn should_report(&self, err: &Error) -> bool {
        self.gate.admit(gate_key(err.category()), &err.to_string())
    }

    /// Lint `file`.
    ///
    /// Provisioning and invocation failures are returned as errors. Undecodable
    /// output yields no diagnostics. If another lint of the same file started
    /// meanwhile, the result is dropped and [`LintOutcome::Superseded`] returned.
    pub async fn lint(&self, file: &Path) -> Result<LintOutcome> {
        let token = self.requests.begin(file);
        let result = self.lint_once(file).await;

        if !self.requests.finish(&token) {
            debug!(file = %file.display(), "Discarding superseded lint result");
            return Ok(LintOutcome::Superseded);
        }
        result.map(LintOutcome::Completed)
    }

    async fn lint_once(&self, file: &Path) -> Result<Vec<DiagnosticRecord>> {
        let (executable, corpora) = self.prepare().await?;
        let context = ImportContext {
            workspace_root: self.workspace_root.clone(),
            global_corpora: corpora,
        };
        let invocation = args::build(file, &self.options, &context)?;
        let output = runner::run(&executable, &invocation, self.options.timeout).await?;

        self.gate.clear(gate_key(ErrorCategory::Provisioning));
        self.gate.clear(gate_key(ErrorCategory::Invocation));

        let records = decode(&output.stdout);
        debug!(file = %file.display(), count = records.len(), "Lint finished");
        Ok(records)
    }

    /// Ensure the executable and corpora, returning the executable and the
    /// corpus import directories that are usable.
    async fn prepare(&self) -> Result<(PathBuf, Vec<PathBuf>)> {
        let _guard = self.provision_guard.lock().await;

        let executable = self.provisioner.ensure(AssetKind::Executable).await?;
        if let Some(update) = &executable.update {
            info!(latest = %update.latest, "A newer api-linter is available");
        }
        *self
            .pending_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = executable.update;

        let mut corpora = Vec::new();
        for corpus in Corpus::ALL {
            let kind = AssetKind::Corpus(corpus);
            match self.provisioner.ensure(kind).await {
                Ok(provisioned) => {
                    self.gate.clear(kind.identifier());
                    corpora.push(provisioned.path);
                }
                Err(e) => {
                    if self.gate.admit(kind.identifier(), &e.to_string()) {
                        warn!(asset = %kind, error = %e, "Linting without corpus");
                    }
                }
            }
        }

        Ok((executable.path, corpora))
    }
}

fn gate_key(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Provisioning => "provisioning",
        ErrorCategory::Invocation => "invocation",
        ErrorCategory::Decode => "decode",
        ErrorCategory::Enrichment => "enrichment",
    }
}
