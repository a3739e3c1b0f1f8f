//! Command implementations.

pub mod ensure;
pub mod explain;
pub mod lint;
pub mod update;

use crate::cli::Cli;
use aipguard_core::{Error, HttpClient, InvocationOptions, ProvisionConfig, Settings};
use aipguard_provision::Provisioner;
use std::sync::Arc;

/// Validated configuration and the shared HTTP client for one CLI run.
#[derive(Debug)]
pub struct Session {
    pub provision: ProvisionConfig,
    pub invocation: InvocationOptions,
    pub http: Arc<HttpClient>,
}

impl Session {
    /// Read the optional settings file, apply the flags and validate the result.
    pub async fn load(cli: &Cli) -> miette::Result<Self> {
        let base = match &cli.settings {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(Error::io_at(path, "read"))?;
                Settings::from_json(&json)?
            }
            None => Settings::default(),
        };

        let (provision, invocation) = cli.apply_to(base).validate()?;
        tracing::debug!(data_dir = %provision.data_dir.display(), "Configuration loaded");

        Ok(Self {
            provision,
            invocation,
            http: Arc::new(HttpClient::new()?),
        })
    }

    /// A provisioner for this machine.
    pub fn provisioner(&self) -> miette::Result<Provisioner> {
        Ok(Provisioner::new(self.provision.clone(), self.http.clone())?)
    }
}
