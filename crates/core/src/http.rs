//! HTTP fetch layer.
//!
//! Everything that talks to the network goes through [`HttpFetch`], so the
//! provisioner and the guidance cache can be tested with an in-memory fake.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::{Error, Result, cleanup};

/// Redirects followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 10;

/// Descriptive User-Agent sent with every request; GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!(
    "aipguard/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/aipguard/aipguard)"
);

/// GET-only access to remote resources.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Fetch and parse a JSON document.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value>;

    /// Fetch a text document such as an HTML page.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Stream a binary resource to `dest`, returning the number of bytes written.
    ///
    /// A partially written `dest` is removed when the transfer fails.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// [`HttpFetch`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    token: Option<String>,
    token_host: String,
}

impl HttpClient {
    /// Create a client that sends `GITHUB_TOKEN`/`GH_TOKEN` (when set) to `api.github.com`.
    pub fn new() -> Result<Self> {
        Self::builder(
            "api.github.com",
            env_token(),
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    /// Create a client with an explicit token, token host and timeout.
    pub fn builder(
        token_host: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let policy = Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error(format!("more than {MAX_REDIRECTS} redirects"))
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(policy)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            token_host: token_host.into(),
        })
    }

    async fn send(&self, url: &str, accept: &str) -> Result<reqwest::Response> {
        let parsed = Url::parse(url).map_err(|e| Error::http(url, format!("invalid URL: {e}")))?;

        let mut request = self.client.get(parsed.clone()).header(ACCEPT, accept);
        // Only the API host sees the token; reqwest drops it on cross-host redirects.
        if let Some(token) = &self.token
            && parsed.host_str() == Some(self.token_host.as_str())
        {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        debug!(%url, "GET");
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(url, format!("HTTP {status}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.send(url, "application/vnd.github+json, application/json").await?;
        response
            .json()
            .await
            .map_err(|e| Error::http(url, format!("invalid JSON body: {e}")))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(url, "text/html, text/plain;q=0.9, */*;q=0.5").await?;
        response
            .text()
            .await
            .map_err(|e| Error::http(url, format!("failed to read body: {e}")))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.send(url, "application/octet-stream, */*").await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(Error::io_at(dest, "create"))?;

        let result: Result<u64> = async {
            let mut written = 0u64;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| Error::http(url, format!("download interrupted: {e}")))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(Error::io_at(dest, "write"))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(Error::io_at(dest, "flush"))?;
            file.sync_all().await.map_err(Error::io_at(dest, "sync_all"))?;
            Ok(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!(%url, bytes = written, dest = %dest.display(), "Downloaded");
                Ok(written)
            }
            Err(e) => {
                drop(file);
                cleanup::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

fn env_token() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|token| !token.is_empty())
}
