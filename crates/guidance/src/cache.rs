//! Per-session cache of rule guidance.

use aipguard_core::{Error, HttpFetch, Result};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::html::{Extractor, RuleDoc};

/// Condensed documentation for one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidanceText {
    /// The documentation page, as reported with the diagnostic.
    pub rule_doc_uri: String,
    /// Markdown shown next to the diagnostic.
    pub formatted_body: String,
}

impl GuidanceText {
    fn placeholder(uri: &str) -> Self {
        Self {
            rule_doc_uri: uri.to_string(),
            formatted_body: format!("Documentation available at {uri}"),
        }
    }

    /// Whether this is the generic link-only text.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.formatted_body == Self::placeholder(&self.rule_doc_uri).formatted_body
    }
}

/// Fetches rule pages and remembers the result for the rest of the session.
///
/// Entries never expire. Access is through `&mut self`; callers that share a
/// cache wrap it in their own lock.
pub struct GuidanceCache {
    http: Arc<dyn HttpFetch>,
    extractor: Extractor,
    entries: HashMap<String, GuidanceText>,
}

impl std::fmt::Debug for GuidanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceCache")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl GuidanceCache {
    /// Create an empty cache.
    pub fn new(http: Arc<dyn HttpFetch>) -> Result<Self> {
        Ok(Self {
            http,
            extractor: Extractor::new()?,
            entries: HashMap::new(),
        })
    }

    /// Guidance for the rule documented at `uri`.
    ///
    /// Never fails: anything that goes wrong yields a short text pointing at the
    /// page. Fetch failures are not cached so a later call can retry.
    pub async fn guidance_for(&mut self, uri: &str) -> GuidanceText {
        if let Some(cached) = self.entries.get(uri) {
            debug!(%uri, "Guidance cache hit");
            return cached.clone();
        }

        match self.fetch(uri).await {
            Ok(doc) => {
                let text = match render(uri, &doc) {
                    Some(body) => GuidanceText {
                        rule_doc_uri: uri.to_string(),
                        formatted_body: body,
                    },
                    None => {
                        warn!(%uri, "No details or examples found on documentation page");
                        GuidanceText::placeholder(uri)
                    }
                };
                self.entries.insert(uri.to_string(), text.clone());
                text
            }
            Err(e) => {
                warn!(error = %e, "Using placeholder guidance");
                GuidanceText::placeholder(uri)
            }
        }
    }

    /// A cached entry, without fetching.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&GuidanceText> {
        self.entries.get(uri)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn fetch(&self, uri: &str) -> Result<RuleDoc> {
        let url = Url::parse(uri).map_err(|e| Error::enrichment(uri, format!("invalid URL: {e}")))?;
        let html = self
            .http
            .get_text(uri)
            .await
            .map_err(|e| Error::enrichment(uri, e.to_string()))?;
        Ok(self.extractor.extract(&html, &url))
    }
}

fn render(uri: &str, doc: &RuleDoc) -> Option<String> {
    if doc.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(details) = &doc.details {
        parts.push(details.clone());
    }
    if let Some(code) = &doc.incorrect {
        parts.push(format!("**Incorrect** code for this rule:\n\n{code}"));
    }
    if let Some(code) = &doc.correct {
        parts.push(format!("**Correct** code for this rule:\n\n{code}"));
    }
    parts.push(format!("[Documentation]({uri})"));
    Some(parts.join("\n\n"))
}
