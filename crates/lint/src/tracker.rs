//! Bookkeeping for overlapping lint requests and repeated failures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Identifies one lint request for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    file: PathBuf,
    generation: u64,
}

impl RequestToken {
    /// The file this request is for.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Tracks the most recent request per file so stale completions can be discarded.
#[derive(Debug, Default)]
pub struct LatestRequests {
    next: AtomicU64,
    latest: Mutex<HashMap<PathBuf, u64>>,
}

impl LatestRequests {
    /// Record a new request for `file`, superseding any earlier one.
    pub fn begin(&self, file: &Path) -> RequestToken {
        let generation = self.next.fetch_add(1, Ordering::Relaxed);
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file.to_path_buf(), generation);
        RequestToken {
            file: file.to_path_buf(),
            generation,
        }
    }

    /// Whether `token` is still the newest request for its file.
    #[must_use]
    pub fn is_latest(&self, token: &RequestToken) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token.file)
            == Some(&token.generation)
    }

    /// Retire `token`. Returns whether its result should be applied.
    pub fn finish(&self, token: &RequestToken) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.get(&token.file) == Some(&token.generation) {
            latest.remove(&token.file);
            true
        } else {
            false
        }
    }
}

/// Lets a failure message through once until the condition clears.
///
/// Keyed by what failed (an asset, the executable), so a retry that hits the same
/// problem stays quiet while a different message for the same key is shown.
#[derive(Debug, Default)]
pub struct ReportGate {
    shown: Mutex<HashMap<String, String>>,
}

impl ReportGate {
    /// Returns `true` when `message` should be surfaced for `key`.
    pub fn admit(&self, key: &str, message: &str) -> bool {
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        if shown.get(key).is_some_and(|last| last == message) {
            return false;
        }
        shown.insert(key.to_string(), message.to_string());
        true
    }

    /// Forget the last failure for `key` after a success.
    pub fn clear(&self, key: &str) {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
