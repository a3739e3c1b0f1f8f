//! Best-effort cleanup.
//!
//! Temp archives, staging directories and backups are removed after the real work
//! has succeeded or failed. A failure to remove them must never change the outcome
//! of that work, so these helpers log and discard.

use std::io::ErrorKind;
use std::path::Path;
use tracing::{trace, warn};

/// Log and discard the result of a cleanup step.
///
/// `NotFound` is expected (something else already cleaned up) and only traced.
pub fn best_effort<T>(operation: &str, path: &Path, result: std::io::Result<T>) {
    match result {
        Ok(_) => trace!(operation, path = %path.display(), "Cleanup done"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!(operation, path = %path.display(), "Nothing to clean up");
        }
        Err(e) => warn!(operation, path = %path.display(), error = %e, "Cleanup failed, ignoring"),
    }
}

/// Remove a file, ignoring failures.
pub async fn remove_file(path: &Path) {
    best_effort("remove_file", path, tokio::fs::remove_file(path).await);
}

/// Remove a directory tree, ignoring failures.
pub async fn remove_dir_all(path: &Path) {
    best_effort("remove_dir_all", path, tokio::fs::remove_dir_all(path).await);
}

/// Synchronous variant of [`remove_dir_all`] for blocking extraction code.
pub fn remove_dir_all_blocking(path: &Path) {
    best_effort("remove_dir_all", path, std::fs::remove_dir_all(path));
}
