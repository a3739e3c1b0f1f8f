//! Error types shared by every aipguard crate.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for aipguard operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(aipguard::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}{}: {source}", display_path(path.as_deref()))]
    #[diagnostic(code(aipguard::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// HTTP request failed or returned an unexpected status
    #[error("Request to {url} failed: {message}")]
    #[diagnostic(code(aipguard::http::failed))]
    Http {
        /// The requested URL
        url: String,
        /// What went wrong
        message: String,
    },

    /// Archive could not be unpacked or did not have the expected layout
    #[error("Failed to extract {archive}: {message}")]
    #[diagnostic(code(aipguard::provision::extract))]
    Extraction {
        /// The archive being extracted
        archive: String,
        /// What went wrong
        message: String,
    },

    /// A managed asset could not be acquired
    #[error("Failed to provision {asset}: {message}")]
    #[diagnostic(
        code(aipguard::provision::failed),
        help("the download is retried the next time the linter runs")
    )]
    Provisioning {
        /// Identifier of the asset
        asset: String,
        /// What went wrong
        message: String,
    },

    /// No release is published for this machine
    #[error("No api-linter release is available for {platform}")]
    #[diagnostic(
        code(aipguard::provision::unsupported_platform),
        help("install api-linter manually and point --executable at it")
    )]
    UnsupportedPlatform {
        /// Platform string such as `freebsd/amd64`
        platform: String,
    },

    /// The executable does not exist or cannot be executed
    #[error("api-linter executable not found at {}", path.display())]
    #[diagnostic(
        code(aipguard::invoke::not_found),
        help("check the configured executable path or remove it to use the managed download")
    )]
    ExecutableNotFound {
        /// The path that was resolved for the executable
        path: PathBuf,
    },

    /// The executable ran but exited with a code other than 0 or 1
    #[error("{} exited with {}", path.display(), display_code(*code))]
    #[diagnostic(code(aipguard::invoke::exit_status))]
    ProcessFailed {
        /// The executable that was run
        path: PathBuf,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The OS refused to start the process for a reason other than a missing file
    #[error("Failed to start {}: {source}", path.display())]
    #[diagnostic(code(aipguard::invoke::spawn))]
    Spawn {
        /// The executable that was run
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Timeout error
    #[error("Operation timed out after {seconds} seconds")]
    #[diagnostic(code(aipguard::invoke::timeout))]
    Timeout {
        /// The number of seconds before the timeout occurred
        seconds: u64,
    },

    /// Tool output could not be understood
    #[error("Failed to decode api-linter output: {message}")]
    #[diagnostic(code(aipguard::decode::invalid))]
    Decode {
        /// What went wrong
        message: String,
    },

    /// Rule documentation could not be fetched or parsed
    #[error("Failed to load documentation from {url}: {message}")]
    #[diagnostic(code(aipguard::guidance::failed))]
    Enrichment {
        /// The documentation page
        url: String,
        /// What went wrong
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(aipguard::serialization))]
    Serialization {
        /// The error message describing the serialization issue
        message: String,
    },
}

/// Coarse classification used to decide how an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Acquiring the executable or a corpus failed.
    Provisioning,
    /// Running the executable failed.
    Invocation,
    /// The executable's output could not be decoded.
    Decode,
    /// Documentation lookup failed.
    Enrichment,
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.into_boxed_path()),
            operation: operation.into(),
        }
    }

    /// Returns a closure that wraps an I/O error with a path and operation, for `map_err`.
    pub fn io_at(path: &Path, operation: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::io(source, Some(path), operation)
    }

    /// Create an HTTP error
    pub fn http(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(archive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Create a provisioning error
    pub fn provisioning(asset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provisioning {
            asset: asset.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an enrichment error
    pub fn enrichment(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Enrichment {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Which part of the pipeline this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ExecutableNotFound { .. }
            | Self::ProcessFailed { .. }
            | Self::Spawn { .. }
            | Self::Timeout { .. } => ErrorCategory::Invocation,
            Self::Decode { .. } => ErrorCategory::Decode,
            Self::Enrichment { .. } => ErrorCategory::Enrichment,
            Self::Configuration { .. }
            | Self::Io { .. }
            | Self::Http { .. }
            | Self::Extraction { .. }
            | Self::Provisioning { .. }
            | Self::UnsupportedPlatform { .. }
            | Self::Serialization { .. } => ErrorCategory::Provisioning,
        }
    }

    /// Whether this error is allowed to abort an in-flight lint of a file.
    ///
    /// Decode and enrichment failures are always absorbed where they happen.
    #[must_use]
    pub fn terminates_lint(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Provisioning | ErrorCategory::Invocation
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io(source, None, "io")
    }
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| format!(" on {}", p.display()))
        .unwrap_or_default()
}

fn display_code(code: Option<i32>) -> String {
    code.map_or_else(
        || "no exit code (terminated by signal)".to_string(),
        |c| format!("exit code {c}"),
    )
}

/// Result type for aipguard operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_includes_path() {
        let err = Error::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            Some(PathBuf::from("/data/api-linter.json")),
            "read",
        );
        assert_eq!(
            err.to_string(),
            "I/O error during read on /data/api-linter.json: gone"
        );
    }

    #[test]
    fn test_io_error_without_path() {
        let err = Error::from(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "I/O error during io: boom");
    }

    #[test]
    fn test_process_failed_signal() {
        let err = Error::ProcessFailed {
            path: PathBuf::from("/bin/api-linter"),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::provisioning("googleapis", "offline").category(),
            ErrorCategory::Provisioning
        );
        assert_eq!(
            Error::ExecutableNotFound {
                path: PathBuf::from("x")
            }
            .category(),
            ErrorCategory::Invocation
        );
        assert_eq!(Error::decode("bad").category(), ErrorCategory::Decode);
        assert_eq!(
            Error::enrichment("https://linter.aip.dev", "404").category(),
            ErrorCategory::Enrichment
        );
    }

    #[test]
    fn test_only_provisioning_and_invocation_terminate() {
        assert!(Error::http("https://api.github.com", "503").terminates_lint());
        assert!(Error::Timeout { seconds: 5 }.terminates_lint());
        assert!(!Error::decode("bad").terminates_lint());
        assert!(!Error::enrichment("u", "m").terminates_lint());
    }
}
