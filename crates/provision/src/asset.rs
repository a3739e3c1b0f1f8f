//! The managed assets.

use std::fmt;

/// GitHub repository publishing api-linter releases.
pub const EXECUTABLE_REPO: &str = "googleapis/api-linter";

/// Identifier of the executable asset.
pub const EXECUTABLE_ID: &str = "api-linter";

/// A proto source tree used only as an import search path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corpus {
    /// `googleapis/googleapis`: `google/api/*.proto`, `google/type/*.proto`, ...
    Googleapis,
    /// `protocolbuffers/protobuf`: the well-known types under `src/`.
    Protobuf,
}

impl Corpus {
    /// Every corpus, in import precedence order.
    pub const ALL: [Self; 2] = [Self::Googleapis, Self::Protobuf];

    /// Stable identifier, also the directory and sidecar name.
    #[must_use]
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Googleapis => "googleapis",
            Self::Protobuf => "protobuf",
        }
    }

    /// `owner/name` on GitHub.
    #[must_use]
    pub fn repo(self) -> &'static str {
        match self {
            Self::Googleapis => "googleapis/googleapis",
            Self::Protobuf => "protocolbuffers/protobuf",
        }
    }

    /// Branch the corpus tracks.
    #[must_use]
    pub fn git_ref(self) -> &'static str {
        match self {
            Self::Googleapis => "master",
            Self::Protobuf => "main",
        }
    }

    /// Directory inside the corpus that is passed as the import path.
    #[must_use]
    pub fn import_subdir(self) -> Option<&'static str> {
        match self {
            Self::Googleapis => None,
            Self::Protobuf => Some("src"),
        }
    }
}

/// Something the provisioner installs and keeps fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// The api-linter executable.
    Executable,
    /// A reference corpus.
    Corpus(Corpus),
}

impl AssetKind {
    /// Stable identifier used for file names.
    #[must_use]
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Executable => EXECUTABLE_ID,
            Self::Corpus(corpus) => corpus.identifier(),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
