//! Platform detection and release target resolution.
//!
//! api-linter publishes release archives named
//! `api-linter-<version>-<os>-<arch>.tar.gz`. Which `(os, arch)` pairs exist is
//! fixed by [`SUPPORTED`]; a machine without its own build may be mapped onto
//! another one through [`FALLBACKS`]. Nothing else is substituted.

use aipguard_core::{Error, Result};
use std::fmt;

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux
    Linux,
    /// macOS
    Darwin,
    /// Windows
    Windows,
}

impl Os {
    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "darwin" | "macos" | "osx" => Some(Self::Darwin),
            "windows" | "win32" => Some(Self::Windows),
            _ => None,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Darwin => write!(f, "darwin"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// x86-64, `amd64` in release names
    X86_64,
    /// 64-bit ARM
    Arm64,
}

impl Arch {
    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "arm64" | "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => write!(f, "amd64"),
            Self::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Platforms with a published api-linter build.
pub const SUPPORTED: &[Platform] = &[
    Platform::new(Os::Linux, Arch::X86_64),
    Platform::new(Os::Linux, Arch::Arm64),
    Platform::new(Os::Darwin, Arch::X86_64),
    Platform::new(Os::Darwin, Arch::Arm64),
    Platform::new(Os::Windows, Arch::X86_64),
];

/// `(host, substitute)` pairs for hosts without their own build.
///
/// Windows on ARM runs the x86-64 build under emulation.
pub const FALLBACKS: &[(Platform, Platform)] = &[(
    Platform::new(Os::Windows, Arch::Arm64),
    Platform::new(Os::Windows, Arch::X86_64),
)];

/// Platform identifier combining OS and architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system
    pub os: Os,
    /// CPU architecture
    pub arch: Arch,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Get the current platform.
    pub fn current() -> Result<Self> {
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;
        match (Os::parse(os), Arch::parse(arch)) {
            (Some(os), Some(arch)) => Ok(Self::new(os, arch)),
            _ => Err(Error::UnsupportedPlatform {
                platform: format!("{os}/{arch}"),
            }),
        }
    }

    /// Parse from string like "darwin-arm64" or "linux/amd64".
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (os, arch) = s.split_once(['-', '/'])?;
        Some(Self::new(Os::parse(os)?, Arch::parse(arch)?))
    }

    /// The platform whose release archive should be installed on this one.
    pub fn release_target(self) -> Result<Self> {
        if SUPPORTED.contains(&self) {
            return Ok(self);
        }
        FALLBACKS
            .iter()
            .find(|(host, _)| *host == self)
            .map(|(_, target)| *target)
            .ok_or_else(|| Error::UnsupportedPlatform {
                platform: self.to_string(),
            })
    }

    /// File name of the api-linter binary on this platform.
    #[must_use]
    pub fn executable_name(self) -> &'static str {
        match self.os {
            Os::Windows => "api-linter.exe",
            Os::Linux | Os::Darwin => "api-linter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
