//! Dependency provisioning for aipguard.
//!
//! Keeps three assets in the per-user data directory:
//! - the `api-linter` executable, from versioned GitHub releases
//! - the `googleapis` proto tree, from the tip of its `master` branch
//! - the `protobuf` tree (well-known types), from the tip of its `main` branch
//!
//! # Example
//!
//! ```ignore
//! use aipguard_provision::{AssetKind, Provisioner};
//!
//! let provisioner = Provisioner::new(config, Arc::new(HttpClient::new()?))?;
//! let linter = provisioner.ensure(AssetKind::Executable).await?;
//! if let Some(update) = linter.update {
//!     provisioner.apply_update(&update).await?;
//! }
//! ```

pub mod asset;
pub mod extract;
pub mod metadata;
pub mod platform;
pub mod provisioner;

pub use asset::{AssetKind, Corpus};
pub use metadata::{AssetMetadata, MetadataStore};
pub use platform::{Arch, Os, Platform};
pub use provisioner::{AvailableUpdate, Provisioned, Provisioner, is_check_due, is_newer};
