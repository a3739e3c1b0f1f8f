//! Core types and utilities for aipguard.
//!
//! Shared by every crate in the workspace:
//! - [`Error`] and the [`ErrorCategory`] taxonomy deciding what may abort a lint
//! - typed configuration ([`Settings`], [`ProvisionConfig`], [`InvocationOptions`])
//! - [`DiagnosticRecord`], the output of a lint run
//! - the [`HttpFetch`] seam and its `reqwest` implementation
//! - best-effort [`cleanup`] helpers

pub mod cleanup;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod http;

pub use config::{Endpoints, InvocationOptions, ProvisionConfig, Settings};
pub use diagnostic::{DiagnosticRecord, Range};
pub use error::{Error, ErrorCategory, Result};
pub use http::{HttpClient, HttpFetch};
