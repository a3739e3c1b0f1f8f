//! Run api-linter against a `.proto` file and decode what it reports.
//!
//! - [`args`] turns [`aipguard_core::InvocationOptions`] into a command line
//! - [`runner`] spawns the tool and buffers its output
//! - [`decode`] extracts [`aipguard_core::DiagnosticRecord`]s from noisy stdout
//! - [`Linter`] ties them to a [`aipguard_provision::Provisioner`]

pub mod args;
pub mod decode;
pub mod pipeline;
pub mod runner;
pub mod tracker;

pub use args::{ImportContext, Invocation, build};
pub use decode::{decode, try_decode};
pub use pipeline::{LintOutcome, Linter};
pub use runner::{RunOutput, run};
pub use tracker::{LatestRequests, ReportGate, RequestToken};
