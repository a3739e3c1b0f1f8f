//! Rule documentation for api-linter diagnostics.
//!
//! Every diagnostic carries a `rule_doc_uri`. [`GuidanceCache::guidance_for`]
//! fetches that page once per session and condenses it to markdown: the rule's
//! details plus an incorrect and a correct example.

pub mod cache;
pub mod html;

pub use cache::{GuidanceCache, GuidanceText};
pub use html::{Extractor, RuleDoc};
