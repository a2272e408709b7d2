//! JobSift Core Library
//!
//! This crate provides the filtering engine behind the JobSift browser
//! extension: it decides, card by card, whether a job listing on a recruiting
//! site is hidden, and keeps that decision current as the page and the user's
//! settings change.
//!
//! # Architecture
//!
//! Site adapters expose the page through two small capabilities,
//! [`CardReader`] (enumerate cards, read their fields, toggle visibility) and
//! [`ContainerSource`] (locate and observe the card container). Everything
//! else is site-independent and driven by a [`SiteProfile`]. Rules are
//! normalized once at load time so a filter pass only compares prepared
//! strings.
//!
//! # Modules
//!
//! - `normalize`: title normalization and compressed forms
//! - `matcher`: whitelist, blacklist and company matching
//! - `rules`: rule sets built from raw settings
//! - `site`: per-site capability profiles
//! - `card`: card records and the card reader capability
//! - `engine`: precedence chain and filter passes
//! - `watcher`: container acquisition and mutation policy
//! - `store`: settings store adapter
//! - `session`: event loop tying the above together (`runtime` feature)
//! - `memory`: in-memory page for the CLI and tests
//! - `config`: session timing configuration
//! - `types`: shared type definitions

pub mod card;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod memory;
pub mod normalize;
pub mod rules;
#[cfg(feature = "runtime")]
pub mod session;
pub mod site;
pub mod store;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use card::{CardReader, CardRecord};
pub use config::SessionConfig;
pub use engine::{evaluate_card, FilterEngine, PassSummary};
pub use error::{CardField, FilterError};
pub use matcher::{company_alternation, matches_blacklist, matches_company, matches_whitelist, Keyword};
pub use normalize::{normalize, NormalizedText};
pub use rules::{split_rule_text, RawSettings, RuleSet};
pub use site::{MutationPolicy, SiteProfile};
pub use store::ChangeSet;
pub use types::{CardState, HideReason, NormalizeMode, ShowStyle, Verdict, Visibility};
pub use watcher::{ChangeWatcher, ContainerSource, MutationBatch, RetryPolicy};

#[cfg(feature = "runtime")]
pub use session::{FilterSession, PageEvent};
#[cfg(feature = "runtime")]
pub use store::{load_rules, MemoryStore, RuleStore};
