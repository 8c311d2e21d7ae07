//! Scope-aware matching and rule resolution for tagscan.
//!
//! This crate is I/O free: callers hand it file text and a rule set, it
//! hands back match records. The pipeline per file is
//! [`SourceView`](source::SourceView) construction,
//! [`CompiledRule`](rules::CompiledRule) evaluation, then whole-corpus
//! resolution via [`resolve`](resolve::resolve).

pub mod cancel;
pub mod clause;
pub mod language;
pub mod process;
pub mod resolve;
pub mod rules;
pub mod source;
pub mod within;

pub use cancel::{CancelToken, Cancelled};
pub use clause::{Capture, Clause, ClauseOutcome};
pub use language::Language;
pub use process::{process_file, ScanMatch};
pub use resolve::resolve;
pub use rules::{validate, CompiledRule, CompiledRuleSet, RuleIssue, RulesError};
pub use source::{Location, SourceView};
pub use within::{WithinClause, WithinMode};
