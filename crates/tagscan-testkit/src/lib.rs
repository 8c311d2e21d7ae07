//! Shared test utilities for the tagscan workspace.
//!
//! This crate provides:
//! - **arb**: Proptest strategies for generating valid rule configurations
//! - **fixtures**: Common rule sets and source snippets used across tests
//! - **schema**: JSON schema validators for the report DTOs
//!
//! # Example
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tagscan_testkit::arb;
//!
//! proptest! {
//!     fn compiles(rules in arb::arb_rule_set()) {
//!         // Generated rule sets are always structurally valid.
//!     }
//! }
//! ```

pub mod arb;
pub mod fixtures;
pub mod schema;

pub use arb::{arb_pattern_config, arb_rule_config, arb_rule_set, arb_severity};
pub use fixtures::{sample_rules, sample_sources};
pub use schema::{validate_rule_configs, validate_scan_report, validate_verify_report};
