//! Proptest strategies for generating valid rule configurations.
//!
//! Strategies are constructive: every generated rule passes structural
//! validation (non-empty id, name, description, at least one tag and one
//! pattern, only known languages and modifiers), so properties can focus on
//! engine behavior instead of filtering bad inputs.

use proptest::prelude::*;

use tagscan_types::{Confidence, PatternConfig, PatternKind, RuleConfig, ScopeKind, Severity};

/// Maximum patterns per generated rule.
pub const MAX_PATTERNS_PER_RULE: usize = 4;

/// Maximum tags per generated rule.
pub const MAX_TAGS_PER_RULE: usize = 3;

/// Maximum rules per generated set.
pub const MAX_RULES_PER_SET: usize = 8;

pub fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Critical),
        Just(Severity::Important),
        Just(Severity::Moderate),
        Just(Severity::BestPractice),
        Just(Severity::ManualReview),
    ]
}

pub fn arb_confidence() -> impl Strategy<Value = Confidence> {
    prop_oneof![
        Just(Confidence::Low),
        Just(Confidence::Medium),
        Just(Confidence::High),
    ]
}

pub fn arb_scope_kind() -> impl Strategy<Value = ScopeKind> {
    prop_oneof![
        Just(ScopeKind::Code),
        Just(ScopeKind::Comment),
        Just(ScopeKind::String),
    ]
}

/// Literal pattern kinds only; arbitrary regex text is rarely valid.
pub fn arb_literal_kind() -> impl Strategy<Value = PatternKind> {
    prop_oneof![Just(PatternKind::String), Just(PatternKind::Substring)]
}

/// Alphanumeric needle text, safe under every pattern kind.
pub fn arb_needle() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{1,12}"
}

pub fn arb_tag() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,8}(\\.[A-Z][a-z]{1,8}){0,2}"
}

pub fn arb_pattern_config() -> impl Strategy<Value = PatternConfig> {
    (
        arb_needle(),
        arb_literal_kind(),
        prop::collection::vec(arb_scope_kind(), 0..=2),
        arb_confidence(),
        prop::bool::ANY,
    )
        .prop_map(|(pattern, kind, scopes, confidence, ci)| PatternConfig {
            pattern,
            kind,
            scopes,
            confidence,
            modifiers: if ci { vec!["i".to_string()] } else { vec![] },
            xpath: None,
            jsonpath: None,
            ypath: None,
        })
}

pub fn arb_rule_config() -> impl Strategy<Value = RuleConfig> {
    (
        "[a-z]{2,6}\\.[a-z]{2,8}",
        "[A-Za-z ]{3,24}",
        prop::collection::vec(arb_tag(), 1..=MAX_TAGS_PER_RULE),
        arb_severity(),
        prop::collection::vec(arb_pattern_config(), 1..=MAX_PATTERNS_PER_RULE),
    )
        .prop_map(|(id, name, tags, severity, patterns)| RuleConfig {
            id,
            name,
            description: Some("generated rule".to_string()),
            tags,
            severity,
            overrides: vec![],
            applies_to: vec![],
            does_not_apply_to: vec![],
            applies_to_file_regex: vec![],
            exclude_file_regex: vec![],
            depends_on_tags: vec![],
            patterns,
            conditions: vec![],
            must_match: vec![],
            must_not_match: vec![],
            disabled: false,
        })
}

/// A rule set with unique ids.
pub fn arb_rule_set() -> impl Strategy<Value = Vec<RuleConfig>> {
    prop::collection::vec(arb_rule_config(), 1..=MAX_RULES_PER_SET).prop_map(|mut rules| {
        for (i, rule) in rules.iter_mut().enumerate() {
            rule.id = format!("{}.{i:02}", rule.id);
        }
        rules
    })
}
