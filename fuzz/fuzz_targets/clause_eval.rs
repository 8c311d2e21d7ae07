//! Fuzz target for rule evaluation over arbitrary source text.
//!
//! Builds structurally valid substring rules from arbitrary needles and
//! runs them against arbitrary text. Evaluation must not panic and every
//! reported boundary must lie inside the file.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tagscan_domain::{process_file, CancelToken, CompiledRuleSet, Language};
use tagscan_types::{PatternConfig, PatternKind, RuleConfig};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    text: String,
    needles: Vec<String>,
    case_insensitive: bool,
    word_boundaries: bool,
}

fuzz_target!(|input: FuzzInput| {
    let patterns: Vec<PatternConfig> = input
        .needles
        .iter()
        .take(4)
        .filter(|n| !n.is_empty())
        .map(|needle| PatternConfig {
            pattern: needle.clone(),
            kind: if input.word_boundaries {
                PatternKind::String
            } else {
                PatternKind::Substring
            },
            scopes: vec![],
            confidence: Default::default(),
            modifiers: if input.case_insensitive {
                vec!["i".to_string()]
            } else {
                vec![]
            },
            xpath: None,
            jsonpath: None,
            ypath: None,
        })
        .collect();
    if patterns.is_empty() {
        return;
    }

    let config = RuleConfig {
        id: "fuzz.rule".to_string(),
        name: "fuzz".to_string(),
        description: Some("fuzz".to_string()),
        tags: vec!["Fuzz".to_string()],
        severity: Default::default(),
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
    };
    let Ok(set) = CompiledRuleSet::compile(&[config]) else {
        return;
    };

    let len = input.text.len();
    let matches = process_file(
        &set,
        "fuzz.c",
        input.text,
        Language::C,
        &CancelToken::unbounded(),
    )
    .expect("unbounded token never cancels");
    for m in &matches {
        assert!(m.record.boundary.end() <= len);
        assert!(!m.record.sample.is_empty());
    }
});
