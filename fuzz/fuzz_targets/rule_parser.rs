//! Fuzz target for rule file parsing and validation.
//!
//! Feeds arbitrary bytes through JSON deserialization, the validation
//! catalog, and rule compilation. None of the three layers may panic,
//! whatever the input.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tagscan_domain::{validate, CompiledRuleSet};
use tagscan_types::RuleConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(configs) = serde_json::from_str::<Vec<RuleConfig>>(text) else {
        return;
    };
    let issues = validate(&configs);
    match CompiledRuleSet::compile(&configs) {
        Ok(_) => assert!(issues.is_empty()),
        Err(err) => assert_eq!(err.issues, issues),
    }
});
