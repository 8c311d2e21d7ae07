//! Rule-set verification: the static validation catalog plus each rule's
//! must-match / must-not-match self-tests.

use tagscan_domain::{validate, CompiledRuleSet};
use tagscan_types::{RuleConfig, VerifyReport, VERIFY_REPORT_SCHEMA_V1};

use crate::scan::tool_meta;

/// Check a rule set and report every problem found.
///
/// Self-tests only run when static validation passes; snippets evaluated
/// against structurally broken rules would only produce noise.
pub fn verify_rules(configs: &[RuleConfig]) -> VerifyReport {
    let mut issues: Vec<String> = validate(configs).iter().map(ToString::to_string).collect();
    if issues.is_empty() {
        if let Ok(set) = CompiledRuleSet::compile(configs) {
            issues.extend(set.self_test().iter().map(ToString::to_string));
        }
    }
    VerifyReport {
        schema: VERIFY_REPORT_SCHEMA_V1.to_string(),
        tool: tool_meta(),
        valid: issues.is_empty(),
        rules_checked: configs.len() as u32,
        issues,
    }
}
