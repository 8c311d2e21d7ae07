//! Rule compilation and validation.
//!
//! A [`RuleConfig`] is the on-disk record; a [`CompiledRule`] is the
//! evaluatable form: the rule's patterns OR'd into one clause, each condition
//! compiled to a proximity filter, language and filename selectors resolved.
//! Validation collects every problem across the whole set instead of
//! stopping at the first.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use tagscan_types::{Confidence, ConditionConfig, PatternConfig, PatternKind, RuleConfig, Severity};

use crate::cancel::{CancelToken, Cancelled};
use crate::clause::{
    cached_regex, evaluate, Capture, Clause, RegexClause, SubstringClause, FLAG_CASE_INSENSITIVE,
    FLAG_MULTI_LINE,
};
use crate::language::Language;
use crate::source::SourceView;
use crate::within::{evaluate_within, WithinClause, WithinMode};

/// One problem found while validating a rule set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleIssue {
    #[error("rule at index {index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate rule id `{rule_id}`")]
    DuplicateId { rule_id: String },

    #[error("rule `{rule_id}` has no name")]
    MissingName { rule_id: String },

    #[error("rule `{rule_id}` has no description")]
    MissingDescription { rule_id: String },

    #[error("rule `{rule_id}` has no tags")]
    MissingTags { rule_id: String },

    #[error("rule `{rule_id}` has no patterns")]
    MissingPatterns { rule_id: String },

    #[error("rule `{rule_id}` has an empty pattern")]
    EmptyPattern { rule_id: String },

    #[error("rule `{rule_id}` names unknown language `{language}`")]
    UnknownLanguage { rule_id: String, language: String },

    #[error("rule `{rule_id}` pattern `{pattern}` is not a valid regex: {message}")]
    InvalidRegex {
        rule_id: String,
        pattern: String,
        message: String,
    },

    #[error("rule `{rule_id}` file regex `{pattern}` is not valid: {message}")]
    InvalidFileRegex {
        rule_id: String,
        pattern: String,
        message: String,
    },

    #[error("rule `{rule_id}` uses unknown modifier `{modifier}`")]
    UnknownModifier { rule_id: String, modifier: String },

    #[error("rule `{rule_id}` has invalid search_in `{value}`")]
    InvalidSearchIn { rule_id: String, value: String },

    #[error("rule `{rule_id}` uses structured path targeting, which this engine does not support")]
    StructuredPath { rule_id: String },

    #[error("rule `{rule_id}` depends on tag `{tag}` which no rule produces")]
    MissingTagProducer { rule_id: String, tag: String },

    #[error("rule `{rule_id}` overrides unknown rule `{target}`")]
    UnknownOverride { rule_id: String, target: String },

    #[error("rule `{rule_id}` is overridden by `{overrider}` but does not carry its depends-on tag `{tag}`")]
    OverrideDropsDependency {
        rule_id: String,
        overrider: String,
        tag: String,
    },

    #[error("rule `{rule_id}` failed must-match self-test: `{snippet}`")]
    MustMatchFailed { rule_id: String, snippet: String },

    #[error("rule `{rule_id}` failed must-not-match self-test: `{snippet}`")]
    MustNotMatchFailed { rule_id: String, snippet: String },
}

/// Compilation refused because validation found problems.
#[derive(Debug, Error)]
#[error("rule set has {} issue(s); first: {}", .issues.len(), .issues[0])]
pub struct RulesError {
    pub issues: Vec<RuleIssue>,
}

/// A condition compiled to a proximity filter plus its language selector.
/// A condition that does not apply to the file's language passes the
/// accumulated captures through untouched.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub within: WithinClause,
    pub languages: BTreeSet<Language>,
    pub excluded_languages: BTreeSet<Language>,
}

impl CompiledCondition {
    pub fn applies(&self, language: Language) -> bool {
        if self.excluded_languages.contains(&language) {
            return false;
        }
        self.languages.is_empty() || self.languages.contains(&language)
    }
}

/// An evaluatable rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub severity: Severity,
    pub overrides: Vec<String>,
    pub depends_on_tags: Vec<String>,
    languages: BTreeSet<Language>,
    excluded_languages: BTreeSet<Language>,
    file_regexes: Vec<Arc<Regex>>,
    exclude_file_regexes: Vec<Arc<Regex>>,
    pattern_clause: Clause,
    conditions: Vec<CompiledCondition>,
    /// Confidence per source pattern, indexed by `Capture::pattern_index`.
    confidences: Vec<Confidence>,
    must_match: Vec<String>,
    must_not_match: Vec<String>,
}

impl CompiledRule {
    /// Does this rule apply to a file with this name and language?
    ///
    /// A filename-regex hit selects the rule regardless of language; the
    /// exclusion lists always win.
    pub fn applies(&self, file_name: &str, language: Language) -> bool {
        if self
            .exclude_file_regexes
            .iter()
            .any(|re| re.is_match(file_name))
        {
            return false;
        }
        if self.excluded_languages.contains(&language) {
            return false;
        }
        if self.file_regexes.iter().any(|re| re.is_match(file_name)) {
            return true;
        }
        self.languages.is_empty() || self.languages.contains(&language)
    }

    /// Evaluate the rule against one file: patterns first, then every
    /// applicable condition in order, each filtering the surviving captures.
    pub fn captures(
        &self,
        view: &SourceView,
        token: &CancelToken,
    ) -> Result<Vec<Capture>, Cancelled> {
        let out = evaluate(&self.pattern_clause, view, token)?;
        if !out.matched {
            return Ok(Vec::new());
        }
        let mut captures = out.captures;
        for condition in &self.conditions {
            if !condition.applies(view.language()) {
                continue;
            }
            let out = evaluate_within(&condition.within, &captures, view, token)?;
            if !out.matched {
                return Ok(Vec::new());
            }
            captures = out.captures;
        }
        Ok(captures)
    }

    pub fn confidence_of(&self, capture: &Capture) -> Confidence {
        self.confidences
            .get(capture.pattern_index)
            .copied()
            .unwrap_or_default()
    }

    /// The language self-test snippets are evaluated under: the first
    /// declared language, or C for language-agnostic rules.
    fn self_test_language(&self) -> Language {
        self.languages.iter().next().copied().unwrap_or(Language::C)
    }
}

/// A validated, evaluatable rule set.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    /// Validate and compile. Refuses the whole set when validation finds any
    /// problem; disabled rules are validated but not compiled in.
    pub fn compile(configs: &[RuleConfig]) -> Result<Self, RulesError> {
        let issues = validate(configs);
        if !issues.is_empty() {
            return Err(RulesError { issues });
        }
        let rules = configs
            .iter()
            .filter(|c| !c.disabled)
            .map(compile_rule)
            .collect();
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule's must-match / must-not-match snippets.
    pub fn self_test(&self) -> Vec<RuleIssue> {
        let token = CancelToken::unbounded();
        let mut issues = Vec::new();
        for rule in &self.rules {
            let language = rule.self_test_language();
            for snippet in &rule.must_match {
                let view = SourceView::new(snippet.clone(), language);
                if rule.captures(&view, &token).map_or(true, |c| c.is_empty()) {
                    issues.push(RuleIssue::MustMatchFailed {
                        rule_id: rule.id.clone(),
                        snippet: snippet.clone(),
                    });
                }
            }
            for snippet in &rule.must_not_match {
                let view = SourceView::new(snippet.clone(), language);
                if rule
                    .captures(&view, &token)
                    .map_or(false, |c| !c.is_empty())
                {
                    issues.push(RuleIssue::MustNotMatchFailed {
                        rule_id: rule.id.clone(),
                        snippet: snippet.clone(),
                    });
                }
            }
        }
        issues
    }
}

/// Check a rule set against the full validation catalog.
pub fn validate(configs: &[RuleConfig]) -> Vec<RuleIssue> {
    let mut issues = Vec::new();
    let mut seen_ids = HashSet::new();
    let by_id: HashMap<&str, &RuleConfig> = configs.iter().map(|c| (c.id.as_str(), c)).collect();
    let produced_tags: HashSet<&str> = configs
        .iter()
        .flat_map(|c| c.tags.iter().map(String::as_str))
        .collect();

    for (index, config) in configs.iter().enumerate() {
        if config.id.is_empty() {
            issues.push(RuleIssue::EmptyId { index });
            continue;
        }
        let rule_id = config.id.clone();
        if !seen_ids.insert(config.id.as_str()) {
            issues.push(RuleIssue::DuplicateId {
                rule_id: rule_id.clone(),
            });
        }
        if config.name.is_empty() {
            issues.push(RuleIssue::MissingName {
                rule_id: rule_id.clone(),
            });
        }
        if config.description.as_deref().unwrap_or("").is_empty() {
            issues.push(RuleIssue::MissingDescription {
                rule_id: rule_id.clone(),
            });
        }
        if config.tags.is_empty() {
            issues.push(RuleIssue::MissingTags {
                rule_id: rule_id.clone(),
            });
        }
        if config.patterns.is_empty() {
            issues.push(RuleIssue::MissingPatterns {
                rule_id: rule_id.clone(),
            });
        }

        for name in config.applies_to.iter().chain(&config.does_not_apply_to) {
            if Language::from_name(name).is_none() {
                issues.push(RuleIssue::UnknownLanguage {
                    rule_id: rule_id.clone(),
                    language: name.clone(),
                });
            }
        }

        for expr in config
            .applies_to_file_regex
            .iter()
            .chain(&config.exclude_file_regex)
        {
            if let Err(err) = Regex::new(expr) {
                issues.push(RuleIssue::InvalidFileRegex {
                    rule_id: rule_id.clone(),
                    pattern: expr.clone(),
                    message: err.to_string(),
                });
            }
        }

        for pattern in &config.patterns {
            validate_pattern(&rule_id, pattern, &mut issues);
        }

        for condition in &config.conditions {
            validate_pattern(&rule_id, &condition.pattern, &mut issues);
            let value = condition.search_in.as_deref().unwrap_or("");
            if parse_search_in(value).is_none() {
                issues.push(RuleIssue::InvalidSearchIn {
                    rule_id: rule_id.clone(),
                    value: value.to_string(),
                });
            }
            for name in condition
                .applies_to
                .iter()
                .chain(&condition.does_not_apply_to)
            {
                if Language::from_name(name).is_none() {
                    issues.push(RuleIssue::UnknownLanguage {
                        rule_id: rule_id.clone(),
                        language: name.clone(),
                    });
                }
            }
        }

        for tag in &config.depends_on_tags {
            if !produced_tags.contains(tag.as_str()) {
                issues.push(RuleIssue::MissingTagProducer {
                    rule_id: rule_id.clone(),
                    tag: tag.clone(),
                });
            }
        }

        for target in &config.overrides {
            let Some(overridden) = by_id.get(target.as_str()) else {
                issues.push(RuleIssue::UnknownOverride {
                    rule_id: rule_id.clone(),
                    target: target.clone(),
                });
                continue;
            };
            // Overrides are resolved per file, tag dependencies across the
            // whole scan. An overridden rule missing the overrider's
            // depends-on tags can therefore vanish when those tags do:
            // its matches were already consumed by the override.
            for tag in &config.depends_on_tags {
                if !overridden.depends_on_tags.contains(tag) {
                    issues.push(RuleIssue::OverrideDropsDependency {
                        rule_id: target.clone(),
                        overrider: rule_id.clone(),
                        tag: tag.clone(),
                    });
                }
            }
        }
    }

    issues
}

fn validate_pattern(rule_id: &str, pattern: &PatternConfig, issues: &mut Vec<RuleIssue>) {
    if pattern.pattern.is_empty() {
        issues.push(RuleIssue::EmptyPattern {
            rule_id: rule_id.to_string(),
        });
    }
    if pattern.xpath.is_some() || pattern.jsonpath.is_some() || pattern.ypath.is_some() {
        issues.push(RuleIssue::StructuredPath {
            rule_id: rule_id.to_string(),
        });
    }
    for modifier in &pattern.modifiers {
        // "nb" asked the original backtracking engine not to backtrack;
        // this engine never does, so the modifier is accepted and ignored.
        if !matches!(modifier.as_str(), "i" | "m" | "nb") {
            issues.push(RuleIssue::UnknownModifier {
                rule_id: rule_id.to_string(),
                modifier: modifier.clone(),
            });
        }
    }
    if matches!(pattern.kind, PatternKind::Regex | PatternKind::RegexWord) {
        let expression = regex_expression(pattern);
        if let Err(err) = Regex::new(&expression) {
            issues.push(RuleIssue::InvalidRegex {
                rule_id: rule_id.to_string(),
                pattern: pattern.pattern.clone(),
                message: err.to_string(),
            });
        }
    }
}

/// Parse a condition's `search_in` value. Empty means finding-only.
pub fn parse_search_in(value: &str) -> Option<WithinMode> {
    match value {
        "" | "finding-only" => Some(WithinMode::FindingOnly),
        "same-line" => Some(WithinMode::SameLine),
        "same-file" => Some(WithinMode::SameFile),
        "only-before" => Some(WithinMode::OnlyBefore),
        "only-after" => Some(WithinMode::OnlyAfter),
        other => {
            let inner = other
                .strip_prefix("finding-region(")?
                .strip_suffix(')')?;
            let (before, after) = inner.split_once(',')?;
            let before: i64 = before.trim().parse().ok()?;
            let after: i64 = after.trim().parse().ok()?;
            if before > 0 || after < 0 || (before == 0 && after == 0) {
                return None;
            }
            Some(WithinMode::FindingRegion { before, after })
        }
    }
}

fn regex_expression(pattern: &PatternConfig) -> String {
    match pattern.kind {
        PatternKind::RegexWord => format!(r"\b(?:{})\b", pattern.pattern),
        _ => pattern.pattern.clone(),
    }
}

fn pattern_flags(pattern: &PatternConfig) -> u8 {
    let mut flags = 0;
    for modifier in &pattern.modifiers {
        match modifier.as_str() {
            "i" => flags |= FLAG_CASE_INSENSITIVE,
            "m" => flags |= FLAG_MULTI_LINE,
            _ => {}
        }
    }
    flags
}

fn pattern_leaf(pattern: &PatternConfig, pattern_index: usize) -> Clause {
    let flags = pattern_flags(pattern);
    match pattern.kind {
        PatternKind::Regex | PatternKind::RegexWord => Clause::Regex(RegexClause {
            expression: regex_expression(pattern),
            flags,
            scopes: pattern.scopes.clone(),
            pattern_index,
        }),
        PatternKind::String | PatternKind::Substring => Clause::Substring(SubstringClause {
            needle: pattern.pattern.clone(),
            case_insensitive: flags & FLAG_CASE_INSENSITIVE != 0,
            word_boundaries: pattern.kind == PatternKind::String,
            scopes: pattern.scopes.clone(),
            pattern_index,
        }),
    }
}

fn languages_of(names: &[String]) -> BTreeSet<Language> {
    names.iter().filter_map(|n| Language::from_name(n)).collect()
}

fn compile_condition(condition: &ConditionConfig) -> CompiledCondition {
    let mode = parse_search_in(condition.search_in.as_deref().unwrap_or(""))
        .unwrap_or(WithinMode::FindingOnly);
    CompiledCondition {
        within: WithinClause {
            child: pattern_leaf(&condition.pattern, 0),
            mode,
            invert: condition.negate_finding,
        },
        languages: languages_of(&condition.applies_to),
        excluded_languages: languages_of(&condition.does_not_apply_to),
    }
}

/// Assumes the config already passed [`validate`].
fn compile_rule(config: &RuleConfig) -> CompiledRule {
    let leaves = config
        .patterns
        .iter()
        .enumerate()
        .map(|(i, p)| pattern_leaf(p, i))
        .collect();
    let compile_file_regexes = |exprs: &[String]| {
        exprs
            .iter()
            .filter_map(|e| cached_regex(e, 0))
            .collect::<Vec<_>>()
    };
    CompiledRule {
        id: config.id.clone(),
        name: config.name.clone(),
        tags: config.tags.clone(),
        severity: config.severity,
        overrides: config.overrides.clone(),
        depends_on_tags: config.depends_on_tags.clone(),
        languages: languages_of(&config.applies_to),
        excluded_languages: languages_of(&config.does_not_apply_to),
        file_regexes: compile_file_regexes(&config.applies_to_file_regex),
        exclude_file_regexes: compile_file_regexes(&config.exclude_file_regex),
        pattern_clause: Clause::Or(leaves),
        conditions: config.conditions.iter().map(compile_condition).collect(),
        confidences: config.patterns.iter().map(|p| p.confidence).collect(),
        must_match: config.must_match.clone(),
        must_not_match: config.must_not_match.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_json(json: &str) -> RuleConfig {
        serde_json::from_str(json).unwrap()
    }

    fn minimal(id: &str, pattern: &str) -> RuleConfig {
        rule_json(&format!(
            r#"{{ "id": "{id}", "name": "n", "description": "d", "tags": ["T.{id}"],
                  "patterns": [{{ "pattern": "{pattern}" }}] }}"#
        ))
    }

    // ---- validation ----

    #[test]
    fn valid_set_has_no_issues() {
        let rules = vec![minimal("r1", "foo"), minimal("r2", "bar")];
        assert!(validate(&rules).is_empty());
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let rules = vec![minimal("r1", "foo"), minimal("r1", "bar")];
        let issues = validate(&rules);
        assert!(issues.contains(&RuleIssue::DuplicateId {
            rule_id: "r1".to_string()
        }));
    }

    #[test]
    fn missing_fields_are_reported() {
        let rule = rule_json(r#"{ "id": "r1", "name": "" }"#);
        let issues = validate(&[rule]);
        for expected in [
            RuleIssue::MissingName {
                rule_id: "r1".to_string(),
            },
            RuleIssue::MissingDescription {
                rule_id: "r1".to_string(),
            },
            RuleIssue::MissingTags {
                rule_id: "r1".to_string(),
            },
            RuleIssue::MissingPatterns {
                rule_id: "r1".to_string(),
            },
        ] {
            assert!(issues.contains(&expected), "missing {expected:?}");
        }
    }

    #[test]
    fn invalid_regex_is_reported() {
        let mut rule = minimal("r1", "(unclosed");
        rule.patterns[0].kind = PatternKind::Regex;
        let issues = validate(&[rule]);
        assert!(matches!(issues[0], RuleIssue::InvalidRegex { .. }));
    }

    #[test]
    fn invalid_regex_in_substring_pattern_is_fine() {
        let mut rule = minimal("r1", "(unclosed");
        rule.patterns[0].kind = PatternKind::Substring;
        assert!(validate(&[rule]).is_empty());
    }

    #[test]
    fn unknown_language_is_reported() {
        let mut rule = minimal("r1", "x");
        rule.applies_to = vec!["cobol".to_string()];
        let issues = validate(&[rule]);
        assert_eq!(
            issues,
            vec![RuleIssue::UnknownLanguage {
                rule_id: "r1".to_string(),
                language: "cobol".to_string()
            }]
        );
    }

    #[test]
    fn unknown_modifier_is_reported_but_nb_is_tolerated() {
        let mut rule = minimal("r1", "x");
        rule.patterns[0].modifiers = vec!["i".into(), "nb".into(), "g".into()];
        let issues = validate(&[rule]);
        assert_eq!(
            issues,
            vec![RuleIssue::UnknownModifier {
                rule_id: "r1".to_string(),
                modifier: "g".to_string()
            }]
        );
    }

    #[test]
    fn structured_paths_are_rejected() {
        let mut rule = minimal("r1", "x");
        rule.patterns[0].xpath = Some("//node".to_string());
        let issues = validate(&[rule]);
        assert_eq!(
            issues,
            vec![RuleIssue::StructuredPath {
                rule_id: "r1".to_string()
            }]
        );
    }

    #[test]
    fn depends_on_tags_needs_a_producer() {
        let mut rule = minimal("r1", "x");
        rule.depends_on_tags = vec!["T.other".to_string()];
        let issues = validate(&[rule.clone()]);
        assert_eq!(
            issues,
            vec![RuleIssue::MissingTagProducer {
                rule_id: "r1".to_string(),
                tag: "T.other".to_string()
            }]
        );

        let mut producer = minimal("r2", "y");
        producer.tags = vec!["T.other".to_string()];
        assert!(validate(&[rule, producer]).is_empty());
    }

    #[test]
    fn overrides_must_name_known_rules() {
        let mut rule = minimal("r1", "x");
        rule.overrides = vec!["ghost".to_string()];
        let issues = validate(&[rule]);
        assert_eq!(
            issues,
            vec![RuleIssue::UnknownOverride {
                rule_id: "r1".to_string(),
                target: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn overridden_rule_must_carry_overrider_dependencies() {
        let mut broad = minimal("r1", "windows");
        let mut narrow = minimal("r2", "windows 2000");
        narrow.overrides = vec!["r1".to_string()];
        narrow.depends_on_tags = vec!["T.r1".to_string()];

        let issues = validate(&[broad.clone(), narrow.clone()]);
        assert_eq!(
            issues,
            vec![RuleIssue::OverrideDropsDependency {
                rule_id: "r1".to_string(),
                overrider: "r2".to_string(),
                tag: "T.r1".to_string()
            }]
        );

        broad.depends_on_tags = vec!["T.r1".to_string()];
        assert!(validate(&[broad, narrow]).is_empty());
    }

    #[test]
    fn invalid_search_in_is_reported() {
        for bad in [
            "nearby",
            "finding-region(1,2)",
            "finding-region(0,0)",
            "finding-region(-1,-1)",
            "finding-region(1",
        ] {
            let mut rule = minimal("r1", "x");
            rule.conditions = vec![ConditionConfig {
                pattern: rule.patterns[0].clone(),
                search_in: Some(bad.to_string()),
                negate_finding: false,
                applies_to: vec![],
                does_not_apply_to: vec![],
            }];
            let issues = validate(&[rule]);
            assert!(
                issues
                    .iter()
                    .any(|i| matches!(i, RuleIssue::InvalidSearchIn { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn search_in_parses_every_mode() {
        assert_eq!(parse_search_in(""), Some(WithinMode::FindingOnly));
        assert_eq!(parse_search_in("finding-only"), Some(WithinMode::FindingOnly));
        assert_eq!(parse_search_in("same-line"), Some(WithinMode::SameLine));
        assert_eq!(parse_search_in("same-file"), Some(WithinMode::SameFile));
        assert_eq!(parse_search_in("only-before"), Some(WithinMode::OnlyBefore));
        assert_eq!(parse_search_in("only-after"), Some(WithinMode::OnlyAfter));
        assert_eq!(
            parse_search_in("finding-region(-2, 3)"),
            Some(WithinMode::FindingRegion {
                before: -2,
                after: 3
            })
        );
    }

    // ---- compilation and evaluation ----

    fn compile_one(config: RuleConfig) -> CompiledRuleSet {
        CompiledRuleSet::compile(&[config]).unwrap()
    }

    fn run(rule: &CompiledRule, text: &str, language: Language) -> Vec<Capture> {
        let view = SourceView::new(text.to_string(), language);
        rule.captures(&view, &CancelToken::unbounded()).unwrap()
    }

    #[test]
    fn compile_refuses_invalid_sets() {
        let err = CompiledRuleSet::compile(&[minimal("", "x")]).unwrap_err();
        assert_eq!(err.issues, vec![RuleIssue::EmptyId { index: 0 }]);
    }

    #[test]
    fn disabled_rules_are_not_compiled_in() {
        let mut rule = minimal("r1", "x");
        rule.disabled = true;
        let set = compile_one(rule);
        assert!(set.is_empty());
    }

    #[test]
    fn patterns_are_ored() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "alpha" }, { "pattern": "beta" }] }"#,
        );
        let set = compile_one(rule);
        let captures = run(&set.rules()[0], "only beta here", Language::C);
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].pattern_index, 1);
    }

    #[test]
    fn string_kind_respects_word_boundaries() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "win", "type": "string" }] }"#,
        );
        let set = compile_one(rule);
        assert!(run(&set.rules()[0], "darwin kernel", Language::C).is_empty());
        assert_eq!(run(&set.rules()[0], "win or lose", Language::C).len(), 1);
    }

    #[test]
    fn regex_word_wraps_expression() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "cat|dog", "type": "regex_word" }] }"#,
        );
        let set = compile_one(rule);
        assert!(run(&set.rules()[0], "concatenate", Language::C).is_empty());
        assert_eq!(run(&set.rules()[0], "a dog barks", Language::C).len(), 1);
    }

    #[test]
    fn per_pattern_confidence_lookup() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "weak", "confidence": "low" },
                              { "pattern": "strong", "confidence": "high" }] }"#,
        );
        let set = compile_one(rule);
        let rule = &set.rules()[0];
        let captures = run(rule, "weak strong", Language::C);
        assert_eq!(rule.confidence_of(&captures[0]), Confidence::Low);
        assert_eq!(rule.confidence_of(&captures[1]), Confidence::High);
    }

    #[test]
    fn conditions_filter_captures() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "alloc", "type": "substring" }],
                 "conditions": [{
                     "pattern": { "pattern": "free", "type": "substring" },
                     "search_in": "same-line"
                 }] }"#,
        );
        let set = compile_one(rule);
        let captures = run(&set.rules()[0], "alloc free\nalloc alone\n", Language::C);
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].boundary.start, 0);
    }

    #[test]
    fn non_applicable_condition_passes_captures_through() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "alloc", "type": "substring" }],
                 "conditions": [{
                     "pattern": { "pattern": "free", "type": "substring" },
                     "search_in": "same-line",
                     "applies_to": ["python"]
                 }] }"#,
        );
        let set = compile_one(rule);
        // The condition only applies to python; a C file skips it.
        assert_eq!(run(&set.rules()[0], "alloc alone\n", Language::C).len(), 1);
        let view = SourceView::new("alloc alone\n".to_string(), Language::Python);
        let captures = set.rules()[0]
            .captures(&view, &CancelToken::unbounded())
            .unwrap();
        assert!(captures.is_empty());
    }

    // ---- selection ----

    #[test]
    fn language_allow_and_deny_lists() {
        let mut rule = minimal("r1", "x");
        rule.applies_to = vec!["csharp".to_string()];
        let set = compile_one(rule);
        assert!(set.rules()[0].applies("a.cs", Language::CSharp));
        assert!(!set.rules()[0].applies("a.py", Language::Python));

        let mut rule = minimal("r2", "x");
        rule.does_not_apply_to = vec!["python".to_string()];
        let set = compile_one(rule);
        assert!(set.rules()[0].applies("a.cs", Language::CSharp));
        assert!(!set.rules()[0].applies("a.py", Language::Python));
    }

    #[test]
    fn file_regex_selects_regardless_of_language() {
        let mut rule = minimal("r1", "x");
        rule.applies_to = vec!["csharp".to_string()];
        rule.applies_to_file_regex = vec![r"\.config$".to_string()];
        let set = compile_one(rule);
        assert!(set.rules()[0].applies("web.config", Language::Plaintext));
        assert!(!set.rules()[0].applies("readme.txt", Language::Plaintext));
    }

    #[test]
    fn exclude_file_regex_wins() {
        let mut rule = minimal("r1", "x");
        rule.exclude_file_regex = vec![r"_test\.".to_string()];
        let set = compile_one(rule);
        assert!(set.rules()[0].applies("main.go", Language::Go));
        assert!(!set.rules()[0].applies("main_test.go", Language::Go));
    }

    // ---- self tests ----

    #[test]
    fn self_test_passes_and_fails() {
        let rule = rule_json(
            r#"{ "id": "r1", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "windows 2000", "type": "string", "modifiers": ["i"] }],
                 "must-match": ["Windows 2000 Server"],
                 "must-not-match": ["windows 3.1"] }"#,
        );
        let set = compile_one(rule);
        assert!(set.self_test().is_empty());

        let broken = rule_json(
            r#"{ "id": "r2", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "windows 2000", "type": "string" }],
                 "must-match": ["windows 95"] }"#,
        );
        let set = compile_one(broken);
        let issues = set.self_test();
        assert_eq!(
            issues,
            vec![RuleIssue::MustMatchFailed {
                rule_id: "r2".to_string(),
                snippet: "windows 95".to_string()
            }]
        );
    }
}
