//! Data types (rule format + reports) for tagscan.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.
//! Rule compilation and validation live in `tagscan-domain`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Schema Identifiers ─────────────────────────────────────────
pub const SCAN_REPORT_SCHEMA_V1: &str = "tagscan.report.v1";
pub const VERIFY_REPORT_SCHEMA_V1: &str = "tagscan.verify.v1";

/// Default per-file evaluation timeout in milliseconds.
pub const DEFAULT_FILE_TIMEOUT_MS: u64 = 60_000;

/// Default maximum file size in bytes; larger files are skipped.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Issue severity, ordered from most to least severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Important,
    Moderate,
    BestPractice,
    ManualReview,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Moderate => "moderate",
            Severity::BestPractice => "best_practice",
            Severity::ManualReview => "manual_review",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Moderate
    }
}

/// Pattern confidence, ordered from least to most certain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Medium
    }
}

/// Lexical classification of a text span.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Code,
    Comment,
    String,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Code, ScopeKind::Comment, ScopeKind::String];
}

/// How a pattern's expression is interpreted.
///
/// `String` is substring search gated on word boundaries; `Substring` matches
/// anywhere. `RegexWord` wraps the expression in `\b(...)\b` at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Regex,
    RegexWord,
    String,
    Substring,
}

impl Default for PatternKind {
    fn default() -> Self {
        PatternKind::Regex
    }
}

/// A byte span into a file's text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct Boundary {
    pub start: usize,
    pub length: usize,
}

impl Boundary {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Boundary) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// True when the byte at `index` lies inside `self`.
    pub fn contains_offset(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// One search pattern inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PatternConfig {
    pub pattern: String,

    #[serde(default, rename = "type")]
    pub kind: PatternKind,

    /// Allowed scopes. Empty (or all three) means "match anywhere".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<ScopeKind>,

    #[serde(default)]
    pub confidence: Confidence,

    /// Modifier flags: "i" (case-insensitive), "m" (multi-line).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,

    /// Structured-path targeting. Parsed but not supported by this engine;
    /// validation rejects rules that set these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonpath: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ypath: Option<String>,
}

/// A proximity condition attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionConfig {
    pub pattern: PatternConfig,

    /// One of: "finding-only", "same-line", "same-file", "only-before",
    /// "only-after", "finding-region(before,after)". Defaults to
    /// "finding-only" when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_in: Option<String>,

    /// Invert the condition: keep findings where the pattern does NOT occur.
    #[serde(default)]
    pub negate_finding: bool,

    /// Languages this condition applies to. Empty means "all".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub does_not_apply_to: Vec<String>,
}

/// The on-disk rule record. Rule files are JSON arrays of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleConfig {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tags propagated to every match this rule produces. At least one is
    /// required.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub severity: Severity,

    /// Rule ids whose matches this rule supersedes when both match at the
    /// same location.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<String>,

    /// Language allow list. Empty means "all languages".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,

    /// Language deny list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub does_not_apply_to: Vec<String>,

    /// Filename regexes this rule applies to (in addition to languages).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to_file_regex: Vec<String>,

    /// Filename regexes this rule never applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_file_regex: Vec<String>,

    /// Tags that must be produced somewhere in the scanned corpus for this
    /// rule's matches to be retained.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<PatternConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionConfig>,

    /// Self-test snippets the rule must match.
    #[serde(default, rename = "must-match", skip_serializing_if = "Vec::is_empty")]
    pub must_match: Vec<String>,

    /// Self-test snippets the rule must not match.
    #[serde(
        default,
        rename = "must-not-match",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub must_not_match: Vec<String>,

    /// Disabled rules are loaded and validated but never selected.
    #[serde(default)]
    pub disabled: bool,
}

/// Scan-wide settings (the `tagscan.json` settings file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScanSettings {
    /// Use the parallel worker pool. The final match set is identical either
    /// way.
    pub parallel: bool,

    /// Worker count for parallel mode. None uses the default pool size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// Per-file evaluation timeout in milliseconds. 0 disables it.
    pub file_timeout_ms: u64,

    /// Overall scan timeout in milliseconds. 0 disables it.
    pub scan_timeout_ms: u64,

    /// File enumeration timeout in milliseconds. 0 disables it.
    pub enumeration_timeout_ms: u64,

    /// Files larger than this many bytes are skipped.
    pub max_file_size_bytes: u64,

    /// Cap on matches per tag across the whole scan. 0 disables the cap.
    pub max_matches_per_tag: u32,

    /// Confidence levels to keep. Empty means "all".
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub confidence_filter: Vec<Confidence>,

    /// Severity levels to keep. Empty means "all".
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub severity_filter: Vec<Severity>,

    /// Include path globs for enumeration. Empty means "all files".
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Exclude path globs for enumeration.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            file_timeout_ms: DEFAULT_FILE_TIMEOUT_MS,
            scan_timeout_ms: 0,
            enumeration_timeout_ms: 0,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            max_matches_per_tag: 0,
            confidence_filter: vec![],
            severity_filter: vec![],
            include: vec![],
            exclude: vec![],
        }
    }
}

/// A single accepted match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchRecord {
    pub rule_id: String,
    pub rule_name: String,
    pub tags: Vec<String>,
    pub severity: Severity,
    pub confidence: Confidence,
    pub file_path: String,
    pub boundary: Boundary,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    /// The matched text, capped at 200 chars.
    pub sample: String,
    /// Surrounding context lines.
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

/// Per-scan counters and aggregate metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ScanMetadata {
    pub files_scanned: u32,
    pub files_skipped_oversize: u32,
    pub files_skipped_unknown_language: u32,
    pub files_timed_out: u32,
    pub files_failed: u32,
    /// Sorted unique tags present in the final match set.
    pub unique_tags: Vec<String>,
    /// Tag occurrence counts in the final match set.
    pub tag_counts: BTreeMap<String, u32>,
    pub elapsed_ms: u64,
    /// True when the overall scan timeout fired before all files were
    /// processed.
    pub timed_out: bool,
}

/// The JSON scan report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScanReport {
    pub schema: String,
    pub tool: ToolMeta,
    pub matches: Vec<MatchRecord>,
    pub metadata: ScanMetadata,
}

/// The JSON rule-verification report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VerifyReport {
    pub schema: String,
    pub tool: ToolMeta,
    pub valid: bool,
    pub rules_checked: u32,
    /// Human-readable descriptions of every problem found.
    pub issues: Vec<String>,
}
