//! Clause trees and their evaluator.
//!
//! A compiled rule is a closed tree of clauses: regex and substring leaves,
//! proximity filters, and boolean combinators. Evaluation walks the tree
//! against one [`SourceView`] and produces the set of captured boundaries
//! that survive every filter.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tagscan_types::{Boundary, ScopeKind};

use crate::cancel::{CancelToken, Cancelled};
use crate::source::SourceView;
use crate::within::{evaluate_within, WithinClause};

/// Case-insensitive matching (`i` modifier).
pub const FLAG_CASE_INSENSITIVE: u8 = 1 << 0;
/// `^`/`$` match at line boundaries (`m` modifier).
pub const FLAG_MULTI_LINE: u8 = 1 << 1;

/// Process-wide compiled-regex cache.
///
/// Keyed by expression text plus modifier flags, so the same expression with
/// different modifiers compiles separately. Expressions that fail to compile
/// are cached as `None` and never retried; the rule validator is the place
/// that reports them.
static REGEX_CACHE: Lazy<DashMap<(String, u8), Option<Arc<Regex>>>> = Lazy::new(DashMap::new);

/// Fetch or build the compiled regex for `expression` under `flags`.
pub fn cached_regex(expression: &str, flags: u8) -> Option<Arc<Regex>> {
    let key = (expression.to_string(), flags & (FLAG_CASE_INSENSITIVE | FLAG_MULTI_LINE));
    if let Some(entry) = REGEX_CACHE.get(&key) {
        return entry.clone();
    }
    let built = RegexBuilder::new(expression)
        .case_insensitive(key.1 & FLAG_CASE_INSENSITIVE != 0)
        .multi_line(key.1 & FLAG_MULTI_LINE != 0)
        .build();
    let entry = match built {
        Ok(re) => Some(Arc::new(re)),
        Err(err) => {
            tracing::warn!(expression, %err, "regex failed to compile; pattern disabled");
            None
        }
    };
    REGEX_CACHE.insert(key, entry.clone());
    entry
}

/// A regex leaf.
#[derive(Debug, Clone)]
pub struct RegexClause {
    pub expression: String,
    pub flags: u8,
    pub scopes: Vec<ScopeKind>,
    /// Index of the source pattern, for per-pattern confidence lookup.
    pub pattern_index: usize,
}

/// A literal-text leaf.
#[derive(Debug, Clone)]
pub struct SubstringClause {
    pub needle: String,
    pub case_insensitive: bool,
    /// Reject hits whose neighboring bytes are alphanumeric.
    pub word_boundaries: bool,
    pub scopes: Vec<ScopeKind>,
    pub pattern_index: usize,
}

/// One node of a compiled rule.
#[derive(Debug, Clone)]
pub enum Clause {
    Regex(RegexClause),
    Substring(SubstringClause),
    Within(Box<WithinClause>),
    And(Vec<Clause>),
    Or(Vec<Clause>),
    Not(Box<Clause>),
}

/// A boundary captured by a leaf clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub pattern_index: usize,
    pub boundary: Boundary,
}

/// Result of evaluating a clause against one file.
#[derive(Debug, Clone, Default)]
pub struct ClauseOutcome {
    pub matched: bool,
    pub captures: Vec<Capture>,
}

impl ClauseOutcome {
    pub fn no_match() -> Self {
        Self::default()
    }
}

/// Evaluate a clause tree against a whole file.
///
/// `And` threads its accumulated captures through proximity children: a
/// `Within` child filters the captures gathered so far and replaces the set
/// with the survivors. `Not` matches on the child's failure and contributes
/// no captures.
pub fn evaluate(
    clause: &Clause,
    view: &SourceView,
    token: &CancelToken,
) -> Result<ClauseOutcome, Cancelled> {
    token.check()?;
    match clause {
        Clause::Regex(leaf) => Ok(eval_regex(leaf, view, None)),
        Clause::Substring(leaf) => Ok(eval_substring(leaf, view, None)),
        Clause::Within(within) => evaluate_within(within, &[], view, token),
        Clause::And(children) => {
            let mut captures = Vec::new();
            for child in children {
                match child {
                    Clause::Within(within) => {
                        let out = evaluate_within(within, &captures, view, token)?;
                        if !out.matched {
                            return Ok(ClauseOutcome::no_match());
                        }
                        captures = out.captures;
                    }
                    _ => {
                        let out = evaluate(child, view, token)?;
                        if !out.matched {
                            return Ok(ClauseOutcome::no_match());
                        }
                        captures.extend(out.captures);
                    }
                }
            }
            Ok(ClauseOutcome {
                matched: true,
                captures,
            })
        }
        Clause::Or(children) => {
            let mut matched = false;
            let mut captures = Vec::new();
            for child in children {
                let out = evaluate(child, view, token)?;
                if out.matched {
                    matched = true;
                    captures.extend(out.captures);
                }
            }
            Ok(ClauseOutcome { matched, captures })
        }
        Clause::Not(child) => {
            let out = evaluate(child, view, token)?;
            Ok(ClauseOutcome {
                matched: !out.matched,
                captures: Vec::new(),
            })
        }
    }
}

/// Does `clause` match anywhere inside `region`?
///
/// Used by proximity filters, which only need a yes/no answer for each
/// candidate region. Nested proximity clauses fall back to whole-file
/// evaluation; the rule compiler never builds them.
pub(crate) fn matches_in_region(
    clause: &Clause,
    view: &SourceView,
    region: Boundary,
    token: &CancelToken,
) -> Result<bool, Cancelled> {
    token.check()?;
    match clause {
        Clause::Regex(leaf) => Ok(eval_regex(leaf, view, Some(region)).matched),
        Clause::Substring(leaf) => Ok(eval_substring(leaf, view, Some(region)).matched),
        Clause::And(children) => {
            for child in children {
                if !matches_in_region(child, view, region, token)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Clause::Or(children) => {
            for child in children {
                if matches_in_region(child, view, region, token)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Clause::Not(child) => Ok(!matches_in_region(child, view, region, token)?),
        Clause::Within(within) => Ok(evaluate_within(within, &[], view, token)?.matched),
    }
}

fn eval_regex(leaf: &RegexClause, view: &SourceView, region: Option<Boundary>) -> ClauseOutcome {
    let Some(re) = cached_regex(&leaf.expression, leaf.flags) else {
        return ClauseOutcome::no_match();
    };
    let (haystack, offset) = match region {
        Some(r) => (view.text_of(r), r.start.min(view.text().len())),
        None => (view.text(), 0),
    };
    let mut captures = Vec::new();
    for found in re.find_iter(haystack) {
        let boundary = Boundary::new(offset + found.start(), found.len());
        if view.scope_match(&leaf.scopes, boundary) {
            captures.push(Capture {
                pattern_index: leaf.pattern_index,
                boundary,
            });
        }
    }
    ClauseOutcome {
        matched: !captures.is_empty(),
        captures,
    }
}

fn eval_substring(
    leaf: &SubstringClause,
    view: &SourceView,
    region: Option<Boundary>,
) -> ClauseOutcome {
    let (haystack, offset) = match region {
        Some(r) => (view.text_of(r), r.start.min(view.text().len())),
        None => (view.text(), 0),
    };
    let mut captures = Vec::new();
    let mut from = 0;
    // Advance by the needle's first char so `from` stays on a char boundary.
    let step = leaf.needle.chars().next().map_or(1, char::len_utf8);
    while let Some(at) = find_substring(haystack, &leaf.needle, leaf.case_insensitive, from) {
        from = at + step;
        if leaf.word_boundaries && !on_word_boundary(haystack, at, leaf.needle.len()) {
            continue;
        }
        let boundary = Boundary::new(offset + at, leaf.needle.len());
        if view.scope_match(&leaf.scopes, boundary) {
            captures.push(Capture {
                pattern_index: leaf.pattern_index,
                boundary,
            });
        }
    }
    ClauseOutcome {
        matched: !captures.is_empty(),
        captures,
    }
}

fn find_substring(haystack: &str, needle: &str, case_insensitive: bool, from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    if !case_insensitive {
        return haystack[from..].find(needle).map(|i| from + i);
    }
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Reject a hit when the byte on either side is alphanumeric, so `crypt`
/// does not fire inside `encrypted`.
fn on_word_boundary(haystack: &str, at: usize, len: usize) -> bool {
    let bytes = haystack.as_bytes();
    if at > 0 && bytes[at - 1].is_ascii_alphanumeric() {
        return false;
    }
    match bytes.get(at + len) {
        Some(b) if b.is_ascii_alphanumeric() => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    fn view(text: &str, lang: Language) -> SourceView {
        SourceView::new(text.to_string(), lang)
    }

    fn regex_leaf(expr: &str, flags: u8) -> Clause {
        Clause::Regex(RegexClause {
            expression: expr.to_string(),
            flags,
            scopes: Vec::new(),
            pattern_index: 0,
        })
    }

    fn substring_leaf(needle: &str, ci: bool, wb: bool) -> Clause {
        Clause::Substring(SubstringClause {
            needle: needle.to_string(),
            case_insensitive: ci,
            word_boundaries: wb,
            scopes: Vec::new(),
            pattern_index: 0,
        })
    }

    fn eval(clause: &Clause, v: &SourceView) -> ClauseOutcome {
        evaluate(clause, v, &CancelToken::unbounded()).unwrap()
    }

    // ---- leaves ----

    #[test]
    fn regex_captures_every_hit() {
        let v = view("ab ab ab", Language::Plaintext);
        let out = eval(&regex_leaf("ab", 0), &v);
        assert!(out.matched);
        let starts: Vec<_> = out.captures.iter().map(|c| c.boundary.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);
    }

    #[test]
    fn regex_case_insensitive_flag() {
        let v = view("System SYSTEM system", Language::Plaintext);
        assert_eq!(eval(&regex_leaf("system", 0), &v).captures.len(), 1);
        assert_eq!(
            eval(&regex_leaf("system", FLAG_CASE_INSENSITIVE), &v)
                .captures
                .len(),
            3
        );
    }

    #[test]
    fn regex_multi_line_flag() {
        let v = view("alpha\nbeta\n", Language::Plaintext);
        assert!(!eval(&regex_leaf("^beta", 0), &v).matched);
        assert!(eval(&regex_leaf("^beta", FLAG_MULTI_LINE), &v).matched);
    }

    #[test]
    fn invalid_regex_matches_nothing() {
        let v = view("anything", Language::Plaintext);
        let out = eval(&regex_leaf("(unclosed", 0), &v);
        assert!(!out.matched);
        // Second lookup hits the cached failure.
        assert!(!eval(&regex_leaf("(unclosed", 0), &v).matched);
    }

    #[test]
    fn scoped_regex_skips_comment_hits() {
        let v = view("exec(cmd) // exec disabled\n", Language::Rust);
        let code_only = Clause::Regex(RegexClause {
            expression: "exec".to_string(),
            flags: 0,
            scopes: vec![ScopeKind::Code],
            pattern_index: 0,
        });
        let out = eval(&code_only, &v);
        assert_eq!(out.captures.len(), 1);
        assert_eq!(out.captures[0].boundary.start, 0);
    }

    #[test]
    fn substring_finds_overlapping_starts() {
        let v = view("aaa", Language::Plaintext);
        let out = eval(&substring_leaf("aa", false, false), &v);
        assert_eq!(out.captures.len(), 2);
    }

    #[test]
    fn substring_word_boundaries() {
        let v = view("crypt encrypted crypt2 (crypt)", Language::Plaintext);
        let out = eval(&substring_leaf("crypt", false, true), &v);
        let starts: Vec<_> = out.captures.iter().map(|c| c.boundary.start).collect();
        // "encrypted" and "crypt2" are rejected; the parenthesized hit stands.
        assert_eq!(starts, vec![0, 24]);
    }

    #[test]
    fn substring_case_insensitive() {
        let v = view("Select SELECT selector", Language::Plaintext);
        let out = eval(&substring_leaf("select", true, true), &v);
        assert_eq!(out.captures.len(), 2);
    }

    #[test]
    fn substring_with_multibyte_needle() {
        let v = view("naïve café naïve", Language::Plaintext);
        let out = eval(&substring_leaf("é", false, false), &v);
        assert_eq!(out.captures.len(), 1);
        assert_eq!(out.captures[0].boundary.start, "naïve caf".len());

        let out = eval(&substring_leaf("naïve", false, false), &v);
        let starts: Vec<_> = out.captures.iter().map(|c| c.boundary.start).collect();
        assert_eq!(starts, vec![0, "naïve café ".len()]);
    }

    // ---- combinators ----

    #[test]
    fn and_requires_all_children() {
        let v = view("foo bar", Language::Plaintext);
        let both = Clause::And(vec![
            substring_leaf("foo", false, false),
            substring_leaf("bar", false, false),
        ]);
        let out = eval(&both, &v);
        assert!(out.matched);
        assert_eq!(out.captures.len(), 2);

        let missing = Clause::And(vec![
            substring_leaf("foo", false, false),
            substring_leaf("baz", false, false),
        ]);
        let out = eval(&missing, &v);
        assert!(!out.matched);
        assert!(out.captures.is_empty());
    }

    #[test]
    fn or_unions_captures() {
        let v = view("foo bar", Language::Plaintext);
        let either = Clause::Or(vec![
            substring_leaf("foo", false, false),
            substring_leaf("baz", false, false),
        ]);
        let out = eval(&either, &v);
        assert!(out.matched);
        assert_eq!(out.captures.len(), 1);
    }

    #[test]
    fn not_inverts_and_drops_captures() {
        let v = view("foo", Language::Plaintext);
        let absent = Clause::Not(Box::new(substring_leaf("bar", false, false)));
        let out = eval(&absent, &v);
        assert!(out.matched);
        assert!(out.captures.is_empty());
        let present = Clause::Not(Box::new(substring_leaf("foo", false, false)));
        assert!(!eval(&present, &v).matched);
    }

    #[test]
    fn cancelled_token_aborts_evaluation() {
        let v = view("foo", Language::Plaintext);
        let token = CancelToken::unbounded();
        token.cancel();
        let err = evaluate(&substring_leaf("foo", false, false), &v, &token);
        assert_eq!(err.unwrap_err(), Cancelled);
    }

    #[test]
    fn cache_distinguishes_modifier_sets() {
        let v = view("ABC", Language::Plaintext);
        assert!(!eval(&regex_leaf("abc", 0), &v).matched);
        assert!(eval(&regex_leaf("abc", FLAG_CASE_INSENSITIVE), &v).matched);
    }
}
