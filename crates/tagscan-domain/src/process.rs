//! Per-file evaluation: run every applicable rule over one source file and
//! materialize match records.

use tagscan_types::MatchRecord;

use crate::cancel::{CancelToken, Cancelled};
use crate::language::Language;
use crate::rules::CompiledRuleSet;
use crate::source::SourceView;

/// Matched text kept in a record is capped at this many chars.
pub const MAX_SAMPLE_CHARS: usize = 200;

/// Context lines on each side of a match in the excerpt.
pub const EXCERPT_CONTEXT_LINES: usize = 3;

/// A match plus the index of the rule that produced it, so the resolver can
/// reach back to the rule's overrides and tag dependencies.
#[derive(Debug, Clone)]
pub struct ScanMatch {
    pub rule_index: usize,
    pub record: MatchRecord,
}

/// Evaluate the rule set against one file.
///
/// Returns every raw match; cross-rule resolution happens later over the
/// whole corpus. A tripped token unwinds with [`Cancelled`] and the caller
/// discards any partial results.
pub fn process_file(
    rules: &CompiledRuleSet,
    path: &str,
    text: String,
    language: Language,
    token: &CancelToken,
) -> Result<Vec<ScanMatch>, Cancelled> {
    let view = SourceView::new(text, language);
    let mut out = Vec::new();

    for (rule_index, rule) in rules.rules().iter().enumerate() {
        if !rule.applies(path, language) {
            continue;
        }
        for capture in rule.captures(&view, token)? {
            let boundary = capture.boundary;
            let start = view.location_of(boundary.start);
            let end = view.location_of(boundary.end());
            out.push(ScanMatch {
                rule_index,
                record: MatchRecord {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    tags: rule.tags.clone(),
                    severity: rule.severity,
                    confidence: rule.confidence_of(&capture),
                    file_path: path.to_string(),
                    boundary,
                    start_line: start.line as u32,
                    start_column: start.column as u32,
                    end_line: end.line as u32,
                    end_column: end.column as u32,
                    sample: trim_sample(view.text_of(boundary)),
                    excerpt: view.excerpt(boundary, EXCERPT_CONTEXT_LINES).to_string(),
                },
            });
        }
    }
    Ok(out)
}

/// Char-safe truncation of the matched text.
fn trim_sample(text: &str) -> String {
    match text.char_indices().nth(MAX_SAMPLE_CHARS) {
        Some((at, _)) => text[..at].to_string(),
        None => text.to_string(),
    }
}
