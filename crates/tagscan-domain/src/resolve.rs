//! Cross-rule resolution over the whole corpus.
//!
//! Raw matches from every file pass through four stages, in order:
//! overrides, tag dependencies, confidence/severity filters, and the
//! per-tag cap. The output order is fully deterministic, so sequential and
//! parallel scans produce identical reports.

use std::collections::{BTreeMap, HashSet};

use tagscan_types::{MatchRecord, ScanSettings};

use crate::process::ScanMatch;
use crate::rules::CompiledRuleSet;

/// Run all resolution stages and return the final, sorted records.
pub fn resolve(
    rules: &CompiledRuleSet,
    mut matches: Vec<ScanMatch>,
    settings: &ScanSettings,
) -> Vec<MatchRecord> {
    sort_matches(&mut matches);
    apply_overrides(rules, &mut matches);
    apply_tag_dependencies(rules, &mut matches);
    apply_filters(settings, &mut matches);
    apply_tag_cap(settings.max_matches_per_tag, &mut matches);
    matches.into_iter().map(|m| m.record).collect()
}

/// Stable order: file path, start offset, rule id.
fn sort_matches(matches: &mut [ScanMatch]) {
    matches.sort_by(|a, b| {
        (&a.record.file_path, a.record.boundary.start, &a.record.rule_id).cmp(&(
            &b.record.file_path,
            b.record.boundary.start,
            &b.record.rule_id,
        ))
    });
}

/// A match is dropped when another rule overrides its rule and that rule
/// matched the same file at a boundary containing this one.
fn apply_overrides(rules: &CompiledRuleSet, matches: &mut Vec<ScanMatch>) {
    let mut removed = vec![false; matches.len()];
    for (i, winner) in matches.iter().enumerate() {
        let overrides = &rules.rules()[winner.rule_index].overrides;
        if overrides.is_empty() {
            continue;
        }
        for (j, loser) in matches.iter().enumerate() {
            if i == j || removed[j] {
                continue;
            }
            if overrides.iter().any(|o| *o == loser.record.rule_id)
                && winner.record.file_path == loser.record.file_path
                && winner.record.boundary.contains(&loser.record.boundary)
            {
                removed[j] = true;
            }
        }
    }
    retain_unremoved(matches, &removed);
}

/// Drop matches whose rule depends on tags nothing in the corpus produced.
///
/// Removing a match removes its tags from the inventory, so dependency
/// chains collapse transitively; the loop runs to a fixed point. Mutually
/// dependent rules satisfy each other and both survive.
fn apply_tag_dependencies(rules: &CompiledRuleSet, matches: &mut Vec<ScanMatch>) {
    loop {
        let available: HashSet<String> = matches
            .iter()
            .flat_map(|m| m.record.tags.iter().cloned())
            .collect();
        let before = matches.len();
        matches.retain(|m| {
            rules.rules()[m.rule_index]
                .depends_on_tags
                .iter()
                .all(|t| available.contains(t))
        });
        if matches.len() == before {
            return;
        }
    }
}

fn apply_filters(settings: &ScanSettings, matches: &mut Vec<ScanMatch>) {
    if !settings.confidence_filter.is_empty() {
        matches.retain(|m| settings.confidence_filter.contains(&m.record.confidence));
    }
    if !settings.severity_filter.is_empty() {
        matches.retain(|m| settings.severity_filter.contains(&m.record.severity));
    }
}

/// Cap matches per tag. A match is skipped only when every one of its tags
/// is already saturated; a kept match counts against all of its tags.
fn apply_tag_cap(cap: u32, matches: &mut Vec<ScanMatch>) {
    if cap == 0 {
        return;
    }
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    matches.retain(|m| {
        let saturated = m
            .record
            .tags
            .iter()
            .all(|t| counts.get(t).copied().unwrap_or(0) >= cap);
        if saturated {
            return false;
        }
        for tag in &m.record.tags {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
        true
    });
}

fn retain_unremoved(matches: &mut Vec<ScanMatch>, removed: &[bool]) {
    let mut i = 0;
    matches.retain(|_| {
        let keep = !removed[i];
        i += 1;
        keep
    });
}
