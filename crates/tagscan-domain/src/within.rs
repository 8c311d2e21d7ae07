//! Proximity filtering: keep or drop prior captures based on whether a
//! secondary pattern matches near them.

use tagscan_types::Boundary;

use crate::cancel::{CancelToken, Cancelled};
use crate::clause::{matches_in_region, Capture, Clause, ClauseOutcome};
use crate::source::SourceView;

/// Where, relative to each prior capture, the condition pattern must match.
/// Exactly one mode applies per clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithinMode {
    /// Inside the captured text itself.
    FindingOnly,
    /// Anywhere on the lines the capture spans.
    SameLine,
    /// Anywhere in the file.
    SameFile,
    /// Strictly before the capture.
    OnlyBefore,
    /// Strictly after the capture.
    OnlyAfter,
    /// A line window around the capture: `before` lines back (zero or
    /// negative) through `after` lines forward (zero or positive), not both
    /// zero.
    FindingRegion { before: i64, after: i64 },
}

/// A compiled condition: a pattern tree, the region mode, and whether the
/// sense is inverted.
#[derive(Debug, Clone)]
pub struct WithinClause {
    pub child: Clause,
    pub mode: WithinMode,
    pub invert: bool,
}

/// Partition `findings` by whether the condition matches in each finding's
/// region, then keep the passing side, or the failing side when inverted.
/// The clause matches when anything was kept.
pub fn evaluate_within(
    within: &WithinClause,
    findings: &[Capture],
    view: &SourceView,
    token: &CancelToken,
) -> Result<ClauseOutcome, Cancelled> {
    let mut kept = Vec::new();
    for finding in findings {
        token.check()?;
        let region = region_for(within.mode, finding.boundary, view);
        let hit = matches_in_region(&within.child, view, region, token)?;
        if hit != within.invert {
            kept.push(*finding);
        }
    }
    Ok(ClauseOutcome {
        matched: !kept.is_empty(),
        captures: kept,
    })
}

fn region_for(mode: WithinMode, finding: Boundary, view: &SourceView) -> Boundary {
    let len = view.text().len();
    match mode {
        WithinMode::FindingOnly => finding,
        WithinMode::SameFile => Boundary::new(0, len),
        WithinMode::SameLine => {
            let first = view.location_of(finding.start).line;
            let last = view
                .location_of(finding.end().saturating_sub(1).max(finding.start))
                .line;
            view.region_boundary(first, last)
        }
        WithinMode::OnlyBefore => Boundary::new(0, finding.start),
        WithinMode::OnlyAfter => {
            let start = finding.end().min(len);
            Boundary::new(start, len - start)
        }
        WithinMode::FindingRegion { before, after } => {
            let line = view.location_of(finding.start).line as i64;
            let first = (line + before).max(1) as usize;
            let last = (line + after).max(1) as usize;
            view.region_boundary(first, last)
        }
    }
}
