//! Plain-text rendering of scan and verify reports, for terminal output.
//! The JSON forms are just serde on the report types.

use std::fmt::Write;

use tagscan_types::{ScanReport, VerifyReport};

pub fn render_scan_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let meta = &report.metadata;
    let _ = writeln!(
        out,
        "{} match(es), {} unique tag(s)",
        report.matches.len(),
        meta.unique_tags.len()
    );
    for record in &report.matches {
        let _ = writeln!(
            out,
            "{}:{}:{} [{}/{}] {} {}",
            record.file_path,
            record.start_line,
            record.start_column,
            record.severity.as_str(),
            record.confidence.as_str(),
            record.rule_id,
            record.tags.join(",")
        );
    }
    let _ = writeln!(
        out,
        "files: {} scanned, {} oversize, {} unknown language, {} timed out, {} failed",
        meta.files_scanned,
        meta.files_skipped_oversize,
        meta.files_skipped_unknown_language,
        meta.files_timed_out,
        meta.files_failed
    );
    if meta.timed_out {
        let _ = writeln!(out, "scan timed out before completing");
    }
    out
}

pub fn render_verify_text(report: &VerifyReport) -> String {
    let mut out = String::new();
    if report.valid {
        let _ = writeln!(out, "{} rule(s) verified, no issues", report.rules_checked);
    } else {
        let _ = writeln!(
            out,
            "{} rule(s) verified, {} issue(s):",
            report.rules_checked,
            report.issues.len()
        );
        for issue in &report.issues {
            let _ = writeln!(out, "  - {issue}");
        }
    }
    out
}
