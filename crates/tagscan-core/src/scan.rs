//! Scan orchestration: enumerate files, fan evaluation out over a worker
//! pool, resolve the corpus, and assemble the report.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use tagscan_domain::{
    process_file, resolve, CancelToken, CompiledRuleSet, Language, ScanMatch,
};
use tagscan_types::{
    ScanMetadata, ScanReport, ScanSettings, ToolMeta, SCAN_REPORT_SCHEMA_V1,
};

/// What to scan and how.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub roots: Vec<PathBuf>,
    pub settings: ScanSettings,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no rules to scan with")]
    NoRules,

    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },

    #[error("file enumeration exceeded {timeout_ms} ms")]
    EnumerationTimeout { timeout_ms: u64 },

    #[error("failed to start worker pool: {source}")]
    WorkerPool {
        source: rayon::ThreadPoolBuildError,
    },
}

#[derive(Debug, Clone)]
struct WorkItem {
    path: String,
    language: Language,
}

enum FileOutcome {
    Matches(Vec<ScanMatch>),
    TimedOut,
    Aborted,
    Failed,
}

pub struct Scanner {
    rules: CompiledRuleSet,
}

impl Scanner {
    pub fn new(rules: CompiledRuleSet) -> Self {
        Self { rules }
    }

    /// Run a full scan. Sequential and parallel modes produce identical
    /// reports; only the wall-clock time differs.
    pub fn scan(&self, request: &ScanRequest) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let settings = &request.settings;
        if self.rules.is_empty() {
            return Err(ScanError::NoRules);
        }
        let include = build_globset(&settings.include)?;
        let exclude = build_globset(&settings.exclude)?;

        let mut metadata = ScanMetadata::default();
        let work = enumerate(request, started, &include, &exclude, &mut metadata)?;
        tracing::debug!(files = work.len(), "enumeration complete");

        let overall = if settings.scan_timeout_ms > 0 {
            CancelToken::new(Some(started + Duration::from_millis(settings.scan_timeout_ms)))
        } else {
            CancelToken::unbounded()
        };

        let outcomes: Vec<FileOutcome> = if settings.parallel {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(threads) = settings.threads {
                builder = builder.num_threads(threads);
            }
            let pool = builder
                .build()
                .map_err(|source| ScanError::WorkerPool { source })?;
            pool.install(|| {
                work.par_iter()
                    .map(|item| self.process(item, settings, &overall))
                    .collect()
            })
        } else {
            work.iter()
                .map(|item| self.process(item, settings, &overall))
                .collect()
        };

        let mut all = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Matches(matches) => {
                    metadata.files_scanned += 1;
                    all.extend(matches);
                }
                FileOutcome::TimedOut => metadata.files_timed_out += 1,
                FileOutcome::Aborted => {
                    metadata.files_timed_out += 1;
                    metadata.timed_out = true;
                }
                FileOutcome::Failed => metadata.files_failed += 1,
            }
        }
        if overall.is_cancelled() {
            metadata.timed_out = true;
        }

        let records = resolve(&self.rules, all, settings);
        for record in &records {
            for tag in &record.tags {
                *metadata.tag_counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        metadata.unique_tags = metadata.tag_counts.keys().cloned().collect();
        metadata.elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(ScanReport {
            schema: SCAN_REPORT_SCHEMA_V1.to_string(),
            tool: tool_meta(),
            matches: records,
            metadata,
        })
    }

    fn process(
        &self,
        item: &WorkItem,
        settings: &ScanSettings,
        overall: &CancelToken,
    ) -> FileOutcome {
        if overall.is_cancelled() {
            return FileOutcome::Aborted;
        }
        let text = match fs::read(&item.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                tracing::warn!(path = %item.path, %err, "failed to read file");
                return FileOutcome::Failed;
            }
        };
        let token = if settings.file_timeout_ms > 0 {
            overall.with_deadline(Instant::now() + Duration::from_millis(settings.file_timeout_ms))
        } else {
            overall.clone()
        };
        match process_file(&self.rules, &item.path, text, item.language, &token) {
            Ok(matches) => FileOutcome::Matches(matches),
            // Partial results from the cancelled file are discarded.
            Err(_) if overall.is_cancelled() => FileOutcome::Aborted,
            Err(_) => {
                tracing::warn!(path = %item.path, "file evaluation timed out");
                FileOutcome::TimedOut
            }
        }
    }
}

fn enumerate(
    request: &ScanRequest,
    started: Instant,
    include: &Option<GlobSet>,
    exclude: &Option<GlobSet>,
    metadata: &mut ScanMetadata,
) -> Result<Vec<WorkItem>, ScanError> {
    let settings = &request.settings;
    let deadline = (settings.enumeration_timeout_ms > 0)
        .then(|| started + Duration::from_millis(settings.enumeration_timeout_ms));
    let mut items = Vec::new();

    for root in &request.roots {
        for entry in WalkDir::new(root).sort_by_file_name() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(ScanError::EnumerationTimeout {
                        timeout_ms: settings.enumeration_timeout_ms,
                    });
                }
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(%err, "enumeration error");
                    metadata.files_failed += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(exclude) = exclude {
                if exclude.is_match(path) {
                    continue;
                }
            }
            if let Some(include) = include {
                if !include.is_match(path) {
                    continue;
                }
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if settings.max_file_size_bytes > 0 && size > settings.max_file_size_bytes {
                metadata.files_skipped_oversize += 1;
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some(language) = Language::from_file_name(&name) else {
                metadata.files_skipped_unknown_language += 1;
                continue;
            };
            items.push(WorkItem {
                path: path.to_string_lossy().into_owned(),
                language,
            });
        }
    }

    // Deterministic processing order regardless of walk order across roots.
    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, ScanError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ScanError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|source| ScanError::InvalidGlob {
            pattern: patterns.join(","),
            source,
        })
}

pub(crate) fn tool_meta() -> ToolMeta {
    ToolMeta {
        name: "tagscan".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
