use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use schemars::schema_for;
use tracing::debug;

use tagscan_core::{render_scan_text, render_verify_text, verify_rules, ScanRequest, Scanner};
use tagscan_domain::CompiledRuleSet;
use tagscan_types::{Confidence, RuleConfig, ScanReport, ScanSettings, Severity, VerifyReport};

mod config_loader;
mod env_expand;

use config_loader::{load_rules, load_settings};

#[derive(Parser)]
#[command(name = "tagscan")]
#[command(about = "Rule-driven source characteristic scanner", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan source trees and report rule matches.
    Analyze(Box<AnalyzeArgs>),

    /// Validate rule files and run their self-tests.
    Verify(VerifyArgs),

    /// Print the JSON schema for rules or reports.
    Schema(SchemaArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Directories or files to scan.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Rule file or directory (repeatable; later files win on id clashes).
    #[arg(long, short = 'r', required = true)]
    rules: Vec<PathBuf>,

    /// Settings file (JSON). Flags below override its values.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Process files one at a time instead of on the worker pool.
    #[arg(long)]
    sequential: bool,

    /// Worker count for the parallel pool.
    #[arg(long)]
    threads: Option<usize>,

    /// Per-file evaluation timeout in milliseconds (0 disables).
    #[arg(long)]
    file_timeout_ms: Option<u64>,

    /// Overall scan timeout in milliseconds (0 disables).
    #[arg(long)]
    scan_timeout_ms: Option<u64>,

    /// File enumeration timeout in milliseconds (0 disables).
    #[arg(long)]
    enumeration_timeout_ms: Option<u64>,

    /// Skip files larger than this many bytes.
    #[arg(long)]
    max_file_size_bytes: Option<u64>,

    /// Cap matches per tag across the scan (0 disables).
    #[arg(long)]
    max_matches_per_tag: Option<u32>,

    /// Keep only matches at these confidence levels (repeatable).
    #[arg(long = "confidence", value_enum)]
    confidence_filter: Vec<ConfidenceArg>,

    /// Keep only matches at these severities (repeatable).
    #[arg(long = "severity", value_enum)]
    severity_filter: Vec<SeverityArg>,

    /// Path globs to include (repeatable; default is everything).
    #[arg(long)]
    include: Vec<String>,

    /// Path globs to exclude (repeatable).
    #[arg(long)]
    exclude: Vec<String>,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Rule file or directory (repeatable).
    #[arg(long, short = 'r', required = true)]
    rules: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Parser, Debug)]
struct SchemaArgs {
    #[arg(long, value_enum, default_value_t = SchemaKind::Report)]
    kind: SchemaKind,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaKind {
    Rules,
    Report,
    Verify,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ConfidenceArg {
    Low,
    Medium,
    High,
}

impl From<ConfidenceArg> for Confidence {
    fn from(value: ConfidenceArg) -> Self {
        match value {
            ConfidenceArg::Low => Confidence::Low,
            ConfidenceArg::Medium => Confidence::Medium,
            ConfidenceArg::High => Confidence::High,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SeverityArg {
    Critical,
    Important,
    Moderate,
    BestPractice,
    ManualReview,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Critical => Severity::Critical,
            SeverityArg::Important => Severity::Important,
            SeverityArg::Moderate => Severity::Moderate,
            SeverityArg::BestPractice => Severity::BestPractice,
            SeverityArg::ManualReview => Severity::ManualReview,
        }
    }
}

fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(2)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Analyze(args) => cmd_analyze(*args),
        Commands::Verify(args) => cmd_verify(args),
        Commands::Schema(args) => {
            cmd_schema(args)?;
            Ok(0)
        }
    }
}

fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("logging initialized at level: {}", level);
}

/// Exit code 0 when nothing matched, 1 when anything did; configuration
/// problems surface as errors and exit 2.
fn cmd_analyze(args: AnalyzeArgs) -> Result<i32> {
    let configs = load_rules(&args.rules)?;
    let set = compile(&configs)?;
    let settings = effective_settings(&args)?;

    let scanner = Scanner::new(set);
    let report = scanner
        .scan(&ScanRequest {
            roots: args.paths.clone(),
            settings,
        })
        .context("scan failed")?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_scan_text(&report)),
    }
    Ok(if report.matches.is_empty() { 0 } else { 1 })
}

/// Exit code 0 when the rules are clean, 2 when any issue was found.
fn cmd_verify(args: VerifyArgs) -> Result<i32> {
    let configs = load_rules(&args.rules)?;
    let report = verify_rules(&configs);
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_verify_text(&report)),
    }
    Ok(if report.valid { 0 } else { 2 })
}

fn cmd_schema(args: SchemaArgs) -> Result<()> {
    let schema = match args.kind {
        SchemaKind::Rules => schema_for!(Vec<RuleConfig>),
        SchemaKind::Report => schema_for!(ScanReport),
        SchemaKind::Verify => schema_for!(VerifyReport),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn compile(configs: &[RuleConfig]) -> Result<CompiledRuleSet> {
    match CompiledRuleSet::compile(configs) {
        Ok(set) => Ok(set),
        Err(err) => {
            for issue in &err.issues {
                eprintln!("{issue}");
            }
            bail!("rule validation failed with {} issue(s)", err.issues.len());
        }
    }
}

fn effective_settings(args: &AnalyzeArgs) -> Result<ScanSettings> {
    let mut settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => ScanSettings::default(),
    };
    if args.sequential {
        settings.parallel = false;
    }
    if args.threads.is_some() {
        settings.threads = args.threads;
    }
    if let Some(ms) = args.file_timeout_ms {
        settings.file_timeout_ms = ms;
    }
    if let Some(ms) = args.scan_timeout_ms {
        settings.scan_timeout_ms = ms;
    }
    if let Some(ms) = args.enumeration_timeout_ms {
        settings.enumeration_timeout_ms = ms;
    }
    if let Some(bytes) = args.max_file_size_bytes {
        settings.max_file_size_bytes = bytes;
    }
    if let Some(cap) = args.max_matches_per_tag {
        settings.max_matches_per_tag = cap;
    }
    if !args.confidence_filter.is_empty() {
        settings.confidence_filter = args
            .confidence_filter
            .iter()
            .map(|c| Confidence::from(*c))
            .collect();
    }
    if !args.severity_filter.is_empty() {
        settings.severity_filter = args
            .severity_filter
            .iter()
            .map(|s| Severity::from(*s))
            .collect();
    }
    if !args.include.is_empty() {
        settings.include = args.include.clone();
    }
    if !args.exclude.is_empty() {
        settings.exclude = args.exclude.clone();
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RULES: &str = r#"[{ "id": "r1", "name": "needle", "description": "d",
                              "tags": ["T.Needle"],
                              "patterns": [{ "pattern": "needle", "type": "substring" }] }]"#;

    fn setup(src: &str) -> (TempDir, String, String) {
        let dir = TempDir::new().expect("temp");
        let rules = dir.path().join("rules.json");
        fs::write(&rules, RULES).expect("rules");
        let tree = dir.path().join("src");
        fs::create_dir(&tree).expect("tree");
        fs::write(tree.join("main.c"), src).expect("source");
        (
            dir,
            rules.to_str().expect("utf8").to_string(),
            tree.to_str().expect("utf8").to_string(),
        )
    }

    #[test]
    fn analyze_exit_codes_reflect_matches() {
        let (_dir, rules, tree) = setup("int needle;\n");
        let code = run_with_args(["tagscan", "analyze", &tree, "--rules", &rules])
            .expect("analyze");
        assert_eq!(code, 1);

        let (_dir, rules, tree) = setup("int clean;\n");
        let code = run_with_args(["tagscan", "analyze", &tree, "--rules", &rules])
            .expect("analyze");
        assert_eq!(code, 0);
    }

    #[test]
    fn analyze_errors_on_missing_rules_path() {
        let (_dir, _rules, tree) = setup("int x;\n");
        let err = run_with_args(["tagscan", "analyze", &tree, "--rules", "/nonexistent.json"]);
        assert!(err.is_err());
    }

    #[test]
    fn verify_exit_codes() {
        let (_dir, rules, _tree) = setup("");
        let code = run_with_args(["tagscan", "verify", "--rules", &rules]).expect("verify");
        assert_eq!(code, 0);

        let dir = TempDir::new().expect("temp");
        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"[{ "id": "", "name": "n" }]"#).expect("rules");
        let code = run_with_args(["tagscan", "verify", "--rules", bad.to_str().expect("utf8")])
            .expect("verify");
        assert_eq!(code, 2);
    }

    #[test]
    fn settings_flags_override_file() {
        let dir = TempDir::new().expect("temp");
        let settings_path = dir.path().join("tagscan.json");
        fs::write(&settings_path, r#"{ "parallel": true, "max_matches_per_tag": 3 }"#)
            .expect("settings");

        let args = AnalyzeArgs::parse_from([
            "analyze",
            "tree",
            "--rules",
            "r.json",
            "--settings",
            settings_path.to_str().expect("utf8"),
            "--sequential",
            "--max-matches-per-tag",
            "9",
            "--confidence",
            "high",
        ]);
        let settings = effective_settings(&args).expect("settings");
        assert!(!settings.parallel);
        assert_eq!(settings.max_matches_per_tag, 9);
        assert_eq!(settings.confidence_filter, vec![Confidence::High]);
    }
}
