//! Loading rules and settings from disk.
//!
//! A rules argument may name a single JSON file or a directory; directories
//! are walked recursively and every `.json` file is loaded. Files are
//! expanded for environment variables before parsing. When the same rule id
//! appears in multiple files, the file loaded last wins, so a local rule
//! set can override entries from a shared one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use tagscan_types::{RuleConfig, ScanSettings};

use crate::env_expand::expand_env_vars;

/// Load and merge every rule file named by `paths`, in order.
pub fn load_rules(paths: &[PathBuf]) -> Result<Vec<RuleConfig>> {
    if paths.is_empty() {
        bail!("no rule files given; pass at least one --rules path");
    }
    let mut files = Vec::new();
    for path in paths {
        collect_rule_files(path, &mut files)?;
    }
    if files.is_empty() {
        bail!("no .json rule files found under the given paths");
    }

    // Merge by rule id; later files replace earlier entries.
    let mut merged: BTreeMap<String, RuleConfig> = BTreeMap::new();
    for file in &files {
        for rule in load_rule_file(file)? {
            merged.insert(rule.id.clone(), rule);
        }
    }
    Ok(merged.into_values().collect())
}

/// Load scan settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<ScanSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let expanded = expand_env_vars(&text)
        .with_context(|| format!("failed to expand variables in {}", path.display()))?;
    serde_json::from_str(&expanded)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

fn collect_rule_files(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let meta = fs::metadata(path)
        .with_context(|| format!("rules path {} does not exist", path.display()))?;
    if meta.is_file() {
        files.push(path.to_path_buf());
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("failed to read rules directory {}", path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read rules directory {}", path.display()))?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_rule_files(&entry, files)?;
        } else if entry.extension().is_some_and(|e| e == "json") {
            files.push(entry);
        }
    }
    Ok(())
}

/// A rule file holds either a JSON array of rules or a single rule object.
fn load_rule_file(path: &Path) -> Result<Vec<RuleConfig>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file {}", path.display()))?;
    let expanded = expand_env_vars(&text)
        .with_context(|| format!("failed to expand variables in {}", path.display()))?;

    match serde_json::from_str::<Vec<RuleConfig>>(&expanded) {
        Ok(rules) => Ok(rules),
        Err(_) => {
            let rule: RuleConfig = serde_json::from_str(&expanded)
                .with_context(|| format!("failed to parse rule file {}", path.display()))?;
            Ok(vec![rule])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const RULE_A: &str = r#"[{ "id": "a", "name": "a", "description": "d", "tags": ["t.a"],
                              "patterns": [{ "pattern": "aa" }] }]"#;

    #[test]
    fn loads_a_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "rules.json", RULE_A);
        let rules = load_rules(&[path]).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "a");
    }

    #[test]
    fn accepts_a_bare_rule_object() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "one.json",
            r#"{ "id": "solo", "name": "n", "description": "d", "tags": ["t"],
                 "patterns": [{ "pattern": "x" }] }"#,
        );
        let rules = load_rules(&[path]).unwrap();
        assert_eq!(rules[0].id, "solo");
    }

    #[test]
    fn walks_directories_and_merges_by_id() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "01_base.json", RULE_A);
        // Same id loaded later wins; non-json files are ignored.
        write(
            dir.path(),
            "02_override.json",
            r#"[{ "id": "a", "name": "replacement", "description": "d", "tags": ["t.a"],
                  "patterns": [{ "pattern": "zz" }] }]"#,
        );
        write(dir.path(), "notes.txt", "not a rule file");
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(
            &dir.path().join("nested"),
            "extra.json",
            r#"[{ "id": "b", "name": "b", "description": "d", "tags": ["t.b"],
                  "patterns": [{ "pattern": "bb" }] }]"#,
        );

        let rules = load_rules(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, "a");
        assert_eq!(rules[0].name, "replacement");
        assert_eq!(rules[1].id, "b");
    }

    #[test]
    fn expands_environment_variables() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("TS_TEST_PATTERN", "needle");
        let path = write(
            dir.path(),
            "rules.json",
            r#"[{ "id": "a", "name": "a", "description": "d", "tags": ["t"],
                  "patterns": [{ "pattern": "${TS_TEST_PATTERN}" }] }]"#,
        );
        let rules = load_rules(&[path]).unwrap();
        std::env::remove_var("TS_TEST_PATTERN");
        assert_eq!(rules[0].patterns[0].pattern, "needle");
    }

    #[test]
    fn missing_path_and_bad_json_are_errors() {
        let dir = TempDir::new().unwrap();
        assert!(load_rules(&[dir.path().join("ghost.json")]).is_err());
        let path = write(dir.path(), "bad.json", "{ not json");
        assert!(load_rules(&[path]).is_err());
        assert!(load_rules(&[]).is_err());
    }

    #[test]
    fn loads_settings() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "tagscan.json",
            r#"{ "parallel": false, "max_matches_per_tag": 7 }"#,
        );
        let settings = load_settings(&path).unwrap();
        assert!(!settings.parallel);
        assert_eq!(settings.max_matches_per_tag, 7);
    }
}
