//! Common rule sets and source snippets used across workspace tests.

use tagscan_types::RuleConfig;

/// Collection of sample rule sets.
pub mod sample_rules {
    use super::*;

    fn parse(json: &str) -> Vec<RuleConfig> {
        serde_json::from_str(json).expect("fixture rules should parse")
    }

    /// One substring rule that matches the word `needle`.
    pub fn needle() -> Vec<RuleConfig> {
        parse(
            r#"[{ "id": "fix.needle", "name": "needle", "description": "finds needles",
                  "tags": ["Fixture.Needle"],
                  "patterns": [{ "pattern": "needle", "type": "substring" }] }]"#,
        )
    }

    /// A broad rule plus a narrower one that overrides it, the classic
    /// platform-detection pair.
    pub fn windows_pair() -> Vec<RuleConfig> {
        parse(
            r#"[
            { "id": "os.win", "name": "Windows", "description": "any windows mention",
              "tags": ["OS.Windows"],
              "patterns": [{ "pattern": "windows", "type": "substring", "modifiers": ["i"] }] },
            { "id": "os.win2000", "name": "Windows 2000", "description": "windows 2000 mention",
              "tags": ["OS.Windows.2000"], "overrides": ["os.win"],
              "patterns": [{ "pattern": "windows 2000", "type": "substring", "modifiers": ["i"] }] }
        ]"#,
        )
    }

    /// Three rules where `b` depends on `a`'s tag and `c` on `b`'s.
    pub fn dependency_chain() -> Vec<RuleConfig> {
        parse(
            r#"[
            { "id": "chain.a", "name": "A", "description": "d", "tags": ["Chain.A"],
              "patterns": [{ "pattern": "alpha", "type": "substring" }] },
            { "id": "chain.b", "name": "B", "description": "d", "tags": ["Chain.B"],
              "depends_on_tags": ["Chain.A"],
              "patterns": [{ "pattern": "beta", "type": "substring" }] },
            { "id": "chain.c", "name": "C", "description": "d", "tags": ["Chain.C"],
              "depends_on_tags": ["Chain.B"],
              "patterns": [{ "pattern": "gamma", "type": "substring" }] }
        ]"#,
        )
    }
}

/// Source snippets with known scope layouts.
pub mod sample_sources {
    /// C source with the word `needle` in code, a comment, and a string.
    pub fn c_all_scopes() -> &'static str {
        "int needle = 1; // needle in comment\nchar *s = \"needle in string\";\n"
    }

    /// Python with a docstring that looks like it contains a comment.
    pub fn python_docstring() -> &'static str {
        "def f():\n    \"\"\"needle # not a comment\"\"\"\n    return 1  # needle\n"
    }

    /// Rust with nested block comments.
    pub fn rust_nested_comment() -> &'static str {
        "/* outer /* needle inner */ still comment */ fn needle() {}\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_rule_sets_parse() {
        assert_eq!(sample_rules::needle().len(), 1);
        assert_eq!(sample_rules::windows_pair().len(), 2);
        assert_eq!(sample_rules::dependency_chain().len(), 3);
    }
}
