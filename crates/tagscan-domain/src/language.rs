use std::fmt;
use std::path::Path;

/// Languages with a known comment/string grammar.
///
/// Detection is filename based: well-known file names first, then the
/// extension table. Files that resolve to no language are skipped by the
/// orchestrator rather than scanned blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Ruby,
    C,
    Cpp,
    CSharp,
    Java,
    Kotlin,
    Shell,
    Php,
    Swift,
    Plaintext,
}

impl Language {
    pub const ALL: [Language; 15] = [
        Language::Rust,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::Ruby,
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Java,
        Language::Kotlin,
        Language::Shell,
        Language::Php,
        Language::Swift,
        Language::Plaintext,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Shell => "shell",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Plaintext => "plaintext",
        }
    }

    /// Parse a language identifier. Matching is case-insensitive.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rust" => Some(Language::Rust),
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "typescript" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "ruby" => Some(Language::Ruby),
            "c" => Some(Language::C),
            "cpp" | "c++" => Some(Language::Cpp),
            "csharp" | "c#" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            "kotlin" => Some(Language::Kotlin),
            "shell" | "bash" | "sh" => Some(Language::Shell),
            "php" => Some(Language::Php),
            "swift" => Some(Language::Swift),
            "plaintext" | "text" => Some(Language::Plaintext),
            _ => None,
        }
    }

    /// Detect a language from a file name, by extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();

        match ext.as_str() {
            "rs" => Some(Language::Rust),
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "rb" | "rake" => Some(Language::Ruby),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Language::Cpp),
            "cs" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "sh" | "bash" | "zsh" => Some(Language::Shell),
            "php" => Some(Language::Php),
            "swift" => Some(Language::Swift),
            "txt" | "text" => Some(Language::Plaintext),
            _ => None,
        }
    }

    /// Returns the comment grammar for this language.
    pub fn comment_grammar(self) -> CommentGrammar {
        match self {
            Language::Python | Language::Ruby | Language::Shell => CommentGrammar {
                line: Some("#"),
                block: None,
                nested_blocks: false,
            },
            Language::Rust => CommentGrammar {
                line: Some("//"),
                block: Some(("/*", "*/")),
                nested_blocks: true,
            },
            Language::Php => CommentGrammar {
                // PHP also accepts '#'; '//' is the common form and the one
                // the classifier recognizes.
                line: Some("//"),
                block: Some(("/*", "*/")),
                nested_blocks: false,
            },
            Language::Plaintext => CommentGrammar {
                line: None,
                block: None,
                nested_blocks: false,
            },
            _ => CommentGrammar {
                line: Some("//"),
                block: Some(("/*", "*/")),
                nested_blocks: false,
            },
        }
    }

    /// Returns the string-literal quotes for this language.
    pub fn string_grammar(self) -> StringGrammar {
        match self {
            Language::Rust => StringGrammar {
                quotes: &[Quote::Escaped('"')],
            },
            Language::Python => StringGrammar {
                quotes: &[
                    Quote::Triple('"'),
                    Quote::Triple('\''),
                    Quote::Escaped('"'),
                    Quote::Escaped('\''),
                ],
            },
            Language::JavaScript | Language::TypeScript => StringGrammar {
                quotes: &[
                    Quote::Escaped('"'),
                    Quote::Escaped('\''),
                    Quote::Escaped('`'),
                ],
            },
            Language::Go => StringGrammar {
                quotes: &[Quote::Escaped('"'), Quote::Raw('`')],
            },
            Language::Ruby | Language::Shell | Language::Php => StringGrammar {
                quotes: &[Quote::Escaped('"'), Quote::Raw('\'')],
            },
            Language::Plaintext => StringGrammar { quotes: &[] },
            _ => StringGrammar {
                quotes: &[Quote::Escaped('"')],
            },
        }
    }

    /// True when the whole file is considered commented (plain text).
    pub fn always_commented(self) -> bool {
        matches!(self, Language::Plaintext)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comment delimiters for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentGrammar {
    pub line: Option<&'static str>,
    pub block: Option<(&'static str, &'static str)>,
    pub nested_blocks: bool,
}

/// String-literal delimiters for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringGrammar {
    pub quotes: &'static [Quote],
}

/// A string-literal quote style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    /// Delimited by one char, backslash escapes allowed.
    Escaped(char),
    /// Delimited by one char, no escapes (Go backtick, shell single quote).
    Raw(char),
    /// Delimited by the char repeated three times (Python).
    Triple(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_known_and_aliases() {
        assert_eq!(Language::from_name("rust"), Some(Language::Rust));
        assert_eq!(Language::from_name("RUST"), Some(Language::Rust));
        assert_eq!(Language::from_name("c++"), Some(Language::Cpp));
        assert_eq!(Language::from_name("c#"), Some(Language::CSharp));
        assert_eq!(Language::from_name("bash"), Some(Language::Shell));
        assert_eq!(Language::from_name("fortran"), None);
        assert_eq!(Language::from_name(""), None);
    }

    #[test]
    fn from_file_name_by_extension() {
        assert_eq!(Language::from_file_name("src/lib.rs"), Some(Language::Rust));
        assert_eq!(Language::from_file_name("app.test.ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_file_name("Makefile"), None);
        assert_eq!(Language::from_file_name("notes.txt"), Some(Language::Plaintext));
        assert_eq!(Language::from_file_name("weird.xyz"), None);
    }

    #[test]
    fn name_round_trips() {
        for lang in Language::ALL {
            assert_eq!(Language::from_name(lang.name()), Some(lang));
        }
    }

    #[test]
    fn hash_comment_languages_have_no_block_comments() {
        for lang in [Language::Python, Language::Ruby, Language::Shell] {
            let g = lang.comment_grammar();
            assert_eq!(g.line, Some("#"));
            assert!(g.block.is_none());
        }
    }

    #[test]
    fn only_rust_nests_block_comments() {
        for lang in Language::ALL {
            assert_eq!(
                lang.comment_grammar().nested_blocks,
                lang == Language::Rust,
                "{lang}"
            );
        }
    }

    #[test]
    fn plaintext_is_always_commented() {
        assert!(Language::Plaintext.always_commented());
        assert!(!Language::Rust.always_commented());
        assert!(Language::Plaintext.comment_grammar().line.is_none());
    }
}
