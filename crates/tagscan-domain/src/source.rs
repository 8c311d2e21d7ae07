use tagscan_types::{Boundary, ScopeKind};

use crate::language::{Language, Quote};

/// A line/column position. Lines are one-indexed, columns are byte offsets
/// from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A source file prepared for matching: the raw text, one-indexed line
/// tables, and a scope map classifying every byte as code, comment, or
/// string content.
///
/// Line tables are one-indexed with a padding entry at index zero, so
/// `line_starts[1]` is the first line. The scope map holds only comment and
/// string ranges, sorted and non-overlapping; anything not covered is code.
#[derive(Debug)]
pub struct SourceView {
    text: String,
    language: Language,
    line_starts: Vec<usize>,
    line_ends: Vec<usize>,
    scopes: Vec<(Boundary, ScopeKind)>,
}

impl SourceView {
    pub fn new(text: String, language: Language) -> Self {
        let mut line_starts = vec![0usize, 0];
        let mut line_ends = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_ends.push(i);
                line_starts.push(i + 1);
            }
        }
        if line_ends.len() < line_starts.len() {
            line_ends.push(text.len().saturating_sub(1));
        }
        let scopes = build_scope_map(&text, language);
        Self {
            text,
            language,
            line_starts,
            line_ends,
            scopes,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Number of lines, counting a trailing newline as starting a new line.
    pub fn line_count(&self) -> usize {
        self.line_starts.len() - 1
    }

    /// Maps a byte offset to its line and column.
    pub fn location_of(&self, index: usize) -> Location {
        // Greatest line whose start is <= index. partition_point over the
        // one-indexed tail keeps the padding entry out of the search.
        let line = self.line_starts[1..]
            .partition_point(|&s| s <= index)
            .max(1);
        Location {
            line,
            column: index - self.line_starts[line],
        }
    }

    /// Boundary of one line, including its terminating newline.
    pub fn line_boundary(&self, line: usize) -> Boundary {
        let line = line.clamp(1, self.line_count());
        let start = self.line_starts[line];
        let end = self.line_ends[line];
        Boundary::new(start, end.saturating_sub(start) + 1)
    }

    /// Boundary spanning `start_line..=end_line`, clamped to the file.
    pub fn region_boundary(&self, start_line: usize, end_line: usize) -> Boundary {
        let start_line = start_line.clamp(1, self.line_count());
        let end_line = end_line.clamp(start_line, self.line_count());
        let start = self.line_starts[start_line];
        let end = self.line_ends[end_line];
        Boundary::new(start, end.saturating_sub(start) + 1)
    }

    /// Text inside a boundary, clamped to the file.
    pub fn text_of(&self, boundary: Boundary) -> &str {
        let start = boundary.start.min(self.text.len());
        let end = boundary.end().min(self.text.len());
        self.text.get(start..end).unwrap_or("")
    }

    /// Scope of the byte at `index`. Bytes outside any comment or string
    /// range are code.
    pub fn scope_of(&self, index: usize) -> ScopeKind {
        let i = self.scopes.partition_point(|(b, _)| b.end() <= index);
        match self.scopes.get(i) {
            Some((b, kind)) if b.contains_offset(index) => *kind,
            _ => ScopeKind::Code,
        }
    }

    /// True when a match at `boundary` is acceptable under a pattern's scope
    /// filter. An empty filter, or one naming every scope, accepts anything.
    pub fn scope_match(&self, filter: &[ScopeKind], boundary: Boundary) -> bool {
        if filter.is_empty() || ScopeKind::ALL.iter().all(|s| filter.contains(s)) {
            return true;
        }
        filter.contains(&self.scope_of(boundary.start))
    }

    /// A few lines of context around a match, for reporting.
    ///
    /// When the context lines carry more than `context * 100` chars per
    /// side, as minified sources do, the excerpt falls back to that many
    /// chars around the match itself.
    pub fn excerpt(&self, boundary: Boundary, context: usize) -> &str {
        if context == 0 {
            return "";
        }
        let len = self.text.len();
        let match_start = boundary.start.min(len);
        let match_end = boundary.end().min(len);
        let first = self
            .location_of(match_start)
            .line
            .saturating_sub(context)
            .max(1);
        let last = (self.location_of(match_end).line + context).min(self.line_count());
        let region = self.region_boundary(first, last);

        let mut start = region.start.min(len);
        let mut end = region.end().min(len);
        let cap = context * 100;
        if (end - start).saturating_sub(boundary.length) > cap * 2 {
            start = match_start.saturating_sub(cap);
            end = (match_end + cap).min(len);
        }
        while start < end && !self.text.is_char_boundary(start) {
            start += 1;
        }
        while end > start && !self.text.is_char_boundary(end) {
            end -= 1;
        }
        self.text.get(start..end).unwrap_or("")
    }
}

/// One pass over the text, classifying comment and string ranges.
fn build_scope_map(text: &str, language: Language) -> Vec<(Boundary, ScopeKind)> {
    if language.always_commented() {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![(Boundary::new(0, text.len()), ScopeKind::Comment)];
    }

    let grammar = language.comment_grammar();
    let strings = language.string_grammar();
    let bytes = text.as_bytes();
    let mut scopes = Vec::new();
    let mut i = 0;

    'outer: while i < bytes.len() {
        if let Some((open, close)) = grammar.block {
            if bytes[i..].starts_with(open.as_bytes()) {
                let start = i;
                i += open.len();
                let mut depth = 1usize;
                while i < bytes.len() && depth > 0 {
                    if grammar.nested_blocks && bytes[i..].starts_with(open.as_bytes()) {
                        depth += 1;
                        i += open.len();
                    } else if bytes[i..].starts_with(close.as_bytes()) {
                        depth -= 1;
                        i += close.len();
                    } else {
                        i += 1;
                    }
                }
                scopes.push((Boundary::new(start, i - start), ScopeKind::Comment));
                continue;
            }
        }
        if let Some(line) = grammar.line {
            if bytes[i..].starts_with(line.as_bytes()) {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                scopes.push((Boundary::new(start, i - start), ScopeKind::Comment));
                continue;
            }
        }
        for quote in strings.quotes {
            match *quote {
                Quote::Triple(c) => {
                    let delim = [c as u8; 3];
                    if bytes[i..].starts_with(&delim) {
                        let start = i;
                        i += 3;
                        while i < bytes.len() {
                            if bytes[i] == b'\\' {
                                i = (i + 2).min(bytes.len());
                            } else if bytes[i..].starts_with(&delim) {
                                i += 3;
                                break;
                            } else {
                                i += 1;
                            }
                        }
                        scopes.push((Boundary::new(start, i - start), ScopeKind::String));
                        continue 'outer;
                    }
                }
                Quote::Escaped(c) => {
                    if bytes[i] == c as u8 {
                        let start = i;
                        i += 1;
                        while i < bytes.len() && bytes[i] != b'\n' {
                            if bytes[i] == b'\\' {
                                i = (i + 2).min(bytes.len());
                            } else if bytes[i] == c as u8 {
                                i += 1;
                                break;
                            } else {
                                i += 1;
                            }
                        }
                        scopes.push((Boundary::new(start, i - start), ScopeKind::String));
                        continue 'outer;
                    }
                }
                Quote::Raw(c) => {
                    if bytes[i] == c as u8 {
                        let start = i;
                        i += 1;
                        while i < bytes.len() && bytes[i] != c as u8 {
                            i += 1;
                        }
                        i = (i + 1).min(bytes.len());
                        scopes.push((Boundary::new(start, i - start), ScopeKind::String));
                        continue 'outer;
                    }
                }
            }
        }
        i += 1;
    }

    scopes
}
