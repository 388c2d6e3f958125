use std::collections::HashMap;

use indexmap::IndexMap;

use crate::entry::{detect_line_ending, AssignOp, Entry};
use crate::error::{ConfigError, Result};
use crate::value::scan_value;

/// One `[section]` block: an ordered list of entries (key/value, comment,
/// blank) plus a derived, incrementally-maintained composed-value index so
/// lookups don't have to refold the entry list on every call.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub entries: Vec<Entry>,
    composed: IndexMap<String, String>,
    key_line_index: HashMap<String, usize>,
}

impl Section {
    pub(crate) fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        self.fold_entry_at(idx);
    }

    fn fold_entry_at(&mut self, idx: usize) {
        if let Entry::KeyValue { key, op, value_fragment, .. } = &self.entries[idx] {
            match op {
                AssignOp::Assign => {
                    self.composed.insert(key.clone(), value_fragment.clone());
                }
                AssignOp::Append => {
                    self.composed
                        .entry(key.clone())
                        .and_modify(|v| v.push_str(value_fragment))
                        .or_insert_with(|| value_fragment.clone());
                }
            }
            self.key_line_index.insert(key.clone(), idx);
        }
    }

    fn rebuild_index(&mut self) {
        self.composed.clear();
        self.key_line_index.clear();
        for idx in 0..self.entries.len() {
            self.fold_entry_at(idx);
        }
    }

    /// The composed value for `key`, folding every `=`/`+=` fragment in
    /// declaration order (spec.md §3, value composition).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.composed.get(key).map(|s| s.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.composed.keys().map(|s| s.as_str())
    }

    /// Rewrites `key`'s line in place if it exists; otherwise appends a new
    /// entry before any trailing blank entries (spec.md §4.1, Serialize).
    pub fn insert(&mut self, key: &str, value: &str) {
        let raw_line = render_key_value_line(key, value);
        let new_entry = Entry::KeyValue {
            key: key.to_string(),
            op: AssignOp::Assign,
            value_fragment: value.to_string(),
            raw_line,
        };

        if let Some(&idx) = self.key_line_index.get(key) {
            self.entries[idx] = new_entry;
        } else {
            let insert_at = self
                .entries
                .iter()
                .rposition(|e| !matches!(e, Entry::Blank))
                .map(|i| i + 1)
                .unwrap_or(0);
            self.entries.insert(insert_at, new_entry);
        }
        self.rebuild_index();
    }
}

fn render_key_value_line(key: &str, value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';']);
    if needs_quotes && !value.contains('"') {
        format!("{key} = \"{value}\"")
    } else if needs_quotes {
        format!("{key} = '{value}'")
    } else {
        format!("{key} = {value}")
    }
}

/// A single parsed (or programmatically built) INI document: the unit that
/// round-trips byte-for-byte (modulo trailing whitespace) per spec.md §8.
#[derive(Debug, Clone)]
pub struct Document {
    pub sections: IndexMap<String, Section>,
    line_ending: &'static str,
}

impl Document {
    pub fn empty() -> Self {
        Self { sections: IndexMap::new(), line_ending: "\n" }
    }

    pub fn section(&self, path: &str) -> Option<&Section> {
        self.sections.get(path)
    }

    pub fn section_mut(&mut self, path: &str) -> &mut Section {
        self.sections.entry(path.to_string()).or_default()
    }

    /// Parses one file's content per spec.md §4.1. `origin` is used purely
    /// for error messages (`config error in <origin>:<line>: ...`).
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let line_ending = detect_line_ending(text);
        let mut sections: IndexMap<String, Section> = IndexMap::new();
        let mut current = String::new();
        sections.entry(current.clone()).or_default();

        for (zero_based, raw) in text.lines().enumerate() {
            let line_no = zero_based + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                sections.entry(current.clone()).or_default().push(Entry::Blank);
                continue;
            }

            if trimmed.starts_with(';') || trimmed.starts_with('#') {
                sections.entry(current.clone()).or_default().push(Entry::Comment(raw.to_string()));
                continue;
            }

            if trimmed.starts_with('[') {
                if !trimmed.ends_with(']') || trimmed.len() < 2 {
                    return Err(ConfigError::MalformedSection {
                        file: origin.to_string(),
                        line: line_no,
                    });
                }
                let path = trimmed[1..trimmed.len() - 1].trim().to_string();
                sections.entry(path.clone()).or_default();
                current = path;
                continue;
            }

            match find_assignment(raw) {
                Some((key_end, value_start, op)) => {
                    let key = raw[..key_end].trim().to_string();
                    let scanned = scan_value(&raw[value_start..], origin, line_no)?;
                    sections.entry(current.clone()).or_default().push(Entry::KeyValue {
                        key,
                        op,
                        value_fragment: scanned.value,
                        raw_line: raw.to_string(),
                    });
                }
                None => {
                    // No `=`/`+=` and not a comment/blank/section line: kept
                    // verbatim as opaque trivia rather than rejected, since
                    // spec.md does not name an error kind for this case.
                    sections.entry(current.clone()).or_default().push(Entry::Comment(raw.to_string()));
                }
            }
        }

        Ok(Self { sections, line_ending })
    }

    pub fn to_string_preserving(&self) -> String {
        let mut out = String::new();
        for (path, section) in &self.sections {
            if !path.is_empty() {
                out.push('[');
                out.push_str(path);
                out.push(']');
                out.push_str(self.line_ending);
            }
            for entry in &section.entries {
                out.push_str(entry.raw_line());
                out.push_str(self.line_ending);
            }
        }
        out
    }
}

/// Finds the first `=` or `+=` in a raw line, returning the byte offset
/// where the key ends, the byte offset where the value begins, and which
/// operator was used.
fn find_assignment(raw: &str) -> Option<(usize, usize, AssignOp)> {
    let mut prev: Option<(usize, char)> = None;
    for (idx, c) in raw.char_indices() {
        if c == '=' {
            if let Some((pidx, '+')) = prev {
                return Some((pidx, idx + 1, AssignOp::Append));
            }
            return Some((idx, idx + 1, AssignOp::Assign));
        }
        prev = Some((idx, c));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_composes_without_separator() {
        let doc = Document::parse("x = a\nx += b\nx += c\n", "f.ini").unwrap();
        assert_eq!(doc.section("").unwrap().get("x"), Some("abc"));
    }

    #[test]
    fn round_trip_preserves_comments_blanks_and_order() {
        let input = "; leading comment\n[/settings/default]\nfoo = bar\n\n# trailing\nbaz = 1\n";
        let doc = Document::parse(input, "f.ini").unwrap();
        assert_eq!(doc.to_string_preserving(), input);
    }

    #[test]
    fn insert_rewrites_existing_key_in_place() {
        let mut doc = Document::parse("[/a]\nfoo = old\nbar = 1\n", "f.ini").unwrap();
        doc.section_mut("/a").insert("foo", "new");
        assert_eq!(doc.section("/a").unwrap().get("foo"), Some("new"));
        assert_eq!(
            doc.to_string_preserving(),
            "[/a]\nfoo = new\nbar = 1\n"
        );
    }

    #[test]
    fn insert_appends_new_key_before_trailing_blanks() {
        let mut doc = Document::parse("[/a]\nfoo = 1\n\n\n", "f.ini").unwrap();
        doc.section_mut("/a").insert("bar", "2");
        assert_eq!(
            doc.to_string_preserving(),
            "[/a]\nfoo = 1\nbar = 2\n\n\n"
        );
    }

    #[test]
    fn unclosed_quote_reports_exact_message() {
        // Line 3 is the offending line, matching the testable property in
        // spec.md §8 verbatim.
        let err = Document::parse("[/a]\n; comment\nKey = \"Value\n", "testfile.ini").unwrap_err();
        assert_eq!(err.to_string(), "config error in testfile.ini:3: unclosed quotes");
    }
}
