/// Whether a parsed `key = value` line sets the composed value from
/// scratch or appends to whatever has accumulated so far (spec.md §3,
/// value composition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Append,
}

/// One physical line inside a section. `raw_line` is the verbatim original
/// text (no line ending) and is what gets re-emitted on serialize unless
/// the entry was rewritten programmatically via `Insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    KeyValue { key: String, op: AssignOp, value_fragment: String, raw_line: String },
    Comment(String),
    Blank,
}

impl Entry {
    pub fn raw_line(&self) -> &str {
        match self {
            Entry::KeyValue { raw_line, .. } => raw_line,
            Entry::Comment(raw) => raw,
            Entry::Blank => "",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Entry::KeyValue { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Detects the dominant line ending of a text blob, per spec.md §4.1
/// ("Line endings match the dominant ending of the original input").
pub fn detect_line_ending(text: &str) -> &'static str {
    let crlf = text.matches("\r\n").count();
    let total_lf = text.matches('\n').count();
    if total_lf > 0 && crlf * 2 >= total_lf {
        "\r\n"
    } else {
        "\n"
    }
}

/// Splits text into logical lines without the trailing line-ending
/// characters, preserving empty trailing lines the way `str::lines` does
/// (no physical line continuation is supported, per spec.md §4.1).
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}
