use crate::error::{ConfigError, Result};

/// Result of scanning a raw `key = value` right-hand side: the value
/// contribution of this one physical line, with quoting resolved and any
/// trailing comment stripped off (comments are trivia, not part of the
/// value).
pub struct ScannedValue {
    pub value: String,
}

/// Scan the right-hand side of a `key = value` / `key += value` line per
/// the quoting state machine in spec.md §4.1: a leading quote enters a
/// quoted state in which `#`/`;` are literal; outside quotes they start a
/// trailing comment that terminates the value. An unclosed quote is an
/// error carrying the originating file and 1-based line number.
pub fn scan_value(raw: &str, file: &str, line: usize) -> Result<ScannedValue> {
    let chars: Vec<char> = raw.trim_start().chars().collect();

    if chars.is_empty() {
        return Ok(ScannedValue { value: String::new() });
    }

    if chars[0] == '"' || chars[0] == '\'' {
        let quote_char = chars[0];
        let mut out = String::new();
        let mut closed = false;
        let mut i = 1;
        while i < chars.len() {
            if chars[i] == quote_char {
                closed = true;
                break;
            }
            out.push(chars[i]);
            i += 1;
        }
        if !closed {
            return Err(ConfigError::unclosed_quotes(file, line));
        }
        // Anything after the closing quote (trailing whitespace, an
        // optional comment) is trivia; it never becomes part of the value.
        return Ok(ScannedValue { value: out });
    }

    // Plain scan: a `#` or `;` terminates the value and starts trailing
    // comment trivia.
    let mut out = String::new();
    for c in chars {
        if c == '#' || c == ';' {
            break;
        }
        out.push(c);
    }

    Ok(ScannedValue { value: out.trim_end().to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_value_strips_trailing_comment() {
        let v = scan_value("hello world # a comment", "f.ini", 1).unwrap();
        assert_eq!(v.value, "hello world");
    }

    #[test]
    fn semicolon_also_starts_a_comment() {
        let v = scan_value("1234 ; comment", "f.ini", 1).unwrap();
        assert_eq!(v.value, "1234");
    }

    #[test]
    fn double_quoted_value_keeps_inline_hash_literal() {
        let v = scan_value(r#""a # b""#, "f.ini", 1).unwrap();
        assert_eq!(v.value, "a # b");
    }

    #[test]
    fn single_quoted_value_keeps_inline_semicolon_literal() {
        let v = scan_value("'a ; b'", "f.ini", 1).unwrap();
        assert_eq!(v.value, "a ; b");
    }

    #[test]
    fn unclosed_double_quote_is_an_error() {
        let err = scan_value(r#""unterminated"#, "testfile.ini", 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error in testfile.ini:3: unclosed quotes"
        );
    }

    #[test]
    fn unclosed_single_quote_is_an_error() {
        let err = scan_value("'unterminated", "testfile.ini", 9).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error in testfile.ini:9: unclosed quotes"
        );
    }
}
