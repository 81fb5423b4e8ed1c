//! Decoding of TOML string tokens.

use crate::SyntaxKind;

/// An error found while decoding a string token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError {
    /// Byte offset of the problem, relative to the start of the token.
    pub offset: usize,
    /// Length of the offending text in bytes.
    pub len: usize,
    pub message: String,
}

impl std::fmt::Display for StringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StringError {}

/// Decode the text of a string token into its value.
///
/// Basic strings have their escapes processed; literal strings are taken
/// verbatim. Multi-line strings drop a newline directly after the opening
/// delimiter.
pub fn decode_string(kind: SyntaxKind, text: &str) -> Result<String, StringError> {
    match kind {
        SyntaxKind::BASIC_STRING => unescape(strip(text, 1), 1, false),
        SyntaxKind::LITERAL_STRING => Ok(strip(text, 1).to_string()),
        SyntaxKind::MULTI_LINE_BASIC_STRING => {
            let (content, skipped) = trim_first_newline(strip(text, 3));
            unescape(content, 3 + skipped, true)
        }
        SyntaxKind::MULTI_LINE_LITERAL_STRING => {
            Ok(trim_first_newline(strip(text, 3)).0.to_string())
        }
        _ => Err(StringError {
            offset: 0,
            len: text.len(),
            message: format!("{kind:?} is not a string"),
        }),
    }
}

fn strip(text: &str, quotes: usize) -> &str {
    if text.len() < quotes * 2 {
        return "";
    }
    &text[quotes..text.len() - quotes]
}

fn trim_first_newline(s: &str) -> (&str, usize) {
    if let Some(rest) = s.strip_prefix("\r\n") {
        (rest, 2)
    } else if let Some(rest) = s.strip_prefix('\n') {
        (rest, 1)
    } else {
        (s, 0)
    }
}

fn unescape(content: &str, base: usize, multi_line: bool) -> Result<String, StringError> {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let error = |len: usize, message: String| StringError {
            offset: base + i,
            len,
            message,
        };

        let Some((_, escape)) = chars.next() else {
            return Err(error(1, "unterminated escape sequence".into()));
        };

        match escape {
            'b' => out.push('\u{8}'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'f' => out.push('\u{c}'),
            'r' => out.push('\r'),
            'e' => out.push('\u{1b}'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'u' | 'U' => {
                let digits = if escape == 'u' { 4 } else { 8 };
                let start = i + 2;
                let hex = content.get(start..start + digits).unwrap_or("");
                if hex.len() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(error(
                        2 + hex.len(),
                        format!("expected {digits} hex digits after `\\{escape}`"),
                    ));
                }
                let code = u32::from_str_radix(hex, 16).unwrap_or(u32::MAX);
                let Some(decoded) = char::from_u32(code) else {
                    return Err(error(
                        2 + digits,
                        format!("`\\{escape}{hex}` is not a valid unicode scalar value"),
                    ));
                };
                out.push(decoded);
                for _ in 0..digits {
                    chars.next();
                }
            }
            c if multi_line && (c == ' ' || c == '\t' || c == '\n' || c == '\r') => {
                // Line ending backslash: only whitespace may follow it on the line.
                let mut saw_newline = c == '\n';
                while let Some(&(_, next)) = chars.peek() {
                    match next {
                        ' ' | '\t' | '\r' => {}
                        '\n' => saw_newline = true,
                        _ => break,
                    }
                    chars.next();
                }
                if !saw_newline {
                    return Err(error(2, "invalid escape sequence `\\ `".into()));
                }
            }
            other => {
                return Err(error(
                    1 + other.len_utf8(),
                    format!("invalid escape sequence `\\{other}`"),
                ));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn basic_escapes() {
        assert_eq!(
            decode_string(SyntaxKind::BASIC_STRING, r#""a\tb\n\"c\" \u00e9 \U0001F600""#).unwrap(),
            "a\tb\n\"c\" é 😀"
        );
    }

    #[test]
    fn literal_is_verbatim() {
        assert_eq!(
            decode_string(SyntaxKind::LITERAL_STRING, r"'C:\Users\n'").unwrap(),
            r"C:\Users\n"
        );
    }

    #[test]
    fn invalid_escape_reports_offset() {
        let err = decode_string(SyntaxKind::BASIC_STRING, r#""ab\qc""#).unwrap_err();
        assert_eq!(err.offset, 3);
        assert_eq!(err.len, 2);
        assert!(err.message.contains("\\q"));
    }

    #[test]
    fn bad_unicode_escape() {
        let err = decode_string(SyntaxKind::BASIC_STRING, r#""\uD800""#).unwrap_err();
        assert!(err.message.contains("unicode scalar"));
        let err = decode_string(SyntaxKind::BASIC_STRING, r#""\u12""#).unwrap_err();
        assert!(err.message.contains("4 hex digits"));
    }

    #[test]
    fn multi_line_trims_first_newline_and_line_continuations() {
        let text = "\"\"\"\nThe quick \\\n    brown fox\"\"\"";
        assert_eq!(
            decode_string(SyntaxKind::MULTI_LINE_BASIC_STRING, text).unwrap(),
            "The quick brown fox"
        );
        assert_eq!(
            decode_string(SyntaxKind::MULTI_LINE_LITERAL_STRING, "'''\nline\n'''").unwrap(),
            "line\n"
        );
    }

    #[test]
    fn multi_line_with_extra_closing_quotes() {
        assert_eq!(
            decode_string(SyntaxKind::MULTI_LINE_BASIC_STRING, "\"\"\"a\"\"\"\"\"").unwrap(),
            "a\"\""
        );
    }
}
