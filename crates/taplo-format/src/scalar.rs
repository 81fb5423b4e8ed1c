//! Scalar handling utilities for TOML output.
//!
//! Decides how keys must be written and turns decoded scalars back into
//! TOML source text.

use std::borrow::Cow;

use taplo_dom::Scalar;

/// Check if a key can be written without quotes.
///
/// Bare keys are non-empty and only contain ASCII letters, digits, `_`
/// and `-`.
pub fn can_be_bare(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Escape a string for a basic (double-quoted) string.
///
/// Returns the escaped content (without surrounding quotes).
pub fn escape_basic(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| matches!(c, '"' | '\\') || c.is_control()) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\u{8}' => result.push_str("\\b"),
            '\u{c}' => result.push_str("\\f"),
            c if c.is_control() => result.push_str(&format!("\\u{:04X}", c as u32)),
            c => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// A key segment as it must appear in TOML.
pub fn format_key(key: &str) -> Cow<'_, str> {
    if can_be_bare(key) {
        Cow::Borrowed(key)
    } else {
        Cow::Owned(format!("\"{}\"", escape_basic(key)))
    }
}

/// A dotted key path as it must appear in TOML.
pub fn format_key_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|key| format_key(key.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

/// TOML source text for a scalar.
pub fn format_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => format!("\"{}\"", escape_basic(s)),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => format_float(*f),
        Scalar::Bool(b) => b.to_string(),
        Scalar::OffsetDateTime(s)
        | Scalar::LocalDateTime(s)
        | Scalar::LocalDate(s)
        | Scalar::LocalTime(s) => s.clone(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        // Debug output always has a fraction or an exponent.
        format!("{f:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_can_be_bare() {
        assert!(can_be_bare("hello"));
        assert!(can_be_bare("with-dash_and_123"));
        assert!(!can_be_bare(""));
        assert!(!can_be_bare("a.b"));
        assert!(!can_be_bare("with space"));
        assert!(!can_be_bare("ключ"));
    }

    #[test]
    fn test_escape_basic() {
        assert_eq!(escape_basic("plain"), "plain");
        assert_eq!(escape_basic("say \"hi\"\n"), "say \\\"hi\\\"\\n");
        assert_eq!(escape_basic("\u{1}"), "\\u0001");
    }

    #[test]
    fn test_format_key_path() {
        assert_eq!(format_key_path(&["a", "b c", ""]), "a.\"b c\".\"\"");
    }

    #[test]
    fn test_format_scalar() {
        assert_eq!(format_scalar(&Scalar::Float(1.0)), "1.0");
        assert_eq!(format_scalar(&Scalar::Float(-2.5e-7)), "-2.5e-7");
        assert_eq!(format_scalar(&Scalar::Float(f64::NEG_INFINITY)), "-inf");
        assert_eq!(format_scalar(&Scalar::Float(f64::NAN)), "nan");
        assert_eq!(format_scalar(&Scalar::Integer(-3)), "-3");
        assert_eq!(
            format_scalar(&Scalar::LocalDate("1979-05-27".into())),
            "1979-05-27"
        );
    }
}
