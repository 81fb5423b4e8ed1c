//! Conversion of scalar tokens into values.

use taplo_cst::{SyntaxKind, decode_string};

use crate::datetime::{DateTimeKind, parse_date_time};

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// RFC 3339 text, e.g. `1979-05-27T07:32:00Z`.
    OffsetDateTime(String),
    LocalDateTime(String),
    LocalDate(String),
    LocalTime(String),
}

impl Scalar {
    /// Short name of the TOML type, used in messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Bool(_) => "boolean",
            Scalar::OffsetDateTime(_) => "offset date-time",
            Scalar::LocalDateTime(_) => "local date-time",
            Scalar::LocalDate(_) => "local date",
            Scalar::LocalTime(_) => "local time",
        }
    }

    /// Build a date-time scalar from a literal, if it is one.
    pub fn date_time(text: &str) -> Option<Scalar> {
        let (kind, normalized) = parse_date_time(text).ok()?;
        Some(match kind {
            DateTimeKind::OffsetDateTime => Scalar::OffsetDateTime(normalized),
            DateTimeKind::LocalDateTime => Scalar::LocalDateTime(normalized),
            DateTimeKind::LocalDate => Scalar::LocalDate(normalized),
            DateTimeKind::LocalTime => Scalar::LocalTime(normalized),
        })
    }
}

/// Why a scalar token could not be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarError {
    /// Byte offset of the problem relative to the token start.
    pub offset: usize,
    pub len: usize,
    pub message: String,
}

impl ScalarError {
    fn whole(text: &str, message: impl Into<String>) -> Self {
        Self {
            offset: 0,
            len: text.len(),
            message: message.into(),
        }
    }
}

/// Parse the text of a scalar token of the given kind.
pub fn parse_scalar(kind: SyntaxKind, text: &str) -> Result<Scalar, ScalarError> {
    match kind {
        SyntaxKind::BASIC_STRING
        | SyntaxKind::LITERAL_STRING
        | SyntaxKind::MULTI_LINE_BASIC_STRING
        | SyntaxKind::MULTI_LINE_LITERAL_STRING => decode_string(kind, text)
            .map(Scalar::String)
            .map_err(|e| ScalarError {
                offset: e.offset,
                len: e.len,
                message: e.message,
            }),
        SyntaxKind::INTEGER => parse_decimal(text).map(Scalar::Integer),
        SyntaxKind::INTEGER_HEX => parse_radix(text, 16).map(Scalar::Integer),
        SyntaxKind::INTEGER_OCT => parse_radix(text, 8).map(Scalar::Integer),
        SyntaxKind::INTEGER_BIN => parse_radix(text, 2).map(Scalar::Integer),
        SyntaxKind::FLOAT => parse_float(text).map(Scalar::Float),
        SyntaxKind::BOOL => Ok(Scalar::Bool(text == "true")),
        SyntaxKind::OFFSET_DATE_TIME
        | SyntaxKind::LOCAL_DATE_TIME
        | SyntaxKind::LOCAL_DATE
        | SyntaxKind::LOCAL_TIME => {
            let (_, normalized) =
                parse_date_time(text).map_err(|message| ScalarError::whole(text, message))?;
            Ok(match kind {
                SyntaxKind::OFFSET_DATE_TIME => Scalar::OffsetDateTime(normalized),
                SyntaxKind::LOCAL_DATE_TIME => Scalar::LocalDateTime(normalized),
                SyntaxKind::LOCAL_DATE => Scalar::LocalDate(normalized),
                _ => Scalar::LocalTime(normalized),
            })
        }
        _ => Err(ScalarError::whole(text, format!("{kind:?} is not a value"))),
    }
}

/// Check underscore placement and strip underscores. Each underscore must
/// sit between two bytes accepted by `is_digit`.
fn digits_without_underscores(text: &str, digits: &str, is_digit: fn(&u8) -> bool) -> Result<String, ScalarError> {
    let bytes = digits.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let between = i > 0
                && i + 1 < bytes.len()
                && is_digit(&bytes[i - 1])
                && is_digit(&bytes[i + 1]);
            if !between {
                return Err(ScalarError {
                    offset: text.len() - digits.len() + i,
                    len: 1,
                    message: "underscores must be between digits".into(),
                });
            }
        }
    }
    Ok(digits.replace('_', ""))
}

fn parse_decimal(text: &str) -> Result<i64, ScalarError> {
    let unsigned = text.trim_start_matches(['+', '-']);
    let digits = digits_without_underscores(text, unsigned, u8::is_ascii_digit)?;
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(ScalarError::whole(text, "leading zeros are not allowed"));
    }
    let signed = if text.starts_with('-') {
        format!("-{digits}")
    } else {
        digits
    };
    signed
        .parse::<i64>()
        .map_err(|_| ScalarError::whole(text, "integer does not fit in 64 bits"))
}

fn parse_radix(text: &str, radix: u32) -> Result<i64, ScalarError> {
    let digits = digits_without_underscores(text, text.get(2..).unwrap_or(""), u8::is_ascii_hexdigit)?;
    let value = u64::from_str_radix(&digits, radix)
        .map_err(|_| ScalarError::whole(text, "invalid integer"))?;
    i64::try_from(value).map_err(|_| ScalarError::whole(text, "integer does not fit in 64 bits"))
}

fn parse_float(text: &str) -> Result<f64, ScalarError> {
    let unsigned = text.trim_start_matches(['+', '-']);
    let negative = text.starts_with('-');
    match unsigned {
        "inf" => return Ok(if negative { f64::NEG_INFINITY } else { f64::INFINITY }),
        "nan" => return Ok(if negative { -f64::NAN } else { f64::NAN }),
        _ => {}
    }
    let digits = digits_without_underscores(text, unsigned, u8::is_ascii_digit)?;
    let int_part: &str = digits.split(['.', 'e', 'E']).next().unwrap_or("");
    if int_part.len() > 1 && int_part.starts_with('0') {
        return Err(ScalarError::whole(text, "leading zeros are not allowed"));
    }
    if digits.ends_with('.') || digits.contains(".e") || digits.contains(".E") {
        return Err(ScalarError::whole(text, "expected digits after `.`"));
    }
    let value: f64 = digits
        .parse()
        .map_err(|_| ScalarError::whole(text, "invalid float"))?;
    Ok(if negative { -value } else { value })
}
