//! Token types for the TOML lexer.

use crate::Span;

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Trivia
    /// Spaces and tabs
    Whitespace,
    /// `\n` or `\r\n`
    Newline,
    /// `# ...` up to (not including) the line ending
    Comment,

    // Punctuation
    /// `=`
    Eq,
    /// `.`
    Period,
    /// `,`
    Comma,
    /// `[`
    BracketStart,
    /// `]`
    BracketEnd,
    /// `{`
    BraceStart,
    /// `}`
    BraceEnd,

    // Keys and strings
    /// Bare key: `[A-Za-z0-9_-]+` that is not a number, bool or date
    BareKey,
    /// `"..."`
    BasicString,
    /// `"""..."""`
    MultiLineBasicString,
    /// `'...'`
    LiteralString,
    /// `'''...'''`
    MultiLineLiteralString,

    // Numbers
    /// Decimal integer, optionally signed
    Integer,
    /// `0x...`
    IntegerHex,
    /// `0o...`
    IntegerOct,
    /// `0b...`
    IntegerBin,
    /// Float with fraction and/or exponent, or `inf`/`nan`
    Float,
    /// `true` or `false`
    Bool,

    // Date and time
    /// `1979-05-27T07:32:00Z`
    OffsetDateTime,
    /// `1979-05-27T07:32:00`
    LocalDateTime,
    /// `1979-05-27`
    LocalDate,
    /// `07:32:00`
    LocalTime,

    /// Unrecognized input
    Error,
}

impl TokenKind {
    /// Whether this token is trivia (whitespace, newlines or comments).
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
        )
    }

    /// Whether this token can stand alone as a scalar value.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            TokenKind::BasicString
                | TokenKind::MultiLineBasicString
                | TokenKind::LiteralString
                | TokenKind::MultiLineLiteralString
                | TokenKind::Integer
                | TokenKind::IntegerHex
                | TokenKind::IntegerOct
                | TokenKind::IntegerBin
                | TokenKind::Float
                | TokenKind::Bool
                | TokenKind::OffsetDateTime
                | TokenKind::LocalDateTime
                | TokenKind::LocalDate
                | TokenKind::LocalTime
        )
    }

    /// Whether this token is a string of any flavor.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            TokenKind::BasicString
                | TokenKind::MultiLineBasicString
                | TokenKind::LiteralString
                | TokenKind::MultiLineLiteralString
        )
    }
}

/// A token with its kind, span, and source text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub span: Span,
    /// The exact source text of this token.
    pub text: &'src str,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, span: Span, text: &'src str) -> Self {
        Self { kind, span, text }
    }
}
