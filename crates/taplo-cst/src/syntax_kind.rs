//! Syntax node and token kinds for the TOML CST.

use taplo_tokenizer::TokenKind;

/// The kind of a syntax element (node or token).
///
/// Tokens are terminal elements (leaves), while nodes are non-terminal
/// (contain children). Tokens have lower values than `__LAST_TOKEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
#[allow(clippy::manual_non_exhaustive)] // __LAST_TOKEN is used for token/node distinction
pub enum SyntaxKind {
    // ========== TOKENS (terminals) ==========
    WHITESPACE = 0,
    NEWLINE,
    COMMENT,

    /// `=`
    EQ,
    /// `.`
    PERIOD,
    /// `,`
    COMMA,
    /// `[`
    BRACKET_START,
    /// `]`
    BRACKET_END,
    /// `{`
    BRACE_START,
    /// `}`
    BRACE_END,

    BARE_KEY,
    BASIC_STRING,
    MULTI_LINE_BASIC_STRING,
    LITERAL_STRING,
    MULTI_LINE_LITERAL_STRING,

    INTEGER,
    INTEGER_HEX,
    INTEGER_OCT,
    INTEGER_BIN,
    FLOAT,
    BOOL,

    OFFSET_DATE_TIME,
    LOCAL_DATE_TIME,
    LOCAL_DATE,
    LOCAL_TIME,

    /// Lexer error (unrecognized input)
    ERROR,

    #[doc(hidden)]
    __LAST_TOKEN,

    // ========== NODES (non-terminals) ==========
    /// Root document node
    ROOT,
    /// `key = value`
    ENTRY,
    /// A possibly dotted key
    KEY,
    /// The value of an entry or an array element
    VALUE,
    /// `[ ... ]` in value position
    ARRAY,
    /// `{ ... }`
    INLINE_TABLE,
    /// `[a.b]`
    TABLE_HEADER,
    /// `[[a.b]]`
    TABLE_ARRAY_HEADER,
    /// Tokens skipped during error recovery
    ERROR_NODE,
}

impl SyntaxKind {
    /// Whether this is a token (terminal) kind.
    pub fn is_token(self) -> bool {
        (self as u16) < (Self::__LAST_TOKEN as u16)
    }

    /// Whether this is a node (non-terminal) kind.
    pub fn is_node(self) -> bool {
        (self as u16) > (Self::__LAST_TOKEN as u16)
    }

    /// Whether this is trivia (whitespace, newlines or comments).
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::NEWLINE | Self::COMMENT)
    }

    /// Whether this token kind is a scalar value.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::BASIC_STRING
                | Self::MULTI_LINE_BASIC_STRING
                | Self::LITERAL_STRING
                | Self::MULTI_LINE_LITERAL_STRING
                | Self::INTEGER
                | Self::INTEGER_HEX
                | Self::INTEGER_OCT
                | Self::INTEGER_BIN
                | Self::FLOAT
                | Self::BOOL
                | Self::OFFSET_DATE_TIME
                | Self::LOCAL_DATE_TIME
                | Self::LOCAL_DATE
                | Self::LOCAL_TIME
        )
    }
}

impl From<TokenKind> for SyntaxKind {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Whitespace => Self::WHITESPACE,
            TokenKind::Newline => Self::NEWLINE,
            TokenKind::Comment => Self::COMMENT,
            TokenKind::Eq => Self::EQ,
            TokenKind::Period => Self::PERIOD,
            TokenKind::Comma => Self::COMMA,
            TokenKind::BracketStart => Self::BRACKET_START,
            TokenKind::BracketEnd => Self::BRACKET_END,
            TokenKind::BraceStart => Self::BRACE_START,
            TokenKind::BraceEnd => Self::BRACE_END,
            TokenKind::BareKey => Self::BARE_KEY,
            TokenKind::BasicString => Self::BASIC_STRING,
            TokenKind::MultiLineBasicString => Self::MULTI_LINE_BASIC_STRING,
            TokenKind::LiteralString => Self::LITERAL_STRING,
            TokenKind::MultiLineLiteralString => Self::MULTI_LINE_LITERAL_STRING,
            TokenKind::Integer => Self::INTEGER,
            TokenKind::IntegerHex => Self::INTEGER_HEX,
            TokenKind::IntegerOct => Self::INTEGER_OCT,
            TokenKind::IntegerBin => Self::INTEGER_BIN,
            TokenKind::Float => Self::FLOAT,
            TokenKind::Bool => Self::BOOL,
            TokenKind::OffsetDateTime => Self::OFFSET_DATE_TIME,
            TokenKind::LocalDateTime => Self::LOCAL_DATE_TIME,
            TokenKind::LocalDate => Self::LOCAL_DATE,
            TokenKind::LocalTime => Self::LOCAL_TIME,
            TokenKind::Error => Self::ERROR,
        }
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        rowan::SyntaxKind(kind as u16)
    }
}

/// Language definition for TOML, used by rowan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TomlLanguage {}

impl rowan::Language for TomlLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        Self::Kind::from_raw(raw.0).expect("invalid SyntaxKind value from rowan")
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        rowan::SyntaxKind(kind as u16)
    }
}

impl SyntaxKind {
    const ALL: [SyntaxKind; 36] = [
        Self::WHITESPACE,
        Self::NEWLINE,
        Self::COMMENT,
        Self::EQ,
        Self::PERIOD,
        Self::COMMA,
        Self::BRACKET_START,
        Self::BRACKET_END,
        Self::BRACE_START,
        Self::BRACE_END,
        Self::BARE_KEY,
        Self::BASIC_STRING,
        Self::MULTI_LINE_BASIC_STRING,
        Self::LITERAL_STRING,
        Self::MULTI_LINE_LITERAL_STRING,
        Self::INTEGER,
        Self::INTEGER_HEX,
        Self::INTEGER_OCT,
        Self::INTEGER_BIN,
        Self::FLOAT,
        Self::BOOL,
        Self::OFFSET_DATE_TIME,
        Self::LOCAL_DATE_TIME,
        Self::LOCAL_DATE,
        Self::LOCAL_TIME,
        Self::ERROR,
        Self::__LAST_TOKEN,
        Self::ROOT,
        Self::ENTRY,
        Self::KEY,
        Self::VALUE,
        Self::ARRAY,
        Self::INLINE_TABLE,
        Self::TABLE_HEADER,
        Self::TABLE_ARRAY_HEADER,
        Self::ERROR_NODE,
    ];

    /// Convert from a raw u16 value to SyntaxKind.
    /// Returns None if the value is out of range or corresponds to __LAST_TOKEN.
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if raw as usize >= Self::ALL.len() || raw == Self::__LAST_TOKEN as u16 {
            return None;
        }
        Some(Self::ALL[raw as usize])
    }
}

/// A syntax node in the TOML CST.
pub type SyntaxNode = rowan::SyntaxNode<TomlLanguage>;

/// A syntax token in the TOML CST.
pub type SyntaxToken = rowan::SyntaxToken<TomlLanguage>;

/// A syntax element (either node or token) in the TOML CST.
pub type SyntaxElement = rowan::SyntaxElement<TomlLanguage>;
