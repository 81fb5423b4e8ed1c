//! CST parser for TOML using rowan's GreenNodeBuilder.
//!
//! This parser produces a lossless concrete syntax tree that preserves
//! all whitespace, comments, and exact source representation. It never
//! fails: unexpected input is wrapped in `ERROR_NODE`s and reported in
//! [`Parse::errors`].

use rowan::{GreenNode, TextRange, TextSize};
use taplo_tokenizer::{Token, TokenKind, Tokenizer};
use tracing::trace;

use crate::syntax_kind::{SyntaxKind, SyntaxNode};

/// A parsed TOML document.
#[derive(Debug, Clone)]
pub struct Parse {
    green: GreenNode,
    errors: Vec<ParseError>,
}

impl Parse {
    /// Get the root syntax node.
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Check if parsing succeeded without errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to Result, returning errors if any.
    pub fn ok(self) -> Result<SyntaxNode, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(self.syntax())
        } else {
            Err(self.errors)
        }
    }

    pub fn green(&self) -> &GreenNode {
        &self.green
    }
}

/// A syntax error with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub range: TextRange,
    pub message: String,
}

impl ParseError {
    fn new(range: TextRange, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}..{}",
            self.message,
            u32::from(self.range.start()),
            u32::from(self.range.end())
        )
    }
}

impl std::error::Error for ParseError {}

/// Parse TOML source into a CST.
pub fn parse(source: &str) -> Parse {
    CstParser::new(source).parse()
}

/// Where the parser currently is, which decides the recovery sync points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Root,
    Array,
    InlineTable,
}

impl Context {
    fn is_sync(self, kind: TokenKind) -> bool {
        match self {
            Context::Root => kind == TokenKind::Newline,
            Context::Array => matches!(kind, TokenKind::Comma | TokenKind::BracketEnd),
            Context::InlineTable => matches!(
                kind,
                TokenKind::Comma | TokenKind::BraceEnd | TokenKind::Newline
            ),
        }
    }
}

/// CST parser that builds a green tree using rowan.
struct CstParser<'src> {
    source: &'src str,
    tokens: Vec<Token<'src>>,
    pos: usize,
    builder: rowan::GreenNodeBuilder<'static>,
    errors: Vec<ParseError>,
}

impl<'src> CstParser<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: Tokenizer::new(source).collect(),
            pos: 0,
            builder: rowan::GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Parse {
        self.builder.start_node(SyntaxKind::ROOT.into());
        self.parse_root();
        self.builder.finish_node();

        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn peek_nth(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    /// Kind of the next token that is not horizontal whitespace.
    fn peek_past_whitespace(&self) -> Option<TokenKind> {
        self.tokens[self.pos..]
            .iter()
            .map(|t| t.kind)
            .find(|k| *k != TokenKind::Whitespace)
    }

    /// Range of the current token, or an empty range at the end of input.
    fn current_range(&self) -> TextRange {
        match self.tokens.get(self.pos) {
            Some(t) => TextRange::new(t.span.start.into(), t.span.end.into()),
            None => TextRange::empty(TextSize::of(self.source)),
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    /// Consume and add the current token to the tree.
    fn bump(&mut self) {
        if let Some(token) = self.tokens.get(self.pos) {
            self.builder
                .token(SyntaxKind::from(token.kind).into(), token.text);
            self.pos += 1;
        }
    }

    fn error(&mut self, range: TextRange, message: impl Into<String>) {
        let error = ParseError::new(range, message);
        trace!(?error, "parse error");
        self.errors.push(error);
    }

    fn skip_whitespace(&mut self) {
        while self.at(TokenKind::Whitespace) {
            self.bump();
        }
    }

    /// Whitespace, newlines and comments.
    fn skip_trivia(&mut self) {
        while self.peek().is_some_and(TokenKind::is_trivia) {
            self.bump();
        }
    }

    /// Record an error and wrap everything up to the next sync point in an
    /// `ERROR_NODE`. Nothing is consumed if we are already at a sync point.
    fn recover(&mut self, context: Context, message: &str) {
        let start = self.current_range().start();
        if self.peek().is_none_or(|k| context.is_sync(k)) {
            self.error(TextRange::empty(start), message);
            return;
        }

        // Lexer errors get a more specific message.
        let message = match self.tokens.get(self.pos) {
            Some(t) if t.kind == TokenKind::Error => lexer_error_message(t.text),
            _ => message.to_string(),
        };

        self.builder.start_node(SyntaxKind::ERROR_NODE.into());
        let mut end = start;
        while let Some(kind) = self.peek() {
            if context.is_sync(kind) {
                break;
            }
            end = self.current_range().end();
            self.bump();
        }
        self.builder.finish_node();
        self.error(TextRange::new(start, end), message);
    }

    fn parse_root(&mut self) {
        loop {
            self.skip_trivia();
            match self.peek() {
                None => break,
                Some(TokenKind::BracketStart) => self.parse_header(),
                Some(kind) if is_key_start(kind) => self.parse_entry(Context::Root),
                Some(_) => self.recover(Context::Root, "expected a key or a table header"),
            }
            self.expect_line_end();
        }
    }

    /// After an entry or header only a comment may follow on the same line.
    fn expect_line_end(&mut self) {
        self.skip_whitespace();
        if self.at(TokenKind::Comment) {
            self.bump();
        }
        if self.peek().is_some_and(|k| k != TokenKind::Newline) {
            self.recover(Context::Root, "expected a newline");
        }
    }

    fn parse_header(&mut self) {
        let is_array = self.peek_nth(1) == Some(TokenKind::BracketStart);
        let (kind, closing) = if is_array {
            (SyntaxKind::TABLE_ARRAY_HEADER, "expected `]]`")
        } else {
            (SyntaxKind::TABLE_HEADER, "expected `]`")
        };

        self.builder.start_node(kind.into());
        self.bump();
        if is_array {
            self.bump();
        }
        self.skip_whitespace();
        self.parse_key();
        self.skip_whitespace();

        let mut closed = self.at(TokenKind::BracketEnd);
        if closed {
            self.bump();
            if is_array {
                closed = self.at(TokenKind::BracketEnd);
                if closed {
                    self.bump();
                }
            }
        }
        if !closed {
            let range = self.current_range();
            self.error(TextRange::empty(range.start()), closing);
        }
        self.builder.finish_node();
    }

    /// A possibly dotted key. Whitespace around periods belongs to the key.
    fn parse_key(&mut self) {
        self.builder.start_node(SyntaxKind::KEY.into());

        loop {
            match self.tokens.get(self.pos) {
                Some(token) if is_key_start(token.kind) => {
                    if !is_valid_key_token(token) {
                        let range = self.current_range();
                        let message = if token.kind.is_string() {
                            "multi-line strings cannot be used as keys".to_string()
                        } else {
                            format!("`{}` is not a valid key", token.text)
                        };
                        self.builder.start_node(SyntaxKind::ERROR_NODE.into());
                        self.bump();
                        self.builder.finish_node();
                        self.error(range, message);
                    } else {
                        self.bump();
                    }
                }
                _ => {
                    let range = self.current_range();
                    self.error(TextRange::empty(range.start()), "expected a key");
                    break;
                }
            }

            if self.peek_past_whitespace() != Some(TokenKind::Period) {
                break;
            }
            self.skip_whitespace();
            self.bump();
            self.skip_whitespace();
        }

        self.builder.finish_node();
    }

    fn parse_entry(&mut self, context: Context) {
        self.builder.start_node(SyntaxKind::ENTRY.into());
        self.parse_key();
        self.skip_whitespace();

        if self.at(TokenKind::Eq) {
            self.bump();
            self.skip_whitespace();
            self.parse_value(context);
        } else {
            self.recover(context, "expected `=`");
        }

        self.builder.finish_node();
    }

    fn parse_value(&mut self, context: Context) {
        self.builder.start_node(SyntaxKind::VALUE.into());
        match self.peek() {
            Some(kind) if SyntaxKind::from(kind).is_scalar() => self.bump(),
            Some(TokenKind::BracketStart) => self.parse_array(),
            Some(TokenKind::BraceStart) => self.parse_inline_table(),
            Some(TokenKind::Newline | TokenKind::Comment) | None => {
                let range = self.current_range();
                self.error(TextRange::empty(range.start()), "expected a value");
            }
            Some(_) => self.recover(context, "expected a value"),
        }
        self.builder.finish_node();
    }

    fn parse_array(&mut self) {
        self.builder.start_node(SyntaxKind::ARRAY.into());
        self.bump();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    self.error(self.current_range(), "expected `]`");
                    break;
                }
                Some(TokenKind::BracketEnd) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Comma) => {
                    let range = self.current_range();
                    self.builder.start_node(SyntaxKind::ERROR_NODE.into());
                    self.bump();
                    self.builder.finish_node();
                    self.error(range, "expected a value");
                    continue;
                }
                Some(_) => self.parse_value(Context::Array),
            }

            self.skip_trivia();
            match self.peek() {
                Some(TokenKind::Comma) => self.bump(),
                Some(TokenKind::BracketEnd) | None => {}
                Some(_) => self.recover(Context::Array, "expected `,` or `]`"),
            }
        }

        self.builder.finish_node();
    }

    fn parse_inline_table(&mut self) {
        self.builder.start_node(SyntaxKind::INLINE_TABLE.into());
        self.bump();
        self.skip_whitespace();

        if self.at(TokenKind::BraceEnd) {
            self.bump();
            self.builder.finish_node();
            return;
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(kind) if is_key_start(kind) => self.parse_entry(Context::InlineTable),
                Some(TokenKind::Newline) | None => {
                    let range = self.current_range();
                    self.error(TextRange::empty(range.start()), "expected `}`");
                    break;
                }
                Some(TokenKind::BraceEnd) => {
                    self.bump();
                    break;
                }
                Some(_) => self.recover(Context::InlineTable, "expected a key"),
            }

            self.skip_whitespace();
            match self.peek() {
                Some(TokenKind::Comma) => {
                    self.bump();
                    self.skip_whitespace();
                    if self.at(TokenKind::BraceEnd) {
                        let range = self.current_range();
                        self.error(range, "trailing commas are not allowed in inline tables");
                        self.bump();
                        break;
                    }
                }
                Some(TokenKind::BraceEnd) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Newline) | None => {
                    let range = self.current_range();
                    self.error(
                        TextRange::empty(range.start()),
                        "expected `}`, inline tables must be on a single line",
                    );
                    break;
                }
                Some(_) => self.recover(Context::InlineTable, "expected `,` or `}`"),
            }
        }

        self.builder.finish_node();
    }
}

/// Tokens that may start a key. Validity of the text is checked separately.
fn is_key_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::BareKey
            | TokenKind::BasicString
            | TokenKind::LiteralString
            | TokenKind::MultiLineBasicString
            | TokenKind::MultiLineLiteralString
            | TokenKind::Integer
            | TokenKind::IntegerHex
            | TokenKind::IntegerOct
            | TokenKind::IntegerBin
            | TokenKind::Float
            | TokenKind::Bool
            | TokenKind::LocalDate
    )
}

/// Numbers, bools and dates in key position are bare keys if their text is
/// made of bare key characters. Floats like `1.2` stand for two segments.
pub(crate) fn is_valid_key_token(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::BareKey | TokenKind::BasicString | TokenKind::LiteralString => true,
        TokenKind::MultiLineBasicString | TokenKind::MultiLineLiteralString => false,
        _ => token.text.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(taplo_tokenizer::is_bare_key_char)
        }),
    }
}

fn lexer_error_message(text: &str) -> String {
    if text.starts_with(['"', '\'']) {
        "unterminated string".to_string()
    } else {
        format!("unexpected `{text}`")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn parse_ok(source: &str) -> SyntaxNode {
        let parse = parse(source);
        assert!(parse.is_ok(), "parse errors: {:?}", parse.errors());
        parse.syntax()
    }

    fn kinds(node: &SyntaxNode) -> Vec<SyntaxKind> {
        node.children().map(|c| c.kind()).collect()
    }

    fn messages(source: &str) -> Vec<String> {
        parse(source)
            .errors()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    #[test]
    fn test_empty_document() {
        let node = parse_ok("");
        assert_eq!(node.kind(), SyntaxKind::ROOT);
        assert_eq!(node.children().count(), 0);
    }

    #[test]
    fn test_headers_are_root_siblings() {
        let node = parse_ok("a = 1\n[t.u]\nb = 2\n[[arr]]\nc = 3\n");
        assert_eq!(
            kinds(&node),
            vec![
                SyntaxKind::ENTRY,
                SyntaxKind::TABLE_HEADER,
                SyntaxKind::ENTRY,
                SyntaxKind::TABLE_ARRAY_HEADER,
                SyntaxKind::ENTRY,
            ]
        );
    }

    #[test]
    fn test_nested_values() {
        let node = parse_ok("a = [1, [2, 3], { x = \"y\" }]");
        let entry = node.children().next().unwrap();
        let value = entry.children().nth(1).unwrap();
        assert_eq!(value.kind(), SyntaxKind::VALUE);
        let array = value.children().next().unwrap();
        assert_eq!(array.kind(), SyntaxKind::ARRAY);
        assert_eq!(array.children().count(), 3);
    }

    #[test]
    fn test_dotted_keys_with_whitespace() {
        let node = parse_ok("a . b.\"c d\" = true");
        let entry = node.children().next().unwrap();
        let key = entry.children().next().unwrap();
        assert_eq!(key.kind(), SyntaxKind::KEY);
        assert_eq!(key.to_string(), "a . b.\"c d\"");
    }

    #[test]
    fn test_number_like_keys() {
        parse_ok("1 = 1\n1.2 = 2\ntrue = 3\n2024-01-01 = 4\n");
    }

    #[test]
    fn test_multi_line_array_with_comments() {
        parse_ok("a = [\n  1, # one\n  # standalone\n  2,\n]\n");
    }

    #[test]
    fn test_roundtrip() {
        let sources = [
            "a = 1",
            "[t]\nx = \"y\" # c\n",
            "  a.b = [ 1 , 2 ]  \r\n",
            "a = { b = 1, c = [2] }",
            "= = =\n[[x\n",
            "a = \"unterminated\nb = 2",
            "[a]]\n{\n",
        ];

        for source in sources {
            let parse = parse(source);
            assert_eq!(source, parse.syntax().to_string(), "roundtrip failed for: {source}");
        }
    }

    #[test]
    fn test_missing_eq_recovers_on_next_line() {
        let parse = parse("a 1\nb = 2\n");
        assert_eq!(parse.errors().len(), 1);
        assert_eq!(parse.errors()[0].message, "expected `=`");
        let root = parse.syntax();
        let entries: Vec<_> = root
            .children()
            .filter(|c| c.kind() == SyntaxKind::ENTRY)
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].to_string(), "b = 2");
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(messages("a =\n"), vec!["expected a value"]);
        assert_eq!(messages("a = # c\n"), vec!["expected a value"]);
    }

    #[test]
    fn test_two_entries_on_one_line() {
        assert_eq!(messages("a = 1 b = 2"), vec!["expected a newline"]);
    }

    #[test]
    fn test_array_recovery() {
        let parse = parse("a = [1, =, 3]\nb = 1\n");
        assert_eq!(parse.errors().len(), 1);
        assert_eq!(parse.errors()[0].message, "expected a value");
        assert_eq!(
            parse
                .syntax()
                .children()
                .filter(|c| c.kind() == SyntaxKind::ENTRY)
                .count(),
            2
        );
    }

    #[test]
    fn test_inline_table_errors() {
        assert_eq!(
            messages("a = { b = 1, }"),
            vec!["trailing commas are not allowed in inline tables"]
        );
        assert_eq!(
            messages("a = { b = 1\nc = 2\n"),
            vec!["expected `}`, inline tables must be on a single line"]
        );
    }

    #[test]
    fn test_header_errors() {
        assert_eq!(messages("[a\n"), vec!["expected `]`"]);
        assert_eq!(messages("[[a]\n"), vec!["expected `]]`"]);
        assert_eq!(messages("[]\n"), vec!["expected a key"]);
    }

    #[test]
    fn test_invalid_keys() {
        assert_eq!(messages("+1 = 2"), vec!["`+1` is not a valid key"]);
        assert_eq!(
            messages("'''a''' = 2"),
            vec!["multi-line strings cannot be used as keys"]
        );
    }

    #[test]
    fn test_lexer_errors_are_reported() {
        assert_eq!(messages("a = \"abc\n"), vec!["unterminated string"]);
        assert_eq!(messages("a = @x\n"), vec!["unexpected `@x`"]);
    }

    #[test]
    fn test_error_ranges() {
        let parse = parse("a = 1\nb 2\n");
        let error = &parse.errors()[0];
        assert_eq!(u32::from(error.range.start()), 8);
        assert_eq!(u32::from(error.range.end()), 9);
    }

    mod proptests {
        use super::super::parse;
        use proptest::prelude::*;

        fn toml_like() -> impl Strategy<Value = String> {
            prop::string::string_regex(
                "([a-z0-9\"' =.,#\\[\\]{}\n\t]|true|1\\.5|1979-05-27|\"\"\"|''')*",
            )
            .unwrap()
        }

        proptest! {
            #[test]
            fn cst_reproduces_source(source in toml_like()) {
                let parse = parse(&source);
                prop_assert_eq!(parse.syntax().to_string(), source);
            }

            #[test]
            fn cst_reproduces_arbitrary_text(source in "(?s).{0,100}") {
                let parse = parse(&source);
                prop_assert_eq!(parse.syntax().to_string(), source);
            }
        }
    }
}
