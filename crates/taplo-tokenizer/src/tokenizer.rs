//! Tokenizer for TOML source text.

use crate::{Span, Token, TokenKind};
use tracing::trace;

/// A tokenizer that produces tokens from TOML source text.
///
/// Tokenization is context-free: the same bytes always produce the same
/// tokens, whether they appear in key or value position. The parser decides
/// which tokens are acceptable where.
#[derive(Clone)]
pub struct Tokenizer<'src> {
    /// The source text being tokenized.
    source: &'src str,
    /// The remaining source text (suffix of `source`).
    remaining: &'src str,
    /// Current byte position in `source`.
    pos: u32,
}

impl<'src> Tokenizer<'src> {
    /// Create a new tokenizer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            remaining: source,
            pos: 0,
        }
    }

    /// Get the current byte position.
    #[inline]
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Check if we're at the end of input.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.remaining.is_empty()
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.remaining.chars().next()
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining.chars().nth(n)
    }

    #[inline]
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.advance_by(c.len_utf8());
        Some(c)
    }

    #[inline]
    fn advance_by(&mut self, n: usize) {
        self.pos += n as u32;
        self.remaining = &self.remaining[n..];
    }

    #[inline]
    fn starts_with(&self, prefix: &str) -> bool {
        self.remaining.starts_with(prefix)
    }

    #[inline]
    fn at_line_end(&self) -> bool {
        match self.peek() {
            None | Some('\n') => true,
            Some('\r') => self.peek_nth(1) == Some('\n'),
            Some(_) => false,
        }
    }

    /// Create a token from the given start position to current position.
    fn token(&self, kind: TokenKind, start: u32) -> Token<'src> {
        let span = Span::new(start, self.pos);
        let text = &self.source[start as usize..self.pos as usize];
        trace!("Token {:?} at {:?}: {:?}", kind, span, text);
        Token::new(kind, span, text)
    }

    fn single(&mut self, kind: TokenKind) -> Token<'src> {
        let start = self.pos;
        self.advance();
        self.token(kind, start)
    }

    /// Get the next token, or `None` at the end of input.
    pub fn next_token(&mut self) -> Option<Token<'src>> {
        let c = self.peek()?;
        let start = self.pos;

        let token = match c {
            ' ' | '\t' => self.tokenize_whitespace(),
            '\n' => self.single(TokenKind::Newline),
            '\r' if self.peek_nth(1) == Some('\n') => {
                self.advance_by(2);
                self.token(TokenKind::Newline, start)
            }
            '#' => self.tokenize_comment(),

            '=' => self.single(TokenKind::Eq),
            '.' => self.single(TokenKind::Period),
            ',' => self.single(TokenKind::Comma),
            '[' => self.single(TokenKind::BracketStart),
            ']' => self.single(TokenKind::BracketEnd),
            '{' => self.single(TokenKind::BraceStart),
            '}' => self.single(TokenKind::BraceEnd),

            '"' if self.starts_with(r#"""""#) => {
                self.tokenize_multi_line_string('"', TokenKind::MultiLineBasicString)
            }
            '"' => self.tokenize_string('"', TokenKind::BasicString),
            '\'' if self.starts_with("'''") => {
                self.tokenize_multi_line_string('\'', TokenKind::MultiLineLiteralString)
            }
            '\'' => self.tokenize_string('\'', TokenKind::LiteralString),

            _ if is_word_char(c) => self.tokenize_word(),
            _ => self.tokenize_error(),
        };

        Some(token)
    }

    fn tokenize_whitespace(&mut self) -> Token<'src> {
        let start = self.pos;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.advance();
        }
        self.token(TokenKind::Whitespace, start)
    }

    /// `# ...` up to the line ending, which is left for the next token.
    fn tokenize_comment(&mut self) -> Token<'src> {
        let start = self.pos;
        while !self.at_line_end() {
            self.advance();
        }
        self.token(TokenKind::Comment, start)
    }

    /// A single-line string. Escapes are skipped over but not validated.
    fn tokenize_string(&mut self, quote: char, kind: TokenKind) -> Token<'src> {
        let start = self.pos;
        self.advance();

        loop {
            if self.at_line_end() {
                // Unterminated: the error covers the rest of the line.
                return self.token(TokenKind::Error, start);
            }
            match self.advance() {
                Some(c) if c == quote => break,
                Some('\\') if quote == '"' => {
                    if !self.at_line_end() {
                        self.advance();
                    }
                }
                _ => {}
            }
        }

        self.token(kind, start)
    }

    fn tokenize_multi_line_string(&mut self, quote: char, kind: TokenKind) -> Token<'src> {
        let start = self.pos;
        let delimiter = if quote == '"' { r#"""""# } else { "'''" };
        self.advance_by(3);

        loop {
            if self.starts_with(delimiter) {
                self.advance_by(3);
                // Up to two quotes directly before the closing delimiter are content.
                for _ in 0..2 {
                    if self.peek() == Some(quote) {
                        self.advance();
                    }
                }
                return self.token(kind, start);
            }
            match self.advance() {
                None => return self.token(TokenKind::Error, start),
                Some('\\') if quote == '"' => {
                    self.advance();
                }
                Some(_) => {}
            }
        }
    }

    /// Numbers, dates, booleans and bare keys all start with a word character.
    ///
    /// Dates are tried first, then floats before integers so that `1.0` is not
    /// split into `1` and `.0`.
    fn tokenize_word(&mut self) -> Token<'src> {
        let start = self.pos;
        let rest = self.remaining;

        let matched = scan_date_time(rest)
            .or_else(|| scan_float(rest).map(|len| (TokenKind::Float, len)))
            .or_else(|| scan_integer(rest))
            .or_else(|| {
                scan_keyword(rest, "true")
                    .or_else(|| scan_keyword(rest, "false"))
                    .map(|len| (TokenKind::Bool, len))
            })
            .or_else(|| {
                let len = rest
                    .find(|c: char| !is_bare_key_char(c))
                    .unwrap_or(rest.len());
                (len > 0).then_some((TokenKind::BareKey, len))
            });

        match matched {
            Some((kind, len)) => {
                self.advance_by(len);
                self.token(kind, start)
            }
            None => self.tokenize_error(),
        }
    }

    /// Consume unrecognized input up to the next plausible boundary.
    fn tokenize_error(&mut self) -> Token<'src> {
        let start = self.pos;
        self.advance();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_structural(c) {
                break;
            }
            self.advance();
        }
        self.token(TokenKind::Error, start)
    }
}

impl<'src> Iterator for Tokenizer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Characters allowed in a bare key.
pub fn is_bare_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_word_char(c: char) -> bool {
    is_bare_key_char(c) || c == '+'
}

fn is_structural(c: char) -> bool {
    matches!(
        c,
        '[' | ']' | '{' | '}' | '=' | ',' | '.' | '#' | '"' | '\''
    )
}

/// Whether a number-like match of `len` bytes ends at a token boundary.
fn at_boundary(s: &str, len: usize) -> bool {
    match s[len..].chars().next() {
        None => true,
        Some(c) => !(is_word_char(c) || c == ':'),
    }
}

fn scan_keyword(s: &str, keyword: &str) -> Option<usize> {
    (s.starts_with(keyword) && at_boundary(s, keyword.len())).then_some(keyword.len())
}

/// Digits and underscores, starting with a digit.
fn scan_digits(b: &[u8]) -> usize {
    if !b.first().is_some_and(u8::is_ascii_digit) {
        return 0;
    }
    b.iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'_')
        .count()
}

fn scan_fixed_digits(b: &[u8], at: usize, count: usize) -> bool {
    b.len() >= at + count && b[at..at + count].iter().all(u8::is_ascii_digit)
}

fn scan_float(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    let mut i = usize::from(matches!(b.first(), Some(b'+' | b'-')));

    for special in ["inf", "nan"] {
        if s[i..].starts_with(special) && at_boundary(s, i + 3) {
            return Some(i + 3);
        }
    }

    let int_part = scan_digits(&b[i..]);
    if int_part == 0 {
        return None;
    }
    i += int_part;

    let mut is_float = false;
    if b.get(i) == Some(&b'.') {
        let frac = scan_digits(&b[i + 1..]);
        if frac == 0 {
            return None;
        }
        i += 1 + frac;
        is_float = true;
    }

    if matches!(b.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(b.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exponent = scan_digits(&b[j..]);
        if exponent == 0 {
            return None;
        }
        i = j + exponent;
        is_float = true;
    }

    (is_float && at_boundary(s, i)).then_some(i)
}

fn scan_integer(s: &str) -> Option<(TokenKind, usize)> {
    let b = s.as_bytes();

    let radix: [(&str, TokenKind, fn(&u8) -> bool); 3] = [
        ("0x", TokenKind::IntegerHex, u8::is_ascii_hexdigit),
        ("0o", TokenKind::IntegerOct, |c: &u8| matches!(*c, b'0'..=b'7')),
        ("0b", TokenKind::IntegerBin, |c: &u8| matches!(*c, b'0' | b'1')),
    ];
    for (prefix, kind, is_digit) in radix {
        if !s.starts_with(prefix) {
            continue;
        }
        let digits = &b[2..];
        if !digits.first().is_some_and(is_digit) {
            return None;
        }
        let len = 2 + digits
            .iter()
            .take_while(|c| is_digit(c) || **c == b'_')
            .count();
        return at_boundary(s, len).then_some((kind, len));
    }

    let sign = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let digits = scan_digits(&b[sign..]);
    if digits == 0 {
        return None;
    }
    let len = sign + digits;
    at_boundary(s, len).then_some((TokenKind::Integer, len))
}

/// `YYYY-MM-DD`
fn scan_date(b: &[u8]) -> Option<usize> {
    let ok = scan_fixed_digits(b, 0, 4)
        && b.get(4) == Some(&b'-')
        && scan_fixed_digits(b, 5, 2)
        && b.get(7) == Some(&b'-')
        && scan_fixed_digits(b, 8, 2);
    ok.then_some(10)
}

/// `HH:MM:SS` with optional fractional seconds.
fn scan_time(b: &[u8]) -> Option<usize> {
    let ok = scan_fixed_digits(b, 0, 2)
        && b.get(2) == Some(&b':')
        && scan_fixed_digits(b, 3, 2)
        && b.get(5) == Some(&b':')
        && scan_fixed_digits(b, 6, 2);
    if !ok {
        return None;
    }
    if b.get(8) == Some(&b'.') {
        let frac = b[9..].iter().take_while(|c| c.is_ascii_digit()).count();
        if frac > 0 {
            return Some(9 + frac);
        }
    }
    Some(8)
}

/// `Z` or `+HH:MM` / `-HH:MM`
fn scan_offset(b: &[u8]) -> Option<usize> {
    match b.first()? {
        b'Z' | b'z' => Some(1),
        b'+' | b'-' => {
            let ok = scan_fixed_digits(b, 1, 2)
                && b.get(3) == Some(&b':')
                && scan_fixed_digits(b, 4, 2);
            ok.then_some(6)
        }
        _ => None,
    }
}

fn scan_date_time(s: &str) -> Option<(TokenKind, usize)> {
    let b = s.as_bytes();

    if let Some(date) = scan_date(b) {
        let mut kind = TokenKind::LocalDate;
        let mut end = date;
        if matches!(b.get(date), Some(b'T' | b't' | b' '))
            && let Some(time) = scan_time(&b[date + 1..])
        {
            end = date + 1 + time;
            kind = TokenKind::LocalDateTime;
            if let Some(offset) = scan_offset(&b[end..]) {
                end += offset;
                kind = TokenKind::OffsetDateTime;
            }
        }
        return at_boundary(s, end).then_some((kind, end));
    }

    let time = scan_time(b)?;
    at_boundary(s, time).then_some((TokenKind::LocalTime, time))
}
