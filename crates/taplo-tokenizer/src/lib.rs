//! A total, lossless tokenizer for TOML.
//!
//! Every byte of the input ends up in exactly one token. Input that is not
//! valid TOML produces [`TokenKind::Error`] tokens instead of failing.

mod span;
pub use span::Span;

mod token;
pub use token::{Token, TokenKind};

mod tokenizer;
pub use tokenizer::{Tokenizer, is_bare_key_char};

/// Tokenize the whole source into a vector.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Tokenizer::new(source).collect()
}
