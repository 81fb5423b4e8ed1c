//! Lossless Concrete Syntax Tree for TOML.
//!
//! This crate provides a CST representation of TOML documents using the
//! [rowan](https://docs.rs/rowan) library. Unlike an AST, the CST preserves
//! all source information including whitespace, comments, and exact token
//! positions, which is what formatters and language servers need.
//!
//! Parsing never fails. Syntax errors are collected in [`Parse::errors`] and
//! the offending tokens end up in `ERROR_NODE`s, so the tree always covers
//! every byte of the input.
//!
//! # Example
//!
//! ```
//! use taplo_cst::{parse, ast::{AstNode, Root, RootItem}};
//!
//! let source = "[server]\nhost = \"localhost\" # dev\n";
//!
//! let parsed = parse(source);
//! assert!(parsed.is_ok());
//!
//! let root = Root::cast(parsed.syntax()).unwrap();
//! for item in root.items() {
//!     if let RootItem::Entry(entry) = item {
//!         println!("key: {:?}", entry.key().map(|k| k.path()));
//!     }
//! }
//!
//! // Roundtrip: source can be exactly reconstructed
//! assert_eq!(parsed.syntax().to_string(), source);
//! ```

pub mod ast;
pub mod parser;
pub mod query;
pub mod string;
pub mod syntax_kind;

pub use parser::{Parse, ParseError, parse};
pub use string::{StringError, decode_string};
pub use syntax_kind::{SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken, TomlLanguage};

// Re-export rowan types for convenience
pub use rowan::{TextRange, TextSize};
