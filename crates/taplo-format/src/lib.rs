//! Formatting for TOML documents.
//!
//! The main entry point is [`format_source`], which normalizes a document
//! while keeping its comments and blank lines. Documents with syntax errors
//! are returned unchanged.
//!
//! ```
//! use taplo_format::{FormatterOptions, format_source};
//!
//! let formatted = format_source("a=1\n[ t ]\nb   =  [1,2]\n", FormatterOptions::default());
//! assert_eq!(formatted, "a = 1\n[t]\nb = [1, 2]\n");
//! ```

#[macro_use]
mod tracing_macros;

mod cst_format;
mod dom_format;
mod options;
mod scalar;

pub use cst_format::{format_source, format_source_with_scopes, format_syntax};
pub use dom_format::format_dom;
pub use options::{FormatterOptions, OptionsIncomplete, ScopedOptions};
pub use scalar::{can_be_bare, escape_basic, format_key, format_key_path, format_scalar};
