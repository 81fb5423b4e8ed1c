//! TOML Language Server
//!
//! LSP server for TOML documents, providing:
//! - Diagnostics (syntax errors, duplicate keys, schema validation)
//! - Completions (keys and values from the document's JSON Schema)
//! - Hover information (titles, descriptions and types from the schema)
//! - Formatting, document symbols and folding ranges
//!
//! Besides the standard protocol it answers a few `taplo/*` requests for
//! converting between TOML and JSON and for managing schema associations,
//! see [`lsp_ext`].

mod completion;
mod document;
mod hover;
pub mod lsp_ext;
mod outline;
mod position;
mod server;
mod session;

pub use server::{TaploLanguageServer, run, service};
