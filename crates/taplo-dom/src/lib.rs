//! Semantic document model for TOML.
//!
//! The [`Dom`] is built from the lossless syntax tree in `taplo-cst`. It
//! resolves dotted keys, table headers and arrays of tables into nested
//! tables and reports the errors the grammar alone cannot catch, such as
//! duplicate keys.
//!
//! ```
//! let (parse, dom) = taplo_dom::parse("[package]\nname = \"taplo\"\n");
//! assert!(parse.is_ok() && dom.is_valid());
//! let name = dom.lookup_keys(&["package", "name"]).unwrap();
//! assert_eq!(dom.scalar(name), Some(&taplo_dom::Scalar::String("taplo".into())));
//! ```

mod builder;
pub mod datetime;
mod diagnostic;
mod node;
mod scalar;

#[cfg(test)]
mod tests;

pub use builder::build;
pub use datetime::{DateTimeKind, parse_date_time};
pub use diagnostic::{SemanticError, render_parse_error};
pub use node::{
    Array, ArrayKind, Dom, DomBuilder, Entry, Node, NodeId, NodeKind, PathSegment, Table, TableKind,
};
pub use scalar::{Scalar, ScalarError, parse_scalar};

/// Parse `source` and build its document model.
pub fn parse(source: &str) -> (taplo_cst::Parse, Dom) {
    let parse = taplo_cst::parse(source);
    let dom = build(&parse.syntax());
    (parse, dom)
}
