//! JSON Schema support for TOML documents.
//!
//! - [`SchemaAssociations`] decides which schema applies to a document.
//! - [`SchemaCache`] loads schemas from files, the network or the bundled
//!   set, and keeps them in memory and optionally on disk.
//! - [`validate`] checks a [`taplo_dom::Dom`] against a schema.
//! - [`schemas_at_path`] and friends look up what a schema says about a
//!   key, for completions and hovers.
//!
//! ```
//! use serde_json::json;
//! use taplo_schema::{SchemaResolver, validate};
//!
//! let schema = json!({ "properties": { "port": { "type": "integer", "maximum": 65535 } } });
//! let (_, dom) = taplo_dom::parse("port = 80000\n");
//! let errors = validate(&dom, &schema, &SchemaResolver::new());
//! assert_eq!(errors[0].to_string(), "port: value must be at most 65535");
//! ```

mod associations;
mod builtin;
mod cache;
mod completion;
mod error;
mod resolver;
mod validate;

pub use associations::{
    AssociationRule, PRIORITY_BUILTIN, PRIORITY_CATALOG, PRIORITY_CONFIG_FILE, PRIORITY_DIRECTIVE,
    PRIORITY_LSP_CONFIG, PRIORITY_MANUAL, SOURCE_BUILTIN, SOURCE_CONFIG_FILE, SOURCE_DIRECTIVE,
    SOURCE_LSP_CONFIG, SOURCE_MANUAL, SchemaAssociation, SchemaAssociations, TieBreak,
    schema_directive,
};
pub use builtin::{TAPLO_CONFIG_SCHEMA_URL, builtin_schema};
pub use cache::{SchemaCache, SchemaState};
pub use completion::{
    PropertyCompletion, SchemaLocation, ValueCompletion, property_completions, schemas_at_path,
    value_completions,
};
pub use error::SchemaError;
pub use resolver::SchemaResolver;
pub use validate::{ValidationError, ValidationErrorKind, validate};
