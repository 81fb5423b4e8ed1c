//! Schemas bundled with the engine, served under `taplo://` URLs.

use serde_json::Value;
use url::Url;

use crate::SchemaError;

/// The schema of `.taplo.toml` and `taplo.toml` files.
pub const TAPLO_CONFIG_SCHEMA_URL: &str = "taplo://taplo.toml";

const TAPLO_CONFIG_SCHEMA: &str = include_str!("../schemas/taplo.toml.json");

/// Look up a bundled schema.
pub fn builtin_schema(url: &Url) -> Result<Value, SchemaError> {
    let source = match url.as_str() {
        TAPLO_CONFIG_SCHEMA_URL => TAPLO_CONFIG_SCHEMA,
        _ => {
            return Err(SchemaError::UnknownBuiltin {
                url: url.to_string(),
            });
        }
    };
    serde_json::from_str(source).map_err(|e| SchemaError::InvalidJson {
        url: url.to_string(),
        message: e.to_string(),
    })
}
