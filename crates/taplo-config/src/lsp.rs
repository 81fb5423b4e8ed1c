//! Settings supplied by the editor.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taplo_format::OptionsIncomplete;

use crate::Rule;

/// Options sent once with the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitConfig {
    /// Where schemas are cached on disk. No disk cache without it.
    pub cache_path: Option<PathBuf>,
    /// The section requested with `workspace/configuration`.
    pub configuration_section: String,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            configuration_section: "evenBetterToml".to_string(),
        }
    }
}

/// Workspace settings, updated through `workspace/didChangeConfiguration`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LspConfig {
    pub taplo: TaploConfig,
    pub schema: SchemaConfig,
    pub completion: CompletionConfig,
    pub formatter: OptionsIncomplete,
    pub rules: Vec<Rule>,
}

impl LspConfig {
    /// Merge `json` over the current settings. Unknown keys are ignored.
    pub fn update_from_json(&mut self, json: &Value) -> Result<(), serde_json::Error> {
        let mut patch = json.clone();
        // Formatter options serialize in snake case but editors send camel
        // case, and both spellings of one key must not end up side by side.
        if let Some(Value::Object(formatter)) = patch.get_mut("formatter") {
            *formatter = std::mem::take(formatter)
                .into_iter()
                .map(|(key, value)| (snake_case(&key), value))
                .collect();
        }

        let mut current = serde_json::to_value(&*self)?;
        merge_json(&mut current, &patch);
        *self = serde_json::from_value(current)?;
        Ok(())
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Recursively merge `patch` into `target`. Objects are merged key by key,
/// everything else is replaced. Nulls in `patch` are skipped.
fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None if !value.is_null() => {
                        target.insert(key.clone(), value.clone());
                    }
                    None => {}
                }
            }
        }
        (_, Value::Null) => {}
        (target, patch) => *target = patch.clone(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaploConfig {
    pub config_file: ConfigFileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigFileConfig {
    /// An explicit configuration file instead of searching for one.
    pub path: Option<PathBuf>,
    pub enabled: bool,
}

impl Default for ConfigFileConfig {
    fn default() -> Self {
        Self {
            path: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaConfig {
    pub enabled: bool,
    /// Pattern to schema URL. Patterns are globs, or regular expressions
    /// when prefixed with `regex:`.
    pub associations: IndexMap<String, String>,
    pub cache: SchemaCacheConfig,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            associations: IndexMap::new(),
            cache: SchemaCacheConfig::default(),
        }
    }
}

/// Cache lifetimes in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaCacheConfig {
    pub memory_expiration: u64,
    pub disk_expiration: u64,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            memory_expiration: 600,
            disk_expiration: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionConfig {
    /// How many keys a completion may insert at once.
    pub max_keys: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self { max_keys: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = LspConfig::default();
        assert!(config.schema.enabled);
        assert!(config.taplo.config_file.enabled);
        assert_eq!(config.schema.cache.memory_expiration, 600);
        assert_eq!(config.completion.max_keys, 5);
        assert_eq!(InitConfig::default().configuration_section, "evenBetterToml");
    }

    #[test]
    fn test_update_merges() {
        let mut config = LspConfig::default();
        config
            .update_from_json(&json!({
                "schema": { "associations": { "**/Cargo.toml": "https://example.com/cargo.json" } },
                "formatter": { "alignEntries": true },
                "somethingElse": 1,
            }))
            .unwrap();
        config
            .update_from_json(&json!({
                "schema": { "enabled": false },
                "formatter": { "columnWidth": 40, "alignEntries": false },
            }))
            .unwrap();

        assert!(!config.schema.enabled);
        assert_eq!(config.schema.associations.len(), 1);
        assert_eq!(config.formatter.align_entries, Some(false));
        assert_eq!(config.formatter.column_width, Some(40));
    }
}
