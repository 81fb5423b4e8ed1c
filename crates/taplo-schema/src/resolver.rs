//! `$ref` resolution across loaded schemas.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

/// The schema document a `$ref` is resolved against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub url: Option<&'a Url>,
    pub root: &'a Value,
}

/// Resolves references of a root schema to the schemas they point into.
///
/// Only schemas inserted beforehand are visible. References to anything
/// else resolve to nothing.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    base: Option<Url>,
    schemas: HashMap<Url, Arc<Value>>,
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver for a root schema loaded from `base`.
    pub fn with_base(base: Url) -> Self {
        Self {
            base: Some(base),
            schemas: HashMap::new(),
        }
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Make an external schema available to absolute references.
    pub fn insert(&mut self, url: Url, schema: Arc<Value>) {
        self.schemas.insert(without_fragment(url), schema);
    }

    pub(crate) fn root_scope<'a>(&'a self, schema: &'a Value) -> Scope<'a> {
        Scope {
            url: self.base.as_ref(),
            root: schema,
        }
    }

    /// Resolve `reference` from within `scope`. Returns the scope of the
    /// target, the target, and a canonical name for the target.
    pub(crate) fn resolve<'a>(&'a self, scope: Scope<'a>, reference: &str) -> Option<(Scope<'a>, &'a Value, String)> {
        let (document, fragment) = reference.split_once('#').unwrap_or((reference, ""));

        let scope = if document.is_empty() {
            scope
        } else {
            let url = match scope.url {
                Some(base) => base.join(document).ok()?,
                None => Url::parse(document).ok()?,
            };
            let (url, root) = self.schemas.get_key_value(&without_fragment(url))?;
            Scope {
                url: Some(url),
                root: root.as_ref(),
            }
        };

        let target = if fragment.is_empty() {
            scope.root
        } else {
            scope.root.pointer(fragment)?
        };
        let name = format!(
            "{}#{fragment}",
            scope.url.map(Url::as_str).unwrap_or_default()
        );
        Some((scope, target, name))
    }
}

fn without_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// The absolute URLs of other schema documents that `schema` refers to.
pub(crate) fn external_refs(schema: &Value, base: &Url) -> Vec<Url> {
    let mut found = Vec::new();
    collect_refs(schema, base, &mut found);
    found
}

fn collect_refs(value: &Value, base: &Url, found: &mut Vec<Url>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let document = reference.split('#').next().unwrap_or_default();
                if !document.is_empty()
                    && let Ok(url) = base.join(document)
                    && !found.contains(&url)
                {
                    found.push(url);
                }
            }
            for child in map.values() {
                collect_refs(child, base, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_refs(child, base, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;

    #[test]
    fn test_local_and_external() {
        let root = json!({
            "definitions": { "port": { "type": "integer" } },
            "properties": { "tls": { "$ref": "tls.json#/definitions/cert" } }
        });
        let mut resolver = SchemaResolver::with_base(Url::parse("https://s/main.json").unwrap());
        resolver.insert(
            Url::parse("https://s/tls.json").unwrap(),
            Arc::new(json!({ "definitions": { "cert": { "type": "string" } } })),
        );

        let scope = resolver.root_scope(&root);
        let (_, port, name) = resolver.resolve(scope, "#/definitions/port").unwrap();
        assert_eq!(port["type"], "integer");
        assert_eq!(name, "https://s/main.json#/definitions/port");

        let (tls_scope, cert, _) = resolver.resolve(scope, "tls.json#/definitions/cert").unwrap();
        assert_eq!(cert["type"], "string");
        assert_eq!(tls_scope.url.unwrap().as_str(), "https://s/tls.json");
        assert!(resolver.resolve(scope, "missing.json#/x").is_none());
        assert!(resolver.resolve(scope, "#/definitions/nope").is_none());
    }

    #[test]
    fn test_external_refs() {
        let schema = json!({
            "items": [{ "$ref": "a.json" }, { "$ref": "#/local" }],
            "not": { "$ref": "https://other/b.json#/x" },
            "allOf": [{ "$ref": "a.json#/y" }]
        });
        let refs = external_refs(&schema, &Url::parse("https://s/main.json").unwrap());
        let refs: Vec<_> = refs.iter().map(Url::as_str).collect();
        assert_eq!(refs, ["https://s/a.json", "https://other/b.json"]);
    }
}
