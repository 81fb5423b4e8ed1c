//! Schema lookups for completions and hovers.

use regex::Regex;
use serde_json::Value;
use taplo_dom::PathSegment;

use crate::resolver::{SchemaResolver, Scope};

/// References deeper than this are not followed.
const MAX_DEPTH: usize = 32;

/// A sub-schema, together with the document its references resolve in.
#[derive(Debug, Clone, Copy)]
pub struct SchemaLocation<'a> {
    pub schema: &'a Value,
    scope: Scope<'a>,
}

impl<'a> SchemaLocation<'a> {
    pub fn title(&self) -> Option<&'a str> {
        self.schema.get("title")?.as_str()
    }

    /// `markdownDescription` if present, else `description`.
    pub fn description(&self) -> Option<&'a str> {
        self.schema
            .get("markdownDescription")
            .or_else(|| self.schema.get("description"))?
            .as_str()
    }

    pub fn default_value(&self) -> Option<&'a Value> {
        self.schema.get("default")
    }

    /// The types the schema allows, if it says.
    pub fn types(&self) -> Vec<&'a str> {
        match self.schema.get("type") {
            Some(Value::String(ty)) => vec![ty.as_str()],
            Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// A key that may be added to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCompletion {
    pub key: String,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub required: bool,
    /// The first type the property's schema allows.
    pub ty: Option<String>,
}

/// A value that may be assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCompletion {
    pub value: Value,
    pub description: Option<String>,
}

/// The sub-schemas that apply at `path` below the root `schema`.
///
/// Follows `properties`, `patternProperties`, `additionalProperties` and
/// `items`, and looks through `$ref` and the combinators. The result is
/// already expanded the same way.
pub fn schemas_at_path<'a>(resolver: &'a SchemaResolver, schema: &'a Value, path: &[PathSegment]) -> Vec<SchemaLocation<'a>> {
    let mut current = expand_all(
        resolver,
        &[SchemaLocation {
            schema,
            scope: resolver.root_scope(schema),
        }],
    );
    for segment in path {
        let next: Vec<_> = current
            .iter()
            .flat_map(|location| step(location, segment))
            .collect();
        current = expand_all(resolver, &next);
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Keys offered by `locations`, each once.
pub fn property_completions(resolver: &SchemaResolver, locations: &[SchemaLocation<'_>]) -> Vec<PropertyCompletion> {
    let mut completions: Vec<PropertyCompletion> = Vec::new();
    for location in locations {
        let Some(properties) = location.schema.get("properties").and_then(Value::as_object) else {
            continue;
        };
        let required: Vec<&str> = location
            .schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (key, schema) in properties {
            if completions.iter().any(|c| c.key == *key) {
                continue;
            }
            let property = expand_all(
                resolver,
                &[SchemaLocation {
                    schema,
                    scope: location.scope,
                }],
            );
            completions.push(PropertyCompletion {
                key: key.clone(),
                description: property
                    .iter()
                    .find_map(SchemaLocation::description)
                    .map(str::to_string),
                default: property
                    .iter()
                    .find_map(SchemaLocation::default_value)
                    .cloned(),
                required: required.contains(&key.as_str()),
                ty: property
                    .iter()
                    .find_map(|l| l.types().first().copied())
                    .map(str::to_string),
            });
        }
    }
    completions
}

/// Values suggested by `enum`, `const`, `default` and boolean types.
pub fn value_completions(locations: &[SchemaLocation<'_>]) -> Vec<ValueCompletion> {
    let mut completions: Vec<ValueCompletion> = Vec::new();
    let mut push = |value: &Value, description: Option<&str>| {
        if !completions.iter().any(|c| c.value == *value) {
            completions.push(ValueCompletion {
                value: value.clone(),
                description: description.map(str::to_string),
            });
        }
    };

    for location in locations {
        let description = location.description();
        if let Some(Value::Array(values)) = location.schema.get("enum") {
            for value in values {
                push(value, description);
            }
        }
        if let Some(value) = location.schema.get("const") {
            push(value, description);
        }
        if let Some(value) = location.default_value() {
            push(value, description);
        }
        if location.types().contains(&"boolean") {
            push(&Value::Bool(true), description);
            push(&Value::Bool(false), description);
        }
    }
    completions
}

fn step<'a>(location: &SchemaLocation<'a>, segment: &PathSegment) -> Vec<SchemaLocation<'a>> {
    let at = |schema: &'a Value| SchemaLocation {
        schema,
        scope: location.scope,
    };
    let schema = location.schema;

    match segment {
        PathSegment::Key(key) => {
            if let Some(property) = schema.get("properties").and_then(|p| p.get(key)) {
                return vec![at(property)];
            }
            let matching: Vec<_> = schema
                .get("patternProperties")
                .and_then(Value::as_object)
                .into_iter()
                .flatten()
                .filter(|(pattern, _)| Regex::new(pattern).is_ok_and(|r| r.is_match(key)))
                .map(|(_, sub)| at(sub))
                .collect();
            if !matching.is_empty() {
                return matching;
            }
            match schema.get("additionalProperties") {
                Some(sub @ Value::Object(_)) => vec![at(sub)],
                _ => Vec::new(),
            }
        }
        PathSegment::Index(index) => match schema.get("items") {
            Some(Value::Array(tuple)) => match tuple.get(*index) {
                Some(sub) => vec![at(sub)],
                None => schema
                    .get("additionalItems")
                    .filter(|s| s.is_object())
                    .map(at)
                    .into_iter()
                    .collect(),
            },
            Some(sub @ Value::Object(_)) => vec![at(sub)],
            _ => Vec::new(),
        },
    }
}

fn expand_all<'a>(resolver: &'a SchemaResolver, locations: &[SchemaLocation<'a>]) -> Vec<SchemaLocation<'a>> {
    let mut out = Vec::new();
    for location in locations {
        expand(resolver, *location, 0, &mut out);
    }
    out
}

/// Collect `location` and everything it refers to or combines.
fn expand<'a>(resolver: &'a SchemaResolver, location: SchemaLocation<'a>, depth: usize, out: &mut Vec<SchemaLocation<'a>>) {
    if depth > MAX_DEPTH || !location.schema.is_object() {
        return;
    }
    if out.iter().any(|l| std::ptr::eq(l.schema, location.schema)) {
        return;
    }
    out.push(location);

    if let Some(Value::String(reference)) = location.schema.get("$ref")
        && let Some((scope, schema, _)) = resolver.resolve(location.scope, reference)
    {
        expand(resolver, SchemaLocation { schema, scope }, depth + 1, out);
    }
    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(Value::Array(subs)) = location.schema.get(keyword) {
            for schema in subs {
                expand(
                    resolver,
                    SchemaLocation {
                        schema,
                        scope: location.scope,
                    },
                    depth + 1,
                    out,
                );
            }
        }
    }
    for keyword in ["then", "else"] {
        if let Some(schema) = location.schema.get(keyword) {
            expand(
                resolver,
                SchemaLocation {
                    schema,
                    scope: location.scope,
                },
                depth + 1,
                out,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "definitions": {
                "server": {
                    "type": "object",
                    "required": ["host"],
                    "properties": {
                        "host": { "type": "string", "description": "Host name." },
                        "tls": { "type": "boolean", "default": false },
                        "mode": { "enum": ["fast", "safe"] }
                    }
                }
            },
            "properties": {
                "servers": {
                    "type": "array",
                    "items": { "$ref": "#/definitions/server" }
                },
                "env": {
                    "additionalProperties": { "type": "string", "description": "A variable." }
                },
                "log": {
                    "anyOf": [
                        { "properties": { "level": { "const": "debug" } } },
                        { "properties": { "file": { "type": "string" } } }
                    ]
                }
            }
        })
    }

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn test_path_through_ref_and_items() {
        let schema = schema();
        let resolver = SchemaResolver::new();
        let locations = schemas_at_path(&resolver, &schema, &[key("servers"), PathSegment::Index(0)]);
        let properties = property_completions(&resolver, &locations);
        let keys: Vec<_> = properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["host", "tls", "mode"]);
        assert!(properties[0].required);
        assert_eq!(properties[0].description.as_deref(), Some("Host name."));
        assert_eq!(properties[1].default, Some(json!(false)));
        assert_eq!(properties[1].ty.as_deref(), Some("boolean"));
    }

    #[test]
    fn test_additional_properties_and_combinators() {
        let schema = schema();
        let resolver = SchemaResolver::new();

        let env = schemas_at_path(&resolver, &schema, &[key("env"), key("PATH")]);
        assert_eq!(env[0].description(), Some("A variable."));

        let log = schemas_at_path(&resolver, &schema, &[key("log")]);
        let keys: Vec<_> = property_completions(&resolver, &log)
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(keys, ["level", "file"]);

        assert!(schemas_at_path(&resolver, &schema, &[key("nope")]).is_empty());
    }

    #[test]
    fn test_value_completions() {
        let schema = schema();
        let resolver = SchemaResolver::new();
        let server = [key("servers"), PathSegment::Index(3)];

        let mut mode = server.to_vec();
        mode.push(key("mode"));
        let values: Vec<_> = value_completions(&schemas_at_path(&resolver, &schema, &mode))
            .into_iter()
            .map(|v| v.value)
            .collect();
        assert_eq!(values, [json!("fast"), json!("safe")]);

        let mut tls = server.to_vec();
        tls.push(key("tls"));
        let values: Vec<_> = value_completions(&schemas_at_path(&resolver, &schema, &tls))
            .into_iter()
            .map(|v| v.value)
            .collect();
        assert_eq!(values, [json!(false), json!(true)]);
    }
}
