//! Completions from the document's schema.

use serde_json::Value;
use taplo_cst::TextSize;
use taplo_cst::query::{self, Query};
use taplo_dom::{Dom, PathSegment};
use taplo_format::{escape_basic, format_key};
use taplo_schema::{
    PropertyCompletion, SchemaResolver, property_completions, schemas_at_path, value_completions,
};
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, MarkupContent, MarkupKind,
};

use crate::document::Document;
use crate::position::text_size;

/// Completion items at byte `offset`.
pub fn completions(
    document: &Document,
    offset: usize,
    schema: &Value,
    resolver: &SchemaResolver,
    max_keys: usize,
) -> Vec<CompletionItem> {
    let offset = text_size(offset);
    let query = query::query_at(&document.parse.syntax(), offset);
    let dom = &document.dom;

    match query.position {
        query::Position::Value => {
            let path = dom_path(dom, &query.path);
            let locations = schemas_at_path(resolver, schema, &path);
            value_completions(&locations)
                .into_iter()
                .filter_map(|completion| {
                    let label = toml_value(&completion.value)?;
                    Some(CompletionItem {
                        label,
                        kind: Some(CompletionItemKind::VALUE),
                        documentation: completion.description.map(markdown),
                        ..Default::default()
                    })
                })
                .collect()
        }
        query::Position::Key | query::Position::Header => {
            let path = key_table_path(dom, &query, offset);
            let typed = query.key_through(offset).last().cloned();
            key_completions(dom, &path, typed.as_deref(), schema, resolver)
                .into_iter()
                .map(|property| key_item(property, None))
                .collect()
        }
        query::Position::Other => {
            let path = dom_path(dom, &query.path);
            key_completions(dom, &path, None, schema, resolver)
                .into_iter()
                .map(|property| {
                    let mut child = path.clone();
                    child.push(PathSegment::Key(property.key.clone()));
                    let value = new_value(&property, &child, schema, resolver, max_keys);
                    key_item(property, Some(value))
                })
                .collect()
        }
    }
}

/// The table a key at `offset` is being added to, including the dotted
/// prefix typed so far.
pub(crate) fn key_table_path(dom: &Dom, query: &Query, offset: TextSize) -> Vec<PathSegment> {
    let mut path = dom_path(dom, &query.path);
    path.extend(query.key_prefix(offset).into_iter().map(PathSegment::Key));
    path
}

/// Turn a path from a syntax query into a document path. An array element
/// is taken to be the last one, which for arrays of tables is the table
/// under the closest header.
pub(crate) fn dom_path(dom: &Dom, path: &[query::PathSegment]) -> Vec<PathSegment> {
    let mut out = Vec::with_capacity(path.len());
    for segment in path {
        match segment {
            query::PathSegment::Key(key) => out.push(PathSegment::Key(key.clone())),
            query::PathSegment::Item => {
                let last = dom
                    .lookup(&out)
                    .and_then(|id| dom.array(id))
                    .map(|array| array.items.len().saturating_sub(1))
                    .unwrap_or(0);
                out.push(PathSegment::Index(last));
            }
        }
    }
    out
}

/// Properties of the table at `path` that are not there yet. `typed` is
/// the key being edited, which is offered even though it exists.
fn key_completions(
    dom: &Dom,
    path: &[PathSegment],
    typed: Option<&str>,
    schema: &Value,
    resolver: &SchemaResolver,
) -> Vec<PropertyCompletion> {
    let existing = dom.lookup(path).and_then(|id| dom.table(id));
    let locations = schemas_at_path(resolver, schema, path);
    property_completions(resolver, &locations)
        .into_iter()
        .filter(|property| {
            Some(property.key.as_str()) == typed
                || existing.is_none_or(|table| !table.entries.contains_key(&property.key))
        })
        .collect()
}

fn key_item(property: PropertyCompletion, value: Option<String>) -> CompletionItem {
    let key = format_key(&property.key).into_owned();
    let insert_text = match value {
        Some(value) => format!("{key} = {value}"),
        None => key,
    };
    CompletionItem {
        sort_text: Some(format!(
            "{}{}",
            if property.required { 0 } else { 1 },
            property.key
        )),
        detail: property.ty.clone(),
        documentation: property.description.map(markdown),
        kind: Some(CompletionItemKind::PROPERTY),
        insert_text: Some(insert_text),
        label: property.key,
        ..Default::default()
    }
}

/// The value inserted with a new key: its default, or an empty value of
/// its type. Tables get their required keys, at most `max_keys` of them.
fn new_value(
    property: &PropertyCompletion,
    path: &[PathSegment],
    schema: &Value,
    resolver: &SchemaResolver,
    max_keys: usize,
) -> String {
    if let Some(value) = property.default.as_ref().and_then(toml_value) {
        return value;
    }
    match property.ty.as_deref() {
        Some("object") => {
            let locations = schemas_at_path(resolver, schema, path);
            let required: Vec<String> = property_completions(resolver, &locations)
                .into_iter()
                .filter(|p| p.required)
                .take(max_keys)
                .map(|p| {
                    let value = p
                        .default
                        .as_ref()
                        .and_then(toml_value)
                        .unwrap_or_else(|| empty_value(p.ty.as_deref()).to_string());
                    format!("{} = {value}", format_key(&p.key))
                })
                .collect();
            if required.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", required.join(", "))
            }
        }
        ty => empty_value(ty).to_string(),
    }
}

fn empty_value(ty: Option<&str>) -> &'static str {
    match ty {
        Some("integer" | "number") => "0",
        Some("boolean") => "false",
        Some("array") => "[]",
        Some("object") => "{}",
        _ => "\"\"",
    }
}

/// A JSON value written as an inline TOML value. `null` has no TOML form.
fn toml_value(value: &Value) -> Option<String> {
    Some(match value {
        Value::Null => return None,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", escape_basic(s)),
        Value::Array(items) => {
            let items = items.iter().map(toml_value).collect::<Option<Vec<_>>>()?;
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let entries = map
                .iter()
                .map(|(key, value)| Some(format!("{} = {}", format_key(key), toml_value(value)?)))
                .collect::<Option<Vec<_>>>()?;
            format!("{{ {} }}", entries.join(", "))
        }
    })
}

fn markdown(value: String) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}
