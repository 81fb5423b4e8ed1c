//! TOML to JSON.

use serde_json::{Map, Number, Value};
use taplo_dom::{Dom, NodeId, NodeKind, PathSegment, Scalar};

use crate::ConversionError;

/// Convert a document to pretty-printed JSON, keeping key order.
///
/// Date-times become RFC 3339 strings; [`crate::from_json`] recognizes
/// them again by their format.
pub fn to_json(dom: &Dom) -> Result<String, ConversionError> {
    let value = to_value(dom)?;
    // Serializing a `Value` cannot fail.
    Ok(serde_json::to_string_pretty(&value).unwrap_or_default())
}

/// Convert a document to a JSON value.
pub fn to_value(dom: &Dom) -> Result<Value, ConversionError> {
    node_value(dom, dom.root())
}

/// Convert the subtree rooted at `id` to a JSON value.
pub fn node_value(dom: &Dom, id: NodeId) -> Result<Value, ConversionError> {
    Ok(match &dom.node(id).kind {
        NodeKind::Table(table) => {
            let mut map = Map::with_capacity(table.entries.len());
            for (key, entry) in &table.entries {
                map.insert(key.clone(), node_value(dom, entry.node)?);
            }
            Value::Object(map)
        }
        NodeKind::Array(array) => Value::Array(
            array
                .items
                .iter()
                .map(|&item| node_value(dom, item))
                .collect::<Result<_, _>>()?,
        ),
        NodeKind::Scalar(scalar) => match scalar {
            Scalar::String(s)
            | Scalar::OffsetDateTime(s)
            | Scalar::LocalDateTime(s)
            | Scalar::LocalDate(s)
            | Scalar::LocalTime(s) => Value::String(s.clone()),
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Float(f) => match Number::from_f64(*f) {
                Some(number) => Value::Number(number),
                None => {
                    return Err(ConversionError::NonFiniteFloat {
                        path: display_path(&dom.path_of(id)),
                    });
                }
            },
            Scalar::Bool(b) => Value::Bool(*b),
        },
    })
}

pub(crate) fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        if matches!(segment, PathSegment::Key(_)) && !out.is_empty() {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}
