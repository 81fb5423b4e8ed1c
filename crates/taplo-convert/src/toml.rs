//! JSON to TOML.

use serde_json::{Map, Value};
use taplo_dom::{ArrayKind, DomBuilder, NodeId, NodeKind, PathSegment, Scalar, TableKind};
use taplo_format::{FormatterOptions, format_dom};
use tracing::{debug, warn};

use crate::ConversionError;
use crate::json::display_path;

/// What to do with JSON `null`, which has no TOML equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullPolicy {
    /// Leave the key or array element out and report a warning.
    #[default]
    Omit,
    /// Fail the conversion.
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub null: NullPolicy,
    pub formatter: FormatterOptions,
}

/// The result of a successful conversion to TOML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub toml: String,
    /// Lossy changes made along the way, such as omitted nulls.
    pub warnings: Vec<String>,
}

/// Convert a JSON document to formatted TOML.
///
/// Strings in RFC 3339 format become TOML date-times and arrays that only
/// contain objects become arrays of tables.
pub fn from_json(text: &str, options: &ConvertOptions) -> Result<Converted, ConversionError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ConversionError::InvalidJson(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(ConversionError::NotAnObject {
            found: json_type(&value),
        });
    };

    let mut converter = Converter {
        builder: DomBuilder::new(),
        null: options.null,
        path: Vec::new(),
        warnings: Vec::new(),
    };
    let root = converter.builder.root();
    converter.object(root, &object, false)?;

    let dom = converter.builder.finish();
    debug!(warnings = converter.warnings.len(), "converted JSON to TOML");
    Ok(Converted {
        toml: format_dom(&dom, options.formatter.clone()),
        warnings: converter.warnings,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

struct Converter {
    builder: DomBuilder,
    null: NullPolicy,
    path: Vec<PathSegment>,
    warnings: Vec<String>,
}

impl Converter {
    /// Returns `false` if the value was a null that should be skipped.
    fn check_null(&mut self, value: &Value) -> Result<bool, ConversionError> {
        if !value.is_null() {
            return Ok(true);
        }
        let path = display_path(&self.path);
        match self.null {
            NullPolicy::Error => Err(ConversionError::Null { path }),
            NullPolicy::Omit => {
                warn!(%path, "omitting null value");
                self.warnings.push(format!("omitted null value at `{path}`"));
                Ok(false)
            }
        }
    }

    /// Insert the members of `object` into `table`. Nested objects become
    /// inline tables when `inline` is set, standard tables otherwise.
    fn object(&mut self, table: NodeId, object: &Map<String, Value>, inline: bool) -> Result<(), ConversionError> {
        for (key, value) in object {
            self.path.push(PathSegment::Key(key.clone()));
            if self.check_null(value)? {
                let kind = self.kind(value, inline)?;
                if let Some(id) = self.builder.insert(table, key.as_str(), kind) {
                    self.fill(id, value, inline)?;
                }
            }
            self.path.pop();
        }
        Ok(())
    }

    fn kind(&self, value: &Value, inline: bool) -> Result<NodeKind, ConversionError> {
        Ok(match value {
            Value::Object(_) => NodeKind::table(if inline {
                TableKind::Inline
            } else {
                TableKind::Header
            }),
            Value::Array(items) => {
                let tables = !inline && !items.is_empty() && items.iter().all(Value::is_object);
                NodeKind::array(if tables {
                    ArrayKind::Tables
                } else {
                    ArrayKind::Inline
                })
            }
            Value::String(s) => NodeKind::Scalar(Scalar::date_time(s).unwrap_or_else(|| Scalar::String(s.clone()))),
            Value::Bool(b) => NodeKind::Scalar(Scalar::Bool(*b)),
            Value::Number(number) => {
                if let Some(i) = number.as_i64() {
                    NodeKind::Scalar(Scalar::Integer(i))
                } else if number.is_u64() {
                    return Err(ConversionError::IntegerOutOfRange {
                        path: display_path(&self.path),
                        value: number.to_string(),
                    });
                } else {
                    NodeKind::Scalar(Scalar::Float(number.as_f64().unwrap_or(f64::NAN)))
                }
            }
            // Nulls are filtered out before this.
            Value::Null => NodeKind::table(TableKind::Inline),
        })
    }

    /// Add the children of an array or object to the node `id`.
    fn fill(&mut self, id: NodeId, value: &Value, inline: bool) -> Result<(), ConversionError> {
        match value {
            Value::Object(object) => self.object(id, object, inline),
            Value::Array(items) => {
                let tables = self
                    .builder
                    .dom()
                    .array(id)
                    .is_some_and(|a| a.kind == ArrayKind::Tables);
                for (index, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(index));
                    if self.check_null(item)? {
                        let kind = self.kind(item, !tables)?;
                        if let Some(child) = self.builder.push(id, kind) {
                            if tables {
                                self.builder.set_table_kind(child, TableKind::ArrayItem);
                            }
                            self.fill(child, item, !tables)?;
                        }
                    }
                    self.path.pop();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
