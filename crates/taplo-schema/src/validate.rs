//! Validation of documents against JSON schemas.
//!
//! TOML integers satisfy both `integer` and `number`, and date-times are
//! strings. Every violated keyword produces its own error.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use regex::Regex;
use serde_json::{Map, Number, Value};
use taplo_cst::TextRange;
use taplo_dom::{Dom, Entry, NodeId, NodeKind, PathSegment, Scalar, Table};
use tracing::debug;

use crate::resolver::{SchemaResolver, Scope};

/// Get ariadne config, respecting NO_COLOR env var.
fn ariadne_config() -> Config {
    if std::env::var("NO_COLOR").is_ok() {
        Config::default().with_color(false)
    } else {
        Config::default()
    }
}

/// A value that does not conform to its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Path to the offending value.
    pub path: Vec<PathSegment>,
    /// The key for missing and unexpected properties, the value otherwise.
    pub range: Option<TextRange>,
    pub message: String,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    TypeMismatch { expected: Vec<String>, found: String },
    NotInEnum,
    ConstMismatch,
    PatternMismatch { pattern: String },
    Length,
    Range,
    MultipleOf,
    MissingProperty { name: String },
    UnexpectedProperty { name: String },
    InvalidPropertyName { name: String },
    PropertyCount,
    ItemCount,
    UnexpectedItem,
    DuplicateItem,
    Contains,
    Not,
    AnyOf,
    OneOf { matched: usize },
    /// The `false` schema, which accepts nothing.
    Rejected,
    /// The schema itself is broken, e.g. an invalid regular expression.
    InvalidSchema,
}

impl ValidationError {
    /// The path in dotted form, e.g. `servers.alpha.ports[1]`.
    pub fn path_string(&self) -> String {
        display_path(&self.path)
    }

    /// Render this error with ariadne.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| self.to_string())
    }

    /// Write the error report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let range: std::ops::Range<usize> = self
            .range
            .map(|r| r.start().into()..r.end().into())
            .unwrap_or(0..0);
        let title = if self.path.is_empty() {
            "schema validation failed".to_string()
        } else {
            format!("schema validation failed at '{}'", self.path_string())
        };
        let _ = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_message(title)
            .with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            )
            .with_config(ariadne_config())
            .finish()
            .write((filename, Source::from(source)), writer);
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path_string(), self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

pub(crate) fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        if let PathSegment::Key(_) = segment
            && !out.is_empty()
        {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

/// Validate `dom` against `schema`. References are resolved with
/// `resolver`.
pub fn validate<'a>(dom: &'a Dom, schema: &'a Value, resolver: &'a SchemaResolver) -> Vec<ValidationError> {
    let mut validator = Validator {
        dom,
        resolver,
        visiting: HashSet::new(),
        patterns: HashMap::new(),
    };
    let mut errors = Vec::new();
    validator.validate(
        Instance::Node(dom.root()),
        schema,
        resolver.root_scope(schema),
        &mut errors,
    );
    errors
}

/// What is being validated: a node, or a table key for `propertyNames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Instance<'a> {
    Node(NodeId),
    Key {
        table: NodeId,
        name: &'a str,
        range: Option<TextRange>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn cmp_json(self, other: &Number) -> Option<Ordering> {
        match (self, other.as_i64()) {
            (Num::Int(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()?),
        }
    }
}

impl std::fmt::Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Num::Int(i) => write!(f, "{i}"),
            Num::Float(x) => write!(f, "{x}"),
        }
    }
}

struct Validator<'a> {
    dom: &'a Dom,
    resolver: &'a SchemaResolver,
    /// References being followed for an instance, to cut cycles.
    visiting: HashSet<(String, Instance<'a>)>,
    patterns: HashMap<&'a str, Option<Regex>>,
}

impl<'a> Validator<'a> {
    fn validate(&mut self, instance: Instance<'a>, schema: &'a Value, scope: Scope<'a>, errors: &mut Vec<ValidationError>) {
        let schema = match schema {
            Value::Object(map) => map,
            Value::Bool(false) => {
                errors.push(self.error(instance, ValidationErrorKind::Rejected, "no value is allowed here"));
                return;
            }
            _ => return,
        };

        let dom = self.dom;
        if let Some(Value::String(reference)) = schema.get("$ref") {
            self.validate_ref(instance, reference, scope, errors);
        }

        if !self.check_type(instance, schema, errors) {
            return;
        }
        self.check_enum_const(instance, schema, errors);
        self.check_combinators(instance, schema, scope, errors);

        match instance {
            Instance::Key { name, .. } => self.check_string(instance, name, schema, errors),
            Instance::Node(id) => match &dom.node(id).kind {
                NodeKind::Table(table) => self.check_table(id, table, schema, scope, errors),
                NodeKind::Array(array) => self.check_array(id, &array.items, schema, scope, errors),
                NodeKind::Scalar(Scalar::Integer(i)) => self.check_number(instance, Num::Int(*i), schema, errors),
                NodeKind::Scalar(Scalar::Float(f)) => self.check_number(instance, Num::Float(*f), schema, errors),
                NodeKind::Scalar(Scalar::Bool(_)) => {}
                NodeKind::Scalar(
                    Scalar::String(s)
                    | Scalar::OffsetDateTime(s)
                    | Scalar::LocalDateTime(s)
                    | Scalar::LocalDate(s)
                    | Scalar::LocalTime(s),
                ) => self.check_string(instance, s, schema, errors),
            },
        }
    }

    /// Whether the errors of `schema` for `instance` are empty.
    fn is_valid(&mut self, instance: Instance<'a>, schema: &'a Value, scope: Scope<'a>) -> bool {
        let mut errors = Vec::new();
        self.validate(instance, schema, scope, &mut errors);
        errors.is_empty()
    }

    fn validate_ref(&mut self, instance: Instance<'a>, reference: &str, scope: Scope<'a>, errors: &mut Vec<ValidationError>) {
        let Some((target_scope, target, name)) = self.resolver.resolve(scope, reference) else {
            debug!(reference, "unresolved schema reference");
            return;
        };
        let key = (name, instance);
        if !self.visiting.insert(key.clone()) {
            return;
        }
        self.validate(instance, target, target_scope, errors);
        self.visiting.remove(&key);
    }

    fn check_type(&self, instance: Instance<'a>, schema: &Map<String, Value>, errors: &mut Vec<ValidationError>) -> bool {
        let expected: Vec<&str> = match schema.get("type") {
            Some(Value::String(ty)) => vec![ty.as_str()],
            Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
            _ => return true,
        };
        if expected.is_empty() || expected.iter().any(|ty| self.has_type(instance, ty)) {
            return true;
        }
        let found = self.type_name(instance);
        let message = match expected.as_slice() {
            [one] => format!("expected {one}, found {found}"),
            many => format!("expected one of {}, found {found}", many.join(", ")),
        };
        errors.push(self.error(
            instance,
            ValidationErrorKind::TypeMismatch {
                expected: expected.iter().map(|s| s.to_string()).collect(),
                found: found.to_string(),
            },
            message,
        ));
        false
    }

    fn has_type(&self, instance: Instance<'a>, ty: &str) -> bool {
        let Instance::Node(id) = instance else {
            return ty == "string";
        };
        match (ty, &self.dom.node(id).kind) {
            ("object", NodeKind::Table(_)) | ("array", NodeKind::Array(_)) => true,
            ("integer", NodeKind::Scalar(Scalar::Integer(_))) => true,
            ("number", NodeKind::Scalar(Scalar::Integer(_) | Scalar::Float(_))) => true,
            ("boolean", NodeKind::Scalar(Scalar::Bool(_))) => true,
            ("string", NodeKind::Scalar(scalar)) => {
                !matches!(scalar, Scalar::Integer(_) | Scalar::Float(_) | Scalar::Bool(_))
            }
            _ => false,
        }
    }

    fn type_name(&self, instance: Instance<'a>) -> &'static str {
        match instance {
            Instance::Node(id) => self.dom.node(id).type_name(),
            Instance::Key { .. } => "key",
        }
    }

    fn check_enum_const(&self, instance: Instance<'a>, schema: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
        let allowed = schema.get("enum").and_then(Value::as_array);
        let constant = schema.get("const");
        if allowed.is_none() && constant.is_none() {
            return;
        }
        let value = self.to_json(instance);

        if let Some(allowed) = allowed
            && !allowed.iter().any(|a| json_eq(a, &value))
        {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            errors.push(self.error(
                instance,
                ValidationErrorKind::NotInEnum,
                format!("value must be one of {}", options.join(", ")),
            ));
        }
        if let Some(constant) = constant
            && !json_eq(constant, &value)
        {
            errors.push(self.error(
                instance,
                ValidationErrorKind::ConstMismatch,
                format!("value must be {constant}"),
            ));
        }
    }

    fn check_combinators(
        &mut self,
        instance: Instance<'a>,
        schema: &'a Map<String, Value>,
        scope: Scope<'a>,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(Value::Array(all)) = schema.get("allOf") {
            for sub in all {
                self.validate(instance, sub, scope, errors);
            }
        }

        if let Some(Value::Array(any)) = schema.get("anyOf")
            && !any.iter().any(|sub| self.is_valid(instance, sub, scope))
        {
            errors.push(self.error(
                instance,
                ValidationErrorKind::AnyOf,
                "value does not match any of the allowed schemas",
            ));
        }

        if let Some(Value::Array(one)) = schema.get("oneOf") {
            let matched = one.iter().filter(|&sub| self.is_valid(instance, sub, scope)).count();
            if matched != 1 {
                let message = if matched == 0 {
                    "value does not match any of the allowed schemas".to_string()
                } else {
                    format!("value matches {matched} schemas, but only one is allowed")
                };
                errors.push(self.error(instance, ValidationErrorKind::OneOf { matched }, message));
            }
        }

        if let Some(not) = schema.get("not")
            && self.is_valid(instance, not, scope)
        {
            errors.push(self.error(
                instance,
                ValidationErrorKind::Not,
                "value matches a schema it must not match",
            ));
        }

        if let Some(condition) = schema.get("if") {
            let branch = if self.is_valid(instance, condition, scope) {
                schema.get("then")
            } else {
                schema.get("else")
            };
            if let Some(branch) = branch {
                self.validate(instance, branch, scope, errors);
            }
        }
    }

    fn check_string(&mut self, instance: Instance<'a>, value: &str, schema: &'a Map<String, Value>, errors: &mut Vec<ValidationError>) {
        let length = value.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
            && length < min
        {
            errors.push(self.error(
                instance,
                ValidationErrorKind::Length,
                format!("string must be at least {min} characters long"),
            ));
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
            && length > max
        {
            errors.push(self.error(
                instance,
                ValidationErrorKind::Length,
                format!("string must be at most {max} characters long"),
            ));
        }
        if let Some(Value::String(pattern)) = schema.get("pattern") {
            match self.regex(pattern) {
                Some(regex) if !regex.is_match(value) => errors.push(self.error(
                    instance,
                    ValidationErrorKind::PatternMismatch {
                        pattern: pattern.clone(),
                    },
                    format!("'{value}' does not match the pattern '{pattern}'"),
                )),
                Some(_) => {}
                None => errors.push(self.invalid_pattern(instance, pattern)),
            }
        }
    }

    fn check_number(&self, instance: Instance<'a>, value: Num, schema: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
        let number = |key: &str| match schema.get(key) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        };
        // Older drafts spell exclusive bounds as booleans next to the bound.
        let exclusive = |key: &str| schema.get(key).and_then(Value::as_bool).unwrap_or(false);
        let mut range_error = |message: String| {
            errors.push(self.error(instance, ValidationErrorKind::Range, message));
        };

        if let Some(min) = number("minimum")
            && let Some(ordering) = value.cmp_json(min)
        {
            if exclusive("exclusiveMinimum") && ordering != Ordering::Greater {
                range_error(format!("value must be greater than {min}"));
            } else if ordering == Ordering::Less {
                range_error(format!("value must be at least {min}"));
            }
        }
        if let Some(max) = number("maximum")
            && let Some(ordering) = value.cmp_json(max)
        {
            if exclusive("exclusiveMaximum") && ordering != Ordering::Less {
                range_error(format!("value must be less than {max}"));
            } else if ordering == Ordering::Greater {
                range_error(format!("value must be at most {max}"));
            }
        }
        if let Some(min) = number("exclusiveMinimum")
            && value.cmp_json(min).is_some_and(|o| o != Ordering::Greater)
        {
            range_error(format!("value must be greater than {min}"));
        }
        if let Some(max) = number("exclusiveMaximum")
            && value.cmp_json(max).is_some_and(|o| o != Ordering::Less)
        {
            range_error(format!("value must be less than {max}"));
        }

        if let Some(divisor) = number("multipleOf") {
            if divisor.as_f64().is_none_or(|d| d <= 0.0) {
                errors.push(self.error(
                    instance,
                    ValidationErrorKind::InvalidSchema,
                    format!("the schema's multipleOf must be greater than zero, found {divisor}"),
                ));
                return;
            }
            let is_multiple = match (value, divisor.as_i64()) {
                (Num::Int(i), Some(d)) => i.checked_rem(d).is_none_or(|r| r == 0),
                _ => divisor.as_f64().is_some_and(|d| {
                    let quotient = value.as_f64() / d;
                    (quotient - quotient.round()).abs() < 1e-9
                }),
            };
            if !is_multiple {
                errors.push(self.error(
                    instance,
                    ValidationErrorKind::MultipleOf,
                    format!("{value} is not a multiple of {divisor}"),
                ));
            }
        }
    }

    fn check_table(
        &mut self,
        id: NodeId,
        table: &'a Table,
        schema: &'a Map<String, Value>,
        scope: Scope<'a>,
        errors: &mut Vec<ValidationError>,
    ) {
        let properties = schema.get("properties").and_then(Value::as_object);
        let pattern_properties = schema.get("patternProperties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties");

        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !table.entries.contains_key(name) {
                    errors.push(ValidationError {
                        path: self.dom.path_of(id),
                        range: self.key_range(id),
                        message: format!("missing required property '{name}'"),
                        kind: ValidationErrorKind::MissingProperty {
                            name: name.to_string(),
                        },
                    });
                }
            }
        }

        let count = table.entries.len() as u64;
        if let Some(min) = schema.get("minProperties").and_then(Value::as_u64)
            && count < min
        {
            errors.push(self.error(
                Instance::Node(id),
                ValidationErrorKind::PropertyCount,
                format!("table must have at least {min} entries"),
            ));
        }
        if let Some(max) = schema.get("maxProperties").and_then(Value::as_u64)
            && count > max
        {
            errors.push(self.error(
                Instance::Node(id),
                ValidationErrorKind::PropertyCount,
                format!("table must have at most {max} entries"),
            ));
        }

        for (key, entry) in &table.entries {
            let child = Instance::Node(entry.node);
            let mut matched = false;

            if let Some(sub) = properties.and_then(|p| p.get(key)) {
                matched = true;
                self.validate(child, sub, scope, errors);
            }
            for (pattern, sub) in pattern_properties.into_iter().flatten() {
                match self.regex(pattern) {
                    Some(regex) if regex.is_match(key) => {
                        matched = true;
                        self.validate(child, sub, scope, errors);
                    }
                    Some(_) => {}
                    None => errors.push(self.invalid_pattern(Instance::Node(id), pattern)),
                }
            }

            if !matched {
                match additional {
                    Some(Value::Bool(false)) => errors.push(self.entry_error(
                        id,
                        key,
                        entry,
                        ValidationErrorKind::UnexpectedProperty { name: key.clone() },
                        format!("unexpected property '{key}'"),
                    )),
                    Some(sub) => self.validate(child, sub, scope, errors),
                    None => {}
                }
            }

            if let Some(names) = schema.get("propertyNames") {
                let name = Instance::Key {
                    table: id,
                    name: key,
                    range: entry.key_range,
                };
                if !self.is_valid(name, names, scope) {
                    errors.push(self.entry_error(
                        id,
                        key,
                        entry,
                        ValidationErrorKind::InvalidPropertyName { name: key.clone() },
                        format!("'{key}' is not an allowed property name"),
                    ));
                }
            }
        }
    }

    fn check_array(
        &mut self,
        id: NodeId,
        items: &'a [NodeId],
        schema: &'a Map<String, Value>,
        scope: Scope<'a>,
        errors: &mut Vec<ValidationError>,
    ) {
        let array = Instance::Node(id);
        let len = items.len() as u64;
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64)
            && len < min
        {
            errors.push(self.error(
                array,
                ValidationErrorKind::ItemCount,
                format!("array must have at least {min} items"),
            ));
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64)
            && len > max
        {
            errors.push(self.error(
                array,
                ValidationErrorKind::ItemCount,
                format!("array must have at most {max} items"),
            ));
        }

        match schema.get("items") {
            Some(Value::Array(tuple)) => {
                for (item, sub) in items.iter().zip(tuple) {
                    self.validate(Instance::Node(*item), sub, scope, errors);
                }
                let rest = items.iter().skip(tuple.len());
                match schema.get("additionalItems") {
                    Some(Value::Bool(false)) => {
                        for item in rest {
                            errors.push(self.error(
                                Instance::Node(*item),
                                ValidationErrorKind::UnexpectedItem,
                                format!("array must have at most {} items", tuple.len()),
                            ));
                        }
                    }
                    Some(sub) => {
                        for item in rest {
                            self.validate(Instance::Node(*item), sub, scope, errors);
                        }
                    }
                    None => {}
                }
            }
            Some(sub) => {
                for item in items {
                    self.validate(Instance::Node(*item), sub, scope, errors);
                }
            }
            None => {}
        }

        if schema.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            let values: Vec<Value> = items.iter().map(|&item| self.to_json(Instance::Node(item))).collect();
            for (index, value) in values.iter().enumerate() {
                if let Some(first) = values[..index].iter().position(|v| json_eq(v, value)) {
                    errors.push(self.error(
                        Instance::Node(items[index]),
                        ValidationErrorKind::DuplicateItem,
                        format!("item {index} repeats item {first}, items must be unique"),
                    ));
                }
            }
        }

        if let Some(contains) = schema.get("contains")
            && !items
                .iter()
                .any(|&item| self.is_valid(Instance::Node(item), contains, scope))
        {
            errors.push(self.error(
                array,
                ValidationErrorKind::Contains,
                "array has no item matching the required schema",
            ));
        }
    }

    fn regex(&mut self, pattern: &'a str) -> Option<Regex> {
        self.patterns
            .entry(pattern)
            .or_insert_with(|| Regex::new(pattern).ok())
            .clone()
    }

    fn invalid_pattern(&self, instance: Instance<'a>, pattern: &str) -> ValidationError {
        self.error(
            instance,
            ValidationErrorKind::InvalidSchema,
            format!("the schema contains an invalid pattern '{pattern}'"),
        )
    }

    fn to_json(&self, instance: Instance<'a>) -> Value {
        match instance {
            Instance::Node(id) => taplo_convert::node_value(self.dom, id).unwrap_or(Value::Null),
            Instance::Key { name, .. } => Value::String(name.to_string()),
        }
    }

    /// The range of the key `id` is stored under, for errors about a
    /// table as a whole.
    fn key_range(&self, id: NodeId) -> Option<TextRange> {
        let node = self.dom.node(id);
        node.parent
            .and_then(|parent| self.dom.table(parent))
            .and_then(|parent| parent.entries.values().find(|e| e.node == id))
            .and_then(|entry| entry.key_range)
            .or(node.range)
    }

    fn error(&self, instance: Instance<'a>, kind: ValidationErrorKind, message: impl Into<String>) -> ValidationError {
        let (path, range) = match instance {
            Instance::Node(id) => (self.dom.path_of(id), self.dom.node(id).range),
            Instance::Key { table, name, range } => {
                let mut path = self.dom.path_of(table);
                path.push(PathSegment::Key(name.to_string()));
                (path, range)
            }
        };
        ValidationError {
            path,
            range,
            message: message.into(),
            kind,
        }
    }

    fn entry_error(&self, table: NodeId, key: &str, entry: &Entry, kind: ValidationErrorKind, message: String) -> ValidationError {
        let mut path = self.dom.path_of(table);
        path.push(PathSegment::Key(key.to_string()));
        ValidationError {
            path,
            range: entry.key_range.or(self.dom.node(entry.node).range),
            message,
            kind,
        }
    }
}

/// JSON equality where `1` equals `1.0`.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;

    fn check(source: &str, schema: Value) -> Vec<ValidationError> {
        let (parse, dom) = taplo_dom::parse(source);
        assert!(parse.is_ok() && dom.is_valid());
        validate(&dom, &schema, &SchemaResolver::new())
    }

    #[test]
    fn test_json_eq_numbers() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!([1, { "a": 2 }]), &json!([1.0, { "a": 2 }])));
        assert!(!json_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_display_path() {
        let path = vec![
            PathSegment::Key("servers".into()),
            PathSegment::Index(1),
            PathSegment::Key("port".into()),
        ];
        assert_eq!(display_path(&path), "servers[1].port");
    }

    #[test]
    fn test_multiple_of() {
        let schema = |divisor: Value| json!({ "properties": { "x": { "multipleOf": divisor } } });

        assert!(check("x = 12\n", schema(json!(4))).is_empty());
        let errors = check("x = -9223372036854775808\n", schema(json!(3)));
        assert!(matches!(errors[0].kind, ValidationErrorKind::MultipleOf));
        assert!(check("x = 0.75\n", schema(json!(0.25))).is_empty());

        for divisor in [json!(-1), json!(0), json!(-0.5)] {
            let errors = check("x = -9223372036854775808\n", schema(divisor));
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0].kind, ValidationErrorKind::InvalidSchema));
        }
    }

    #[test]
    fn test_errors_do_not_stop_validation() {
        let errors = check(
            "a = 1\nb = \"x\"\nc = true\n",
            json!({
                "properties": {
                    "a": { "type": "string" },
                    "b": { "type": "integer" },
                    "c": { "type": "boolean" }
                }
            }),
        );
        let paths: Vec<_> = errors.iter().map(ValidationError::path_string).collect();
        assert_eq!(paths, ["a", "b"]);
        assert_eq!(errors[0].message, "expected string, found integer");
    }

    #[test]
    fn test_render() {
        let source = "port = \"x\"\n";
        let errors = check(source, json!({ "properties": { "port": { "type": "integer" } } }));
        let rendered = errors[0].render("app.toml", source);
        let plain = String::from_utf8(strip_ansi_escapes::strip(rendered)).unwrap();
        assert!(plain.contains("schema validation failed at 'port'"));
        assert!(plain.contains("expected integer, found string"));
        assert!(plain.contains("app.toml"));
    }
}
