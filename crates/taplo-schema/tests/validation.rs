//! Validation tests for taplo-schema.

use std::sync::Arc;

use serde_json::{Value, json};
use taplo_schema::{SchemaResolver, ValidationError, ValidationErrorKind, validate};
use url::Url;

/// Helper to parse a document and validate it.
fn check(source: &str, schema: &Value) -> Vec<ValidationError> {
    check_with(source, schema, &SchemaResolver::new())
}

fn check_with(source: &str, schema: &Value, resolver: &SchemaResolver) -> Vec<ValidationError> {
    let (parse, dom) = taplo_dom::parse(source);
    assert!(parse.is_ok(), "document should parse: {:?}", parse.errors());
    validate(&dom, schema, resolver)
}

fn kinds(errors: &[ValidationError]) -> Vec<&ValidationErrorKind> {
    errors.iter().map(|e| &e.kind).collect()
}

#[test]
fn test_integer_is_a_number() {
    let schema = json!({ "properties": { "n": { "type": "number" }, "i": { "type": "integer" } } });
    assert!(check("n = 1\ni = 2\n", &schema).is_empty());
    assert!(check("n = 1.5\n", &schema).is_empty());

    let errors = check("i = 1.5\n", &schema);
    assert_eq!(
        kinds(&errors),
        [&ValidationErrorKind::TypeMismatch {
            expected: vec!["integer".into()],
            found: "float".into(),
        }]
    );
}

#[test]
fn test_dates_are_strings() {
    let schema = json!({ "properties": { "at": { "type": "string", "pattern": "^1979" } } });
    assert!(check("at = 1979-05-27T07:32:00Z\n", &schema).is_empty());
    let errors = check("at = 2000-01-01\n", &schema);
    assert!(matches!(errors[0].kind, ValidationErrorKind::PatternMismatch { .. }));
}

#[test]
fn test_type_lists() {
    let schema = json!({ "properties": { "v": { "type": ["string", "boolean"] } } });
    assert!(check("v = true\n", &schema).is_empty());
    let errors = check("v = []\n", &schema);
    assert_eq!(errors[0].message, "expected one of string, boolean, found array");
}

#[test]
fn test_enum_and_const() {
    let schema = json!({
        "properties": {
            "edition": { "enum": ["2018", "2021", "2024"] },
            "version": { "const": 1 }
        }
    });
    assert!(check("edition = \"2021\"\nversion = 1\n", &schema).is_empty());

    let errors = check("edition = \"2020\"\nversion = 1.0\n", &schema);
    assert_eq!(kinds(&errors), [&ValidationErrorKind::NotInEnum]);
    assert_eq!(errors[0].message, r#"value must be one of "2018", "2021", "2024""#);

    let errors = check("version = 2\n", &schema);
    assert_eq!(kinds(&errors), [&ValidationErrorKind::ConstMismatch]);
}

#[test]
fn test_string_length() {
    let schema = json!({ "properties": { "s": { "minLength": 2, "maxLength": 3 } } });
    assert!(check("s = \"äöü\"\n", &schema).is_empty());
    assert_eq!(kinds(&check("s = \"a\"\n", &schema)), [&ValidationErrorKind::Length]);
    assert_eq!(kinds(&check("s = \"abcd\"\n", &schema)), [&ValidationErrorKind::Length]);
}

#[test]
fn test_numeric_bounds() {
    let schema = json!({
        "properties": {
            "a": { "minimum": 1, "maximum": 10 },
            "b": { "exclusiveMinimum": 0, "exclusiveMaximum": 1 },
            "c": { "minimum": 0, "exclusiveMinimum": true },
            "d": { "multipleOf": 5 },
            "e": { "multipleOf": 0.1 }
        }
    });
    assert!(check("a = 10\nb = 0.5\nc = 0.1\nd = 15\ne = 0.3\n", &schema).is_empty());

    let errors = check("a = 11\nb = 1\nc = 0\nd = 7\ne = 0.35\n", &schema);
    let messages: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        [
            "a: value must be at most 10",
            "b: value must be less than 1",
            "c: value must be greater than 0",
            "d: 7 is not a multiple of 5",
            "e: 0.35 is not a multiple of 0.1",
        ]
    );
}

#[test]
fn test_required_points_at_table_key() {
    let schema = json!({
        "properties": {
            "package": { "type": "object", "required": ["name", "version"] }
        }
    });
    let source = "[package]\nname = \"x\"\n";
    let errors = check(source, &schema);
    assert_eq!(
        kinds(&errors),
        [&ValidationErrorKind::MissingProperty { name: "version".into() }]
    );
    let range = errors[0].range.unwrap();
    assert_eq!(&source[range], "package");
}

#[test]
fn test_additional_properties() {
    let schema = json!({
        "properties": { "name": { "type": "string" } },
        "patternProperties": { "^x-": { "type": "integer" } },
        "additionalProperties": false
    });
    let source = "name = \"a\"\nx-count = 3\nextra = 1\nx-bad = \"no\"\n";
    let errors = check(source, &schema);
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0].kind,
        ValidationErrorKind::UnexpectedProperty { name: "extra".into() }
    );
    assert_eq!(&source[errors[0].range.unwrap()], "extra");
    assert!(matches!(errors[1].kind, ValidationErrorKind::TypeMismatch { .. }));
    assert_eq!(errors[1].path_string(), "x-bad");

    let typed = json!({ "additionalProperties": { "type": "boolean" } });
    assert_eq!(check("a = true\nb = 1\n", &typed)[0].path_string(), "b");
}

#[test]
fn test_property_names_and_counts() {
    let schema = json!({
        "propertyNames": { "pattern": "^[a-z]+$" },
        "minProperties": 1,
        "maxProperties": 2
    });
    assert!(check("a = 1\n", &schema).is_empty());
    let errors = check("a = 1\nB = 2\nc = 3\n", &schema);
    assert_eq!(
        kinds(&errors),
        [
            &ValidationErrorKind::PropertyCount,
            &ValidationErrorKind::InvalidPropertyName { name: "B".into() },
        ]
    );
    assert_eq!(kinds(&check("", &schema)), [&ValidationErrorKind::PropertyCount]);
}

#[test]
fn test_arrays() {
    let schema = json!({
        "properties": {
            "list": { "items": { "type": "integer" }, "minItems": 1, "uniqueItems": true },
            "pair": { "items": [{ "type": "string" }, { "type": "integer" }], "additionalItems": false },
            "tags": { "contains": { "const": "core" }, "maxItems": 3 }
        }
    });
    assert!(check("list = [1, 2]\npair = [\"a\", 1]\ntags = [\"core\"]\n", &schema).is_empty());

    let errors = check(
        "list = [1, \"two\", 1]\npair = [\"a\", 1, 2]\ntags = [\"a\", \"b\", \"c\", \"d\"]\n",
        &schema,
    );
    let found: Vec<_> = errors.iter().map(|e| (e.path_string(), &e.kind)).collect();
    assert_eq!(
        found,
        [
            (
                "list[1]".to_string(),
                &ValidationErrorKind::TypeMismatch {
                    expected: vec!["integer".into()],
                    found: "string".into(),
                }
            ),
            ("list[2]".to_string(), &ValidationErrorKind::DuplicateItem),
            ("pair[2]".to_string(), &ValidationErrorKind::UnexpectedItem),
            ("tags".to_string(), &ValidationErrorKind::ItemCount),
            ("tags".to_string(), &ValidationErrorKind::Contains),
        ]
    );
}

#[test]
fn test_array_of_tables() {
    let schema = json!({
        "properties": {
            "bin": {
                "type": "array",
                "items": { "type": "object", "required": ["name"] }
            }
        }
    });
    let errors = check("[[bin]]\nname = \"a\"\n\n[[bin]]\npath = \"b\"\n", &schema);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path_string(), "bin[1]");
}

#[test]
fn test_combinators() {
    let schema = json!({
        "properties": {
            "any": { "anyOf": [{ "type": "string" }, { "type": "integer" }] },
            "one": { "oneOf": [{ "type": "number" }, { "type": "integer" }] },
            "all": { "allOf": [{ "minimum": 1 }, { "maximum": 3 }] },
            "not": { "not": { "type": "string" } }
        }
    });
    assert!(check("any = 1\none = 1.5\nall = 2\nnot = 1\n", &schema).is_empty());

    let errors = check("any = true\none = 1\nall = 5\nnot = \"s\"\n", &schema);
    assert_eq!(
        kinds(&errors),
        [
            &ValidationErrorKind::AnyOf,
            &ValidationErrorKind::OneOf { matched: 2 },
            &ValidationErrorKind::Range,
            &ValidationErrorKind::Not,
        ]
    );
}

#[test]
fn test_if_then_else() {
    let schema = json!({
        "if": { "properties": { "kind": { "const": "tcp" } } },
        "then": { "required": ["port"] },
        "else": { "required": ["path"] }
    });
    assert!(check("kind = \"tcp\"\nport = 1\n", &schema).is_empty());
    assert!(check("kind = \"unix\"\npath = \"/s\"\n", &schema).is_empty());
    assert_eq!(
        kinds(&check("kind = \"unix\"\n", &schema)),
        [&ValidationErrorKind::MissingProperty { name: "path".into() }]
    );
}

#[test]
fn test_boolean_schemas() {
    let schema = json!({ "properties": { "any": true, "none": false } });
    assert!(check("any = 1\n", &schema).is_empty());
    assert_eq!(kinds(&check("none = 1\n", &schema)), [&ValidationErrorKind::Rejected]);
}

#[test]
fn test_local_refs_and_cycles() {
    let schema = json!({
        "$defs": {
            "node": {
                "type": "object",
                "properties": {
                    "value": { "type": "integer" },
                    "next": { "$ref": "#/$defs/node" }
                }
            },
            "loop": { "$ref": "#/$defs/loop" }
        },
        "properties": {
            "list": { "$ref": "#/$defs/node" },
            "weird": { "$ref": "#/$defs/loop" }
        }
    });
    let source = "[list]\nvalue = 1\n[list.next]\nvalue = 2\n[list.next.next]\nvalue = \"three\"\n";
    let errors = check(source, &schema);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path_string(), "list.next.next.value");

    assert!(check("weird = 1\n", &schema).is_empty());
}

#[test]
fn test_external_refs() {
    let schema = json!({ "properties": { "server": { "$ref": "defs.json#/definitions/server" } } });
    let mut resolver = SchemaResolver::with_base(Url::parse("https://example.com/main.json").unwrap());
    resolver.insert(
        Url::parse("https://example.com/defs.json").unwrap(),
        Arc::new(json!({
            "definitions": {
                "port": { "type": "integer" },
                "server": { "properties": { "port": { "$ref": "#/definitions/port" } } }
            }
        })),
    );
    let errors = check_with("[server]\nport = \"80\"\n", &schema, &resolver);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path_string(), "server.port");

    // Without the referenced schema the reference is ignored.
    assert!(check("[server]\nport = \"80\"\n", &schema).is_empty());
}

#[test]
fn test_invalid_pattern_is_reported() {
    let schema = json!({ "properties": { "s": { "pattern": "(" } } });
    assert_eq!(kinds(&check("s = \"x\"\n", &schema)), [&ValidationErrorKind::InvalidSchema]);
}

#[test]
fn test_builtin_config_schema() {
    let url = Url::parse(taplo_schema::TAPLO_CONFIG_SCHEMA_URL).unwrap();
    let schema = taplo_schema::builtin_schema(&url).unwrap();
    let resolver = SchemaResolver::with_base(url);

    let good = "include = [\"**/*.toml\"]\n\n[formatting]\nalign_entries = true\n\n[[rule]]\nkeys = [\"dependencies\"]\nformatting = { reorder_keys = true }\n";
    assert!(check_with(good, &schema, &resolver).is_empty());

    let bad = "[formatting]\ncolumn_width = \"wide\"\nindent = 2\n";
    let errors = check_with(bad, &schema, &resolver);
    let paths: Vec<_> = errors.iter().map(ValidationError::path_string).collect();
    assert_eq!(paths, ["formatting.column_width", "formatting.indent"]);
}
