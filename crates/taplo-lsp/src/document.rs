//! Open documents and their diagnostics.

use serde_json::Value;
use taplo_cst::Parse;
use taplo_dom::Dom;
use taplo_schema::{SchemaResolver, ValidationErrorKind, validate};
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, NumberOrString, Url,
};

use crate::position::to_lsp_range;

/// An open document. Replaced as a whole on every change.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub version: i32,
    pub parse: Parse,
    pub dom: Dom,
}

impl Document {
    pub fn new(text: String, version: i32) -> Self {
        let (parse, dom) = taplo_dom::parse(&text);
        Self {
            text,
            version,
            parse,
            dom,
        }
    }

    /// Syntax and semantic errors.
    pub fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for error in self.parse.errors() {
            diagnostics.push(Diagnostic {
                range: to_lsp_range(&self.text, error.range),
                severity: Some(DiagnosticSeverity::ERROR),
                source: Some("taplo".to_string()),
                message: error.message.clone(),
                ..Default::default()
            });
        }

        for error in self.dom.errors() {
            let related_information = error.first().map(|first| {
                vec![DiagnosticRelatedInformation {
                    location: Location {
                        uri: uri.clone(),
                        range: to_lsp_range(&self.text, first),
                    },
                    message: "first defined here".to_string(),
                }]
            });
            diagnostics.push(Diagnostic {
                range: to_lsp_range(&self.text, error.range()),
                severity: Some(DiagnosticSeverity::ERROR),
                source: Some("taplo".to_string()),
                message: error.to_string(),
                related_information,
                ..Default::default()
            });
        }

        diagnostics
    }

    /// Schema violations. Errors without a source range are reported at
    /// the start of the document.
    pub fn schema_diagnostics(&self, schema: &Value, resolver: &SchemaResolver) -> Vec<Diagnostic> {
        validate(&self.dom, schema, resolver)
            .into_iter()
            .map(|error| {
                let range = error
                    .range
                    .map(|r| to_lsp_range(&self.text, r))
                    .unwrap_or_default();
                Diagnostic {
                    range,
                    severity: Some(DiagnosticSeverity::ERROR),
                    code: Some(NumberOrString::String(kind_code(&error.kind).to_string())),
                    source: Some("taplo-schema".to_string()),
                    message: error.to_string(),
                    ..Default::default()
                }
            })
            .collect()
    }
}

fn kind_code(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::TypeMismatch { .. } => "type",
        ValidationErrorKind::NotInEnum => "enum",
        ValidationErrorKind::ConstMismatch => "const",
        ValidationErrorKind::PatternMismatch { .. } => "pattern",
        ValidationErrorKind::Length => "length",
        ValidationErrorKind::Range => "range",
        ValidationErrorKind::MultipleOf => "multipleOf",
        ValidationErrorKind::MissingProperty { .. } => "required",
        ValidationErrorKind::UnexpectedProperty { .. } => "additionalProperties",
        ValidationErrorKind::InvalidPropertyName { .. } => "propertyNames",
        ValidationErrorKind::PropertyCount => "properties",
        ValidationErrorKind::ItemCount => "items",
        ValidationErrorKind::UnexpectedItem => "additionalItems",
        ValidationErrorKind::DuplicateItem => "uniqueItems",
        ValidationErrorKind::Contains => "contains",
        ValidationErrorKind::Not => "not",
        ValidationErrorKind::AnyOf => "anyOf",
        ValidationErrorKind::OneOf { .. } => "oneOf",
        ValidationErrorKind::Rejected => "false",
        ValidationErrorKind::InvalidSchema => "schema",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;
    use tower_lsp::lsp_types::Position;

    fn uri() -> Url {
        Url::parse("file:///project/a.toml").unwrap()
    }

    #[test]
    fn test_duplicate_key_points_at_both_definitions() {
        let document = Document::new("a = 1\na = 2\n".to_string(), 1);
        let diagnostics = document.diagnostics(&uri());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range.start, Position::new(1, 0));
        let related = diagnostics[0].related_information.as_ref().unwrap();
        assert_eq!(related[0].location.range.start, Position::new(0, 0));
    }

    #[test]
    fn test_syntax_error() {
        let document = Document::new("a = \n".to_string(), 1);
        let diagnostics = document.diagnostics(&uri());
        assert!(!diagnostics.is_empty());
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
    }

    #[test]
    fn test_schema_diagnostics() {
        let document = Document::new("[server]\nport = \"x\"\n".to_string(), 1);
        let schema = json!({
            "properties": {
                "server": { "properties": { "port": { "type": "integer" } } }
            }
        });
        let diagnostics = document.schema_diagnostics(&schema, &SchemaResolver::new());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range.start, Position::new(1, 7));
        assert_eq!(diagnostics[0].code, Some(NumberOrString::String("type".into())));
        assert_eq!(diagnostics[0].message, "server.port: expected integer, found string");
    }
}
