//! Hover text from the document's schema.

use serde_json::Value;
use taplo_cst::query;
use taplo_dom::PathSegment;
use taplo_schema::{SchemaResolver, schemas_at_path};
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind};

use crate::completion::key_table_path;
use crate::document::Document;
use crate::position::{text_size, to_lsp_range};

/// What the schema says about the key or value at byte `offset`.
pub fn hover(document: &Document, offset: usize, schema: &Value, resolver: &SchemaResolver) -> Option<Hover> {
    let offset = text_size(offset);
    let query = query::query_at(&document.parse.syntax(), offset);
    let dom = &document.dom;

    let (path, range) = match query.position {
        query::Position::Key | query::Position::Header => {
            let key = query.key.as_ref()?;
            let segment = key
                .segments()
                .into_iter()
                .find(|s| s.range.contains_inclusive(offset))?;
            let mut path = key_table_path(dom, &query, offset);
            path.push(PathSegment::Key(segment.value));
            (path, segment.range)
        }
        query::Position::Value => {
            let id = dom.node_at_offset(offset)?;
            (dom.path_of(id), dom.node(id).range?)
        }
        query::Position::Other => return None,
    };

    let locations = schemas_at_path(resolver, schema, &path);
    let title = locations.iter().find_map(|l| l.title());
    let description = locations.iter().find_map(|l| l.description());
    let default = locations.iter().find_map(|l| l.default_value());
    let mut types: Vec<&str> = Vec::new();
    for ty in locations.iter().flat_map(|l| l.types()) {
        if !types.contains(&ty) {
            types.push(ty);
        }
    }
    if title.is_none() && description.is_none() && types.is_empty() {
        return None;
    }

    let mut value = match title {
        Some(title) => format!("**{title}**"),
        None => format!("`{}`", display_path(&path)),
    };
    if let Some(description) = description {
        value.push_str("\n\n");
        value.push_str(description);
    }
    if !types.is_empty() {
        value.push_str("\n\n*Type*: `");
        value.push_str(&types.join(" | "));
        value.push('`');
    }
    if let Some(default) = default {
        value.push_str(&format!("\n\n*Default*: `{default}`"));
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(to_lsp_range(&document.text, range)),
    })
}

fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        if matches!(segment, PathSegment::Key(_)) && !out.is_empty() {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;
    use tower_lsp::lsp_types::Position;

    fn hover_at(source_with_cursor: &str) -> Option<Hover> {
        let schema = json!({
            "properties": {
                "server": {
                    "title": "Server",
                    "description": "Where to listen.",
                    "properties": {
                        "port": { "type": "integer", "default": 8080 },
                        "hosts": { "type": "array", "items": { "type": "string", "description": "A host." } }
                    }
                }
            }
        });
        let offset = source_with_cursor.find('|').unwrap();
        let source = source_with_cursor.replacen('|', "", 1);
        let document = Document::new(source, 1);
        hover(&document, offset, &schema, &SchemaResolver::new())
    }

    fn markdown(hover: &Hover) -> &str {
        match &hover.contents {
            HoverContents::Markup(markup) => &markup.value,
            _ => panic!("expected markup"),
        }
    }

    #[test]
    fn test_header_key() {
        let hover = hover_at("[ser|ver]\nport = 1\n").unwrap();
        assert_eq!(markdown(&hover), "**Server**\n\nWhere to listen.");
        let range = hover.range.unwrap();
        assert_eq!((range.start, range.end), (Position::new(0, 1), Position::new(0, 7)));
    }

    #[test]
    fn test_entry_key() {
        let hover = hover_at("[server]\npo|rt = 1\n").unwrap();
        assert_eq!(
            markdown(&hover),
            "`server.port`\n\n*Type*: `integer`\n\n*Default*: `8080`"
        );
    }

    #[test]
    fn test_array_item() {
        let hover = hover_at("server.hosts = [\"a\", \"|b\"]\n").unwrap();
        assert!(markdown(&hover).contains("A host."));
        assert_eq!(hover.range.unwrap().start, Position::new(0, 21));
    }

    #[test]
    fn test_nothing_known() {
        assert!(hover_at("other = |1\n").is_none());
        assert!(hover_at("[server]\n|\n").is_none());
    }
}
