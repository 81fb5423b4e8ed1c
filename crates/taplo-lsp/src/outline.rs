//! Document symbols and folding ranges.

use taplo_cst::{SyntaxKind, TextRange, TextSize};
use taplo_dom::{Dom, NodeId, NodeKind, Scalar, Table};
use tower_lsp::lsp_types::{DocumentSymbol, FoldingRange, FoldingRangeKind, SymbolKind};

use crate::document::Document;
use crate::position::{offset_to_position, to_lsp_range};

/// Nested symbols for every key in the document.
pub fn document_symbols(document: &Document) -> Vec<DocumentSymbol> {
    let dom = &document.dom;
    dom.table(dom.root())
        .map(|table| table_symbols(document, table))
        .unwrap_or_default()
}

fn table_symbols(document: &Document, table: &Table) -> Vec<DocumentSymbol> {
    table
        .entries
        .iter()
        .filter_map(|(key, entry)| symbol(document, key.clone(), entry.key_range, entry.node))
        .collect()
}

fn symbol(document: &Document, name: String, key_range: Option<TextRange>, id: NodeId) -> Option<DocumentSymbol> {
    let dom = &document.dom;
    let node = dom.node(id);
    let selection = key_range.or(node.range)?;
    let range = extent(dom, id).map_or(selection, |extent| selection.cover(extent));

    let (kind, detail, children) = match &node.kind {
        NodeKind::Table(table) => (SymbolKind::OBJECT, None, table_symbols(document, table)),
        NodeKind::Array(array) => {
            // Only tables inside arrays get their own symbols.
            let children = array
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| dom.table(**item).is_some())
                .filter_map(|(index, item)| symbol(document, format!("[{index}]"), None, *item))
                .collect();
            (SymbolKind::ARRAY, None, children)
        }
        NodeKind::Scalar(scalar) => {
            let detail = node.range.map(|r| document.text[r].to_string());
            (scalar_kind(scalar), detail, Vec::new())
        }
    };

    #[allow(deprecated)]
    Some(DocumentSymbol {
        name,
        detail,
        kind,
        tags: None,
        deprecated: None,
        range: to_lsp_range(&document.text, range),
        selection_range: to_lsp_range(&document.text, selection),
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    })
}

fn scalar_kind(scalar: &Scalar) -> SymbolKind {
    match scalar {
        Scalar::String(_) => SymbolKind::STRING,
        Scalar::Integer(_) | Scalar::Float(_) => SymbolKind::NUMBER,
        Scalar::Bool(_) => SymbolKind::BOOLEAN,
        _ => SymbolKind::CONSTANT,
    }
}

/// The source covered by a node and everything below it.
fn extent(dom: &Dom, id: NodeId) -> Option<TextRange> {
    let node = dom.node(id);
    let mut range = node.range;
    let mut add = |other: Option<TextRange>| {
        if let Some(other) = other {
            range = Some(range.map_or(other, |r| r.cover(other)));
        }
    };
    match &node.kind {
        NodeKind::Table(table) => {
            for entry in table.entries.values() {
                add(entry.key_range);
                add(extent(dom, entry.node));
            }
        }
        NodeKind::Array(array) => {
            for item in &array.items {
                add(extent(dom, *item));
            }
        }
        NodeKind::Scalar(_) => {}
    }
    range
}

/// Table sections, multi-line arrays and inline tables, and blocks of
/// comments.
pub fn folding_ranges(document: &Document) -> Vec<FoldingRange> {
    let root = document.parse.syntax();
    let line = |offset: TextSize| offset_to_position(&document.text, offset.into()).line;
    let mut ranges = Vec::new();
    let mut push = |start: u32, end: u32, kind: Option<FoldingRangeKind>| {
        if end > start {
            ranges.push(FoldingRange {
                start_line: start,
                end_line: end,
                kind,
                ..Default::default()
            });
        }
    };

    let mut section: Option<(u32, u32)> = None;
    for child in root.children() {
        let range = child.text_range();
        match child.kind() {
            SyntaxKind::TABLE_HEADER | SyntaxKind::TABLE_ARRAY_HEADER => {
                if let Some((start, end)) = section.take() {
                    push(start, end, None);
                }
                let start = line(range.start());
                section = Some((start, start));
            }
            _ => {
                if let Some((_, end)) = &mut section {
                    *end = line(range.end());
                }
            }
        }
    }
    if let Some((start, end)) = section {
        push(start, end, None);
    }

    for node in root.descendants() {
        if matches!(node.kind(), SyntaxKind::ARRAY | SyntaxKind::INLINE_TABLE) {
            let range = node.text_range();
            push(line(range.start()), line(range.end()), None);
        }
    }

    let mut comments: Option<(u32, u32)> = None;
    for token in root
        .children_with_tokens()
        .filter_map(|element| element.into_token())
        .filter(|token| token.kind() == SyntaxKind::COMMENT)
    {
        let current = line(token.text_range().start());
        comments = match comments {
            Some((start, end)) if current == end + 1 => Some((start, current)),
            Some((start, end)) => {
                push(start, end, Some(FoldingRangeKind::Comment));
                Some((current, current))
            }
            None => Some((current, current)),
        };
    }
    if let Some((start, end)) = comments {
        push(start, end, Some(FoldingRangeKind::Comment));
    }

    ranges
}
