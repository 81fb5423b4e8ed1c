//! Builds a [`Dom`] from the concrete syntax tree.

use taplo_cst::ast::{AstNode, Entry as EntryNode, Key, KeySegment, Root, RootItem, Value, ValueKind};
use taplo_cst::{SyntaxNode, TextRange, TextSize};
use tracing::{debug, trace};

use crate::diagnostic::SemanticError;
use crate::node::{ArrayKind, Dom, Entry, NodeId, NodeKind, TableKind};
use crate::scalar::parse_scalar;

/// Build the document model for a parsed document.
///
/// Syntax errors are not repeated here; parts of the tree that failed to
/// parse are skipped. Semantic errors are collected in [`Dom::errors`] and
/// the first definition of a key wins.
pub fn build(root: &SyntaxNode) -> Dom {
    let mut builder = DomBuilder {
        current: NodeId(0),
        dom: Dom::empty(),
    };
    if let Some(root) = Root::cast(root.clone()) {
        for item in root.items() {
            match item {
                RootItem::Entry(entry) => builder.entry(builder.current, &entry),
                RootItem::Table(header) => {
                    let range = header.range();
                    builder.current = match header.key() {
                        Some(key) => builder.table_header(&key, range),
                        None => builder.detached(),
                    };
                }
                RootItem::ArrayTable(header) => {
                    let range = header.range();
                    builder.current = match header.key() {
                        Some(key) => builder.array_header(&key, range),
                        None => builder.detached(),
                    };
                }
            }
        }
    }
    debug!(
        nodes = builder.dom.nodes.len(),
        errors = builder.dom.errors.len(),
        "built document model"
    );
    builder.dom
}

struct DomBuilder {
    dom: Dom,
    /// Table receiving root-level entries.
    current: NodeId,
}

fn joined(segments: &[KeySegment]) -> String {
    segments
        .iter()
        .map(|s| s.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

impl DomBuilder {
    /// A table that is not reachable from the root. Entries of a header that
    /// could not be attached go here so that they are still checked.
    fn detached(&mut self) -> NodeId {
        self.dom.alloc(NodeKind::table(TableKind::Header), None, None)
    }

    fn error(&mut self, error: SemanticError) {
        trace!(%error, "semantic error");
        self.dom.errors.push(error);
    }

    fn key_segments(&mut self, key: &Key) -> Vec<KeySegment> {
        let segments = key.segments();
        for segment in &segments {
            if let Some(error) = &segment.error {
                let start = segment.range.start() + TextSize::from(error.offset as u32);
                self.error(SemanticError::InvalidValue {
                    message: error.message.clone(),
                    range: TextRange::at(start, TextSize::from(error.len as u32)),
                });
            }
        }
        segments
    }

    fn insert(&mut self, table: NodeId, segment: &KeySegment, kind: NodeKind, range: Option<TextRange>) -> NodeId {
        let id = self.dom.alloc(kind, range, Some(table));
        if let NodeKind::Table(t) = &mut self.dom.node_mut(table).kind {
            t.entries.insert(
                segment.value.clone(),
                Entry {
                    key_range: Some(segment.range),
                    node: id,
                },
            );
        }
        id
    }

    fn first_range(&self, table: NodeId, key: &str) -> Option<TextRange> {
        let entry = self.dom.table(table)?.entries.get(key)?;
        entry.key_range.or(self.dom.node(entry.node).range)
    }

    /// Walk the parents of a header path, creating implicit tables. Array of
    /// tables are entered through their last element.
    fn header_parent(&mut self, segments: &[KeySegment]) -> Option<NodeId> {
        let mut current = self.dom.root;
        for (i, segment) in segments.iter().enumerate() {
            let existing = self.dom.table(current).and_then(|t| t.get(&segment.value));
            let Some(id) = existing else {
                current = self.insert(
                    current,
                    segment,
                    NodeKind::table(TableKind::Implicit),
                    Some(segment.range),
                );
                continue;
            };

            let key = joined(&segments[..=i]);
            let first = self.first_range(current, &segment.value);
            let error = match &self.dom.node(id).kind {
                NodeKind::Table(table) if table.kind != TableKind::Inline => {
                    current = id;
                    continue;
                }
                NodeKind::Array(array) if array.kind == ArrayKind::Tables => {
                    current = *array.items.last()?;
                    continue;
                }
                NodeKind::Table(_) | NodeKind::Array(_) => SemanticError::ConflictingTable {
                    key,
                    first,
                    range: segment.range,
                },
                NodeKind::Scalar(scalar) => SemanticError::ExpectedTable {
                    key,
                    found: scalar.type_name(),
                    first,
                    range: segment.range,
                },
            };
            self.error(error);
            return None;
        }
        Some(current)
    }

    /// `[a.b.c]`
    fn table_header(&mut self, key: &Key, range: TextRange) -> NodeId {
        let segments = self.key_segments(key);
        let Some((last, parents)) = segments.split_last() else {
            return self.detached();
        };
        let Some(parent) = self.header_parent(parents) else {
            return self.detached();
        };

        let Some(existing) = self.dom.table(parent).and_then(|t| t.get(&last.value)) else {
            return self.insert(parent, last, NodeKind::table(TableKind::Header), Some(range));
        };

        let first = self.first_range(parent, &last.value);
        let key = joined(&segments);
        let node = self.dom.node_mut(existing);
        let error = match &mut node.kind {
            NodeKind::Table(table) if table.kind == TableKind::Implicit => {
                table.kind = TableKind::Header;
                node.range = Some(range);
                return existing;
            }
            NodeKind::Table(_) | NodeKind::Array(_) => SemanticError::ConflictingTable {
                key,
                first: node.range.or(first),
                range: last.range,
            },
            NodeKind::Scalar(_) => SemanticError::DuplicateKey {
                key,
                first,
                range: last.range,
            },
        };
        self.error(error);
        self.detached()
    }

    /// `[[a.b.c]]`
    fn array_header(&mut self, key: &Key, range: TextRange) -> NodeId {
        let segments = self.key_segments(key);
        let Some((last, parents)) = segments.split_last() else {
            return self.detached();
        };
        let Some(parent) = self.header_parent(parents) else {
            return self.detached();
        };

        let array = match self.dom.table(parent).and_then(|t| t.get(&last.value)) {
            None => self.insert(parent, last, NodeKind::array(ArrayKind::Tables), Some(range)),
            Some(existing) => {
                let first = self.first_range(parent, &last.value);
                let key = joined(&segments);
                let error = match &self.dom.node(existing).kind {
                    NodeKind::Array(array) if array.kind == ArrayKind::Tables => None,
                    NodeKind::Scalar(_) => Some(SemanticError::DuplicateKey {
                        key,
                        first,
                        range: last.range,
                    }),
                    _ => Some(SemanticError::ConflictingTable {
                        key,
                        first,
                        range: last.range,
                    }),
                };
                if let Some(error) = error {
                    self.error(error);
                    return self.detached();
                }
                existing
            }
        };

        let item = self
            .dom
            .alloc(NodeKind::table(TableKind::ArrayItem), Some(range), Some(array));
        if let NodeKind::Array(a) = &mut self.dom.node_mut(array).kind {
            a.items.push(item);
        }
        item
    }

    /// `a.b.c = value` inside `table`.
    fn entry(&mut self, table: NodeId, entry: &EntryNode) {
        let Some(key) = entry.key() else {
            return;
        };
        let segments = self.key_segments(&key);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut target = table;
        for (i, segment) in parents.iter().enumerate() {
            let Some(id) = self.dom.table(target).and_then(|t| t.get(&segment.value)) else {
                target = self.insert(
                    target,
                    segment,
                    NodeKind::table(TableKind::Dotted),
                    Some(segment.range),
                );
                continue;
            };

            let key = joined(&segments[..=i]);
            let first = self.first_range(target, &segment.value);
            let error = match &self.dom.node(id).kind {
                NodeKind::Table(t) if t.kind == TableKind::Dotted => {
                    target = id;
                    continue;
                }
                NodeKind::Table(_) => SemanticError::ConflictingTable {
                    key,
                    first,
                    range: segment.range,
                },
                other => SemanticError::ExpectedTable {
                    key,
                    found: match other {
                        NodeKind::Scalar(scalar) => scalar.type_name(),
                        _ => "array",
                    },
                    first,
                    range: segment.range,
                },
            };
            self.error(error);
            return;
        }

        if self.dom.table(target).is_some_and(|t| t.entries.contains_key(&last.value)) {
            let first = self.first_range(target, &last.value);
            self.error(SemanticError::DuplicateKey {
                key: joined(&segments),
                first,
                range: last.range,
            });
            return;
        }

        let Some(value) = entry.value() else {
            return;
        };
        if let Some(kind) = self.value_kind(&value) {
            let id = self.insert(target, last, kind, Some(value.range()));
            self.fill(id, &value);
        }
    }

    /// The node kind for a value, or `None` if it is missing or invalid.
    fn value_kind(&mut self, value: &Value) -> Option<NodeKind> {
        match value.kind() {
            ValueKind::Scalar(token) => match parse_scalar(token.kind(), token.text()) {
                Ok(scalar) => Some(NodeKind::Scalar(scalar)),
                Err(error) => {
                    let start = token.text_range().start() + TextSize::from(error.offset as u32);
                    self.error(SemanticError::InvalidValue {
                        message: error.message,
                        range: TextRange::at(start, TextSize::from(error.len as u32)),
                    });
                    None
                }
            },
            ValueKind::Array(_) => Some(NodeKind::array(ArrayKind::Inline)),
            ValueKind::InlineTable(_) => Some(NodeKind::table(TableKind::Inline)),
            ValueKind::Missing => None,
        }
    }

    /// Add the children of an array or inline table to the node `id`.
    fn fill(&mut self, id: NodeId, value: &Value) {
        match value.kind() {
            ValueKind::Array(array) => {
                for item in array.values() {
                    let Some(kind) = self.value_kind(&item) else {
                        continue;
                    };
                    let child = self.dom.alloc(kind, Some(item.range()), Some(id));
                    if let NodeKind::Array(a) = &mut self.dom.node_mut(id).kind {
                        a.items.push(child);
                    }
                    self.fill(child, &item);
                }
            }
            ValueKind::InlineTable(table) => {
                for entry in table.entries() {
                    self.entry(id, &entry);
                }
            }
            ValueKind::Scalar(_) | ValueKind::Missing => {}
        }
    }
}
