//! The document model: an arena of tables, arrays and scalars.

use indexmap::IndexMap;
use taplo_cst::{TextRange, TextSize};

use crate::diagnostic::SemanticError;
use crate::scalar::Scalar;

/// Index of a node in a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a table came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// The document itself.
    Root,
    /// Created as a parent of a deeper header, e.g. `a` for `[a.b]`.
    /// It may still be defined by its own header once.
    Implicit,
    /// Defined by a `[header]`.
    Header,
    /// Created by a dotted key such as `a.b = 1`.
    Dotted,
    /// `{ ... }`, closed once written.
    Inline,
    /// One element of a `[[header]]` array.
    ArrayItem,
}

/// How an array came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// `[ ... ]`, closed once written.
    Inline,
    /// Built from `[[header]]` sections.
    Tables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Source range of the key segment naming this entry.
    pub key_range: Option<TextRange>,
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub kind: TableKind,
    pub entries: IndexMap<String, Entry>,
}

impl Table {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.entries.get(key).map(|e| e.node)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub kind: ArrayKind,
    pub items: Vec<NodeId>,
}

impl Array {
    pub fn new(kind: ArrayKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Table(Table),
    Array(Array),
    Scalar(Scalar),
}

impl NodeKind {
    pub fn table(kind: TableKind) -> Self {
        NodeKind::Table(Table::new(kind))
    }

    pub fn array(kind: ArrayKind) -> Self {
        NodeKind::Array(Array::new(kind))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Where the node was defined. Absent for nodes built without a source.
    pub range: Option<TextRange>,
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn as_table(&self) -> Option<&Table> {
        match &self.kind {
            NodeKind::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match &self.kind {
            NodeKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Name of the node's type, used in messages.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Table(_) => "table",
            NodeKind::Array(_) => "array",
            NodeKind::Scalar(scalar) => scalar.type_name(),
        }
    }
}

/// One step of a path from the root to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A semantic TOML document.
///
/// Nodes live in an arena and refer to each other by [`NodeId`]. Nodes that
/// failed to attach during building (e.g. the body of a duplicate table)
/// stay in the arena but are unreachable from the root.
#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) errors: Vec<SemanticError>,
}

impl Dom {
    pub(crate) fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::table(TableKind::Root),
                range: None,
                parent: None,
            }],
            root: NodeId(0),
            errors: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn alloc(&mut self, kind: NodeKind, range: Option<TextRange>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            range,
            parent,
        });
        id
    }

    pub fn table(&self, id: NodeId) -> Option<&Table> {
        self.node(id).as_table()
    }

    pub fn array(&self, id: NodeId) -> Option<&Array> {
        self.node(id).as_array()
    }

    pub fn scalar(&self, id: NodeId) -> Option<&Scalar> {
        self.node(id).as_scalar()
    }

    /// Semantic errors found while building, in source order.
    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Follow `path` from the root.
    pub fn lookup(&self, path: &[PathSegment]) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path {
            current = match (segment, &self.node(current).kind) {
                (PathSegment::Key(key), NodeKind::Table(table)) => table.get(key)?,
                (PathSegment::Index(index), NodeKind::Array(array)) => *array.items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Follow a path of keys from the root, e.g. `["package", "name"]`.
    pub fn lookup_keys(&self, keys: &[&str]) -> Option<NodeId> {
        let path: Vec<_> = keys.iter().map(|k| PathSegment::Key(k.to_string())).collect();
        self.lookup(&path)
    }

    /// The path from the root to `id`.
    pub fn path_of(&self, id: NodeId) -> Vec<PathSegment> {
        let mut reversed = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            match &self.node(parent).kind {
                NodeKind::Table(table) => {
                    if let Some(key) = table
                        .entries
                        .iter()
                        .find_map(|(key, entry)| (entry.node == current).then_some(key))
                    {
                        reversed.push(PathSegment::Key(key.clone()));
                    }
                }
                NodeKind::Array(array) => {
                    if let Some(index) = array.items.iter().position(|item| *item == current) {
                        reversed.push(PathSegment::Index(index));
                    }
                }
                NodeKind::Scalar(_) => {}
            }
            current = parent;
        }
        reversed.reverse();
        reversed
    }

    /// The innermost reachable node whose source range contains `offset`.
    pub fn node_at_offset(&self, offset: TextSize) -> Option<NodeId> {
        let mut best: Option<(NodeId, TextRange)> = None;
        self.walk(|id, node| {
            if let Some(range) = node.range
                && range.contains_inclusive(offset)
                && best.is_none_or(|(_, b)| range.len() <= b.len())
            {
                best = Some((id, range));
            }
        });
        best.map(|(id, _)| id)
    }

    /// Visit every node reachable from the root, parents before children.
    pub fn walk(&self, mut visit: impl FnMut(NodeId, &Node)) {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            visit(id, node);
            match &node.kind {
                NodeKind::Table(table) => {
                    stack.extend(table.entries.values().rev().map(|e| e.node));
                }
                NodeKind::Array(array) => stack.extend(array.items.iter().rev()),
                NodeKind::Scalar(_) => {}
            }
        }
    }
}

/// Build a [`Dom`] directly, without a source document.
///
/// Used when converting from other formats.
#[derive(Debug)]
pub struct DomBuilder {
    dom: Dom,
}

impl Default for DomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DomBuilder {
    pub fn new() -> Self {
        Self { dom: Dom::empty() }
    }

    pub fn root(&self) -> NodeId {
        self.dom.root
    }

    /// Insert `kind` under `key` in `table`, replacing any previous entry.
    /// Returns `None` if `table` is not a table.
    pub fn insert(&mut self, table: NodeId, key: impl Into<String>, kind: NodeKind) -> Option<NodeId> {
        self.dom.table(table)?;
        let id = self.dom.alloc(kind, None, Some(table));
        if let NodeKind::Table(t) = &mut self.dom.node_mut(table).kind {
            t.entries.insert(
                key.into(),
                Entry {
                    key_range: None,
                    node: id,
                },
            );
        }
        Some(id)
    }

    /// Append `kind` to `array`. Returns `None` if `array` is not an array.
    pub fn push(&mut self, array: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.dom.array(array)?;
        let id = self.dom.alloc(kind, None, Some(array));
        if let NodeKind::Array(a) = &mut self.dom.node_mut(array).kind {
            a.items.push(id);
        }
        Some(id)
    }

    /// Change the kind of a table, e.g. to mark it as an array item.
    pub fn set_table_kind(&mut self, table: NodeId, kind: TableKind) {
        if let NodeKind::Table(t) = &mut self.dom.node_mut(table).kind {
            t.kind = kind;
        }
    }

    /// Change the kind of an array.
    pub fn set_array_kind(&mut self, array: NodeId, kind: ArrayKind) {
        if let NodeKind::Array(a) = &mut self.dom.node_mut(array).kind {
            a.kind = kind;
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn finish(self) -> Dom {
        self.dom
    }
}
