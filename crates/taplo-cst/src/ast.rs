//! Typed AST wrappers over CST nodes.
//!
//! These provide a more ergonomic API for navigating the syntax tree
//! while still preserving access to the underlying CST for source locations.

use rowan::{TextRange, TextSize};

use crate::string::{StringError, decode_string};
use crate::syntax_kind::{SyntaxKind, SyntaxNode, SyntaxToken};

/// Trait for AST nodes that wrap CST nodes.
pub trait AstNode: Sized {
    /// Try to cast a syntax node to this AST type.
    fn cast(node: SyntaxNode) -> Option<Self>;

    /// Get the underlying syntax node.
    fn syntax(&self) -> &SyntaxNode;

    /// Get the source text of this node.
    fn text(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.syntax().to_string())
    }

    /// Source range of this node, including any trivia inside it.
    fn range(&self) -> TextRange {
        self.syntax().text_range()
    }
}

/// Macro for defining simple AST node wrappers.
macro_rules! ast_node {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl AstNode for $name {
            fn cast(node: SyntaxNode) -> Option<Self> {
                if node.kind() == $kind {
                    Some(Self(node))
                } else {
                    None
                }
            }

            fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

ast_node!(
    /// The root document node.
    Root,
    SyntaxKind::ROOT
);

ast_node!(
    /// `key = value`, at the root or inside an inline table.
    Entry,
    SyntaxKind::ENTRY
);

ast_node!(
    /// A possibly dotted key.
    Key,
    SyntaxKind::KEY
);

ast_node!(
    /// The value of an entry or an array element.
    Value,
    SyntaxKind::VALUE
);

ast_node!(
    /// `[ ... ]` in value position.
    Array,
    SyntaxKind::ARRAY
);

ast_node!(
    /// `{ ... }`
    InlineTable,
    SyntaxKind::INLINE_TABLE
);

ast_node!(
    /// `[a.b]`
    TableHeader,
    SyntaxKind::TABLE_HEADER
);

ast_node!(
    /// `[[a.b]]`
    TableArrayHeader,
    SyntaxKind::TABLE_ARRAY_HEADER
);

// === Root ===

/// A top-level item in document order.
#[derive(Debug, Clone)]
pub enum RootItem {
    Entry(Entry),
    Table(TableHeader),
    ArrayTable(TableArrayHeader),
}

impl Root {
    /// Iterate over entries and headers in source order.
    pub fn items(&self) -> impl Iterator<Item = RootItem> {
        self.0.children().filter_map(|node| match node.kind() {
            SyntaxKind::ENTRY => Entry::cast(node).map(RootItem::Entry),
            SyntaxKind::TABLE_HEADER => TableHeader::cast(node).map(RootItem::Table),
            SyntaxKind::TABLE_ARRAY_HEADER => {
                TableArrayHeader::cast(node).map(RootItem::ArrayTable)
            }
            _ => None,
        })
    }
}

// === Headers ===

impl TableHeader {
    pub fn key(&self) -> Option<Key> {
        self.0.children().find_map(Key::cast)
    }
}

impl TableArrayHeader {
    pub fn key(&self) -> Option<Key> {
        self.0.children().find_map(Key::cast)
    }
}

// === Entry ===

impl Entry {
    pub fn key(&self) -> Option<Key> {
        self.0.children().find_map(Key::cast)
    }

    pub fn value(&self) -> Option<Value> {
        self.0.children().find_map(Value::cast)
    }

    /// The comment on the same line, directly after this entry.
    pub fn trailing_comment(&self) -> Option<SyntaxToken> {
        let mut next = self.0.next_sibling_or_token();
        while let Some(element) = next {
            match element.kind() {
                SyntaxKind::WHITESPACE => next = element.next_sibling_or_token(),
                SyntaxKind::COMMENT => return element.into_token(),
                _ => return None,
            }
        }
        None
    }
}

// === Key ===

/// One segment of a dotted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySegment {
    /// The decoded key text.
    pub value: String,
    /// The source range of this segment (without surrounding periods).
    pub range: TextRange,
    /// Whether the segment was written as a quoted string.
    pub quoted: bool,
    /// Set when a quoted segment contains an invalid escape.
    pub error: Option<StringError>,
}

impl Key {
    /// The tokens making up the key segments, skipping periods, whitespace
    /// and tokens rejected by the parser.
    pub fn tokens(&self) -> impl Iterator<Item = SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|el| el.into_token())
            .filter(|t| !t.kind().is_trivia() && t.kind() != SyntaxKind::PERIOD)
    }

    /// Decoded key segments. A float token such as `1.5` yields two segments.
    pub fn segments(&self) -> Vec<KeySegment> {
        let mut segments = Vec::new();
        for token in self.tokens() {
            let start = token.text_range().start();
            match token.kind() {
                kind if is_quoted(kind) => {
                    let (value, error) = match decode_string(kind, token.text()) {
                        Ok(value) => (value, None),
                        Err(error) => (token.text().to_string(), Some(error)),
                    };
                    segments.push(KeySegment {
                        value,
                        range: token.text_range(),
                        quoted: true,
                        error,
                    });
                }
                _ => {
                    let mut offset = 0u32;
                    for part in token.text().split('.') {
                        let part_start = start + TextSize::from(offset);
                        segments.push(KeySegment {
                            value: part.to_string(),
                            range: TextRange::at(part_start, TextSize::of(part)),
                            quoted: false,
                            error: None,
                        });
                        offset += part.len() as u32 + 1;
                    }
                }
            }
        }
        segments
    }

    /// Decoded key segments as plain strings.
    pub fn path(&self) -> Vec<String> {
        self.segments().into_iter().map(|s| s.value).collect()
    }

    /// The key as written, with whitespace around periods removed.
    pub fn normalized_text(&self) -> String {
        self.tokens()
            .map(|t| t.text().to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn is_quoted(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::BASIC_STRING
            | SyntaxKind::LITERAL_STRING
            | SyntaxKind::MULTI_LINE_BASIC_STRING
            | SyntaxKind::MULTI_LINE_LITERAL_STRING
    )
}

// === Value ===

/// The kind of value in an entry or array.
#[derive(Debug, Clone)]
pub enum ValueKind {
    /// A scalar token (string, number, bool or date-time).
    Scalar(SyntaxToken),
    Array(Array),
    InlineTable(InlineTable),
    /// Missing or invalid value (parse error).
    Missing,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        for child in self.0.children_with_tokens() {
            match child {
                rowan::NodeOrToken::Token(token) if token.kind().is_scalar() => {
                    return ValueKind::Scalar(token);
                }
                rowan::NodeOrToken::Node(node) => match node.kind() {
                    SyntaxKind::ARRAY => return ValueKind::Array(Array(node)),
                    SyntaxKind::INLINE_TABLE => return ValueKind::InlineTable(InlineTable(node)),
                    _ => {}
                },
                _ => {}
            }
        }
        ValueKind::Missing
    }
}

// === Array ===

impl Array {
    pub fn values(&self) -> impl Iterator<Item = Value> {
        self.0.children().filter_map(Value::cast)
    }

    /// Whether the array contains comments anywhere between its brackets.
    pub fn has_comments(&self) -> bool {
        self.0
            .descendants_with_tokens()
            .any(|el| el.kind() == SyntaxKind::COMMENT)
    }

    /// Whether the array spans more than one line in the source.
    pub fn is_multiline(&self) -> bool {
        self.0
            .children_with_tokens()
            .any(|el| el.kind() == SyntaxKind::NEWLINE)
    }
}

// === InlineTable ===

impl InlineTable {
    pub fn entries(&self) -> impl Iterator<Item = Entry> {
        self.0.children().filter_map(Entry::cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use facet_testhelpers::test;

    fn root(source: &str) -> Root {
        Root::cast(parse(source).syntax()).unwrap()
    }

    #[test]
    fn test_items_in_order() {
        let root = root("a = 1\n[b]\n[[c]]\n");
        let items: Vec<_> = root.items().collect();
        assert!(matches!(items[0], RootItem::Entry(_)));
        assert!(matches!(items[1], RootItem::Table(_)));
        assert!(matches!(items[2], RootItem::ArrayTable(_)));
    }

    #[test]
    fn test_key_segments() {
        let root = root("a.\"b\\tc\".'d' = 1\n");
        let RootItem::Entry(entry) = root.items().next().unwrap() else {
            panic!("expected entry");
        };
        let key = entry.key().unwrap();
        assert_eq!(key.path(), vec!["a", "b\tc", "d"]);
        let segments = key.segments();
        assert!(!segments[0].quoted);
        assert!(segments[1].quoted);
        assert_eq!(u32::from(segments[1].range.start()), 2);
    }

    #[test]
    fn test_float_key_splits_into_segments() {
        let root = root("1.25 = true\n");
        let RootItem::Entry(entry) = root.items().next().unwrap() else {
            panic!("expected entry");
        };
        let segments = entry.key().unwrap().segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].value, "1");
        assert_eq!(segments[1].value, "25");
        assert_eq!(u32::from(segments[1].range.start()), 2);
        assert_eq!(u32::from(segments[1].range.end()), 4);
    }

    #[test]
    fn test_value_kinds() {
        let root = root("a = [1, { b = 2 }]\n");
        let RootItem::Entry(entry) = root.items().next().unwrap() else {
            panic!("expected entry");
        };
        let ValueKind::Array(array) = entry.value().unwrap().kind() else {
            panic!("expected array");
        };
        let values: Vec<_> = array.values().map(|v| v.kind()).collect();
        assert!(matches!(values[0], ValueKind::Scalar(_)));
        assert!(matches!(values[1], ValueKind::InlineTable(_)));
    }

    #[test]
    fn test_trailing_comment() {
        let root = root("a = 1   # note\nb = 2\n");
        let entries: Vec<_> = root
            .items()
            .filter_map(|i| match i {
                RootItem::Entry(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(entries[0].trailing_comment().unwrap().text(), "# note");
        assert!(entries[1].trailing_comment().is_none());
    }

    #[test]
    fn test_array_layout_queries() {
        let root = root("a = [\n  1, # c\n]\nb = [1, 2]\n");
        let arrays: Vec<_> = root
            .syntax()
            .descendants()
            .filter_map(Array::cast)
            .collect();
        assert!(arrays[0].is_multiline());
        assert!(arrays[0].has_comments());
        assert!(!arrays[1].is_multiline());
        assert!(!arrays[1].has_comments());
    }
}
