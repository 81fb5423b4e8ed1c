//! Position queries over the CST, used by editor tooling.

use rowan::{Direction, TextSize, TokenAtOffset};

use crate::ast::{AstNode, Entry, Key, TableArrayHeader, TableHeader};
use crate::syntax_kind::{SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken};

/// One step of a path into the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    /// Any element of an array.
    Item,
}

/// What the position is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// On the key of an entry.
    Key,
    /// In the value of an entry, or an element of an array.
    Value,
    /// Inside a table header.
    Header,
    /// Anywhere else, e.g. an empty line or between inline table entries.
    Other,
}

/// The result of [`query_at`].
#[derive(Debug, Clone)]
pub struct Query {
    /// Path of the container the position is in.
    ///
    /// For [`Position::Value`] this is the path of the value itself. For
    /// [`Position::Key`] and [`Position::Other`] it is the table the key
    /// belongs to, and for [`Position::Header`] it is empty.
    pub path: Vec<PathSegment>,
    pub position: Position,
    /// The innermost entry containing the position.
    pub entry: Option<Entry>,
    /// The key under the position, for entries and headers.
    pub key: Option<Key>,
    /// The token at the position.
    pub token: Option<SyntaxToken>,
}

impl Query {
    /// Key segments of [`Query::key`] that end before `offset`, i.e. the
    /// dotted prefix typed so far.
    pub fn key_prefix(&self, offset: TextSize) -> Vec<String> {
        let Some(key) = &self.key else {
            return Vec::new();
        };
        key.segments()
            .into_iter()
            .filter(|segment| segment.range.end() < offset)
            .map(|segment| segment.value)
            .collect()
    }

    /// Key segments of [`Query::key`] up to and including the one at `offset`.
    pub fn key_through(&self, offset: TextSize) -> Vec<String> {
        let Some(key) = &self.key else {
            return Vec::new();
        };
        key.segments()
            .into_iter()
            .take_while(|segment| segment.range.start() <= offset)
            .map(|segment| segment.value)
            .collect()
    }
}

/// The token at `offset`, preferring the one that ends there when the offset
/// sits between two tokens and the right one is trivia. At the end of a
/// line, the whitespace before the newline wins, so `key = |` is in the
/// entry.
pub fn token_at_offset(root: &SyntaxNode, offset: TextSize) -> Option<SyntaxToken> {
    if offset > root.text_range().end() {
        return None;
    }
    match root.token_at_offset(offset) {
        TokenAtOffset::None => None,
        TokenAtOffset::Single(token) => Some(token),
        TokenAtOffset::Between(left, right) => {
            let ends_line =
                left.kind() == SyntaxKind::WHITESPACE && right.kind() == SyntaxKind::NEWLINE;
            if ends_line || (right.kind().is_trivia() && !left.kind().is_trivia()) {
                Some(left)
            } else {
                Some(right)
            }
        }
    }
}

/// Describe the position at `offset` in a parsed document.
pub fn query_at(root: &SyntaxNode, offset: TextSize) -> Query {
    let token = token_at_offset(root, offset);
    let mut query = Query {
        path: Vec::new(),
        position: Position::Other,
        entry: None,
        key: None,
        token: token.clone(),
    };

    let Some(token) = token else {
        query.path = header_path_before(root.last_child_or_token());
        return query;
    };

    // Segments collected innermost first, reversed at the end.
    let mut reversed: Vec<PathSegment> = Vec::new();
    let mut innermost_entry = true;
    let mut inside_table = false;
    let mut top_level: SyntaxElement = token.clone().into();

    for node in token.parent_ancestors() {
        match node.kind() {
            SyntaxKind::ENTRY => {
                let Some(entry) = Entry::cast(node.clone()) else {
                    continue;
                };
                let key = entry.key();
                let in_key = key.as_ref().is_some_and(|k| {
                    k.syntax().text_range().contains_inclusive(offset)
                        && (k.syntax().text_range().end() != offset
                            || !token.kind().is_trivia())
                });

                if innermost_entry {
                    innermost_entry = false;
                    query.entry = Some(entry.clone());
                    if inside_table {
                        query.position = Position::Other;
                    } else if in_key {
                        query.position = Position::Key;
                        query.key = key;
                        top_level = node.clone().into();
                        continue;
                    } else {
                        query.position = Position::Value;
                    }
                }
                if let Some(key) = key {
                    let segments: Vec<_> = key.path().into_iter().map(PathSegment::Key).collect();
                    reversed.extend(segments.into_iter().rev());
                }
            }
            SyntaxKind::ARRAY => {
                if innermost_entry {
                    query.position = Position::Value;
                }
                reversed.push(PathSegment::Item);
            }
            SyntaxKind::INLINE_TABLE => {
                if innermost_entry {
                    inside_table = true;
                }
            }
            SyntaxKind::TABLE_HEADER => {
                query.position = Position::Header;
                query.key = TableHeader::cast(node.clone()).and_then(|h| h.key());
            }
            SyntaxKind::TABLE_ARRAY_HEADER => {
                query.position = Position::Header;
                query.key = TableArrayHeader::cast(node.clone()).and_then(|h| h.key());
            }
            _ => {}
        }
        if node.kind() != SyntaxKind::ROOT {
            top_level = node.clone().into();
        }
    }

    if query.position == Position::Header {
        return query;
    }

    reversed.reverse();
    let mut path = header_path_before(top_level.prev_sibling_or_token());
    path.extend(reversed);
    query.path = path;
    query
}

/// Path of the closest table header at or before `element` at the root.
fn header_path_before(element: Option<SyntaxElement>) -> Vec<PathSegment> {
    let mut current = element;
    while let Some(el) = current {
        if let Some(node) = el.as_node() {
            if let Some(header) = TableHeader::cast(node.clone()) {
                return key_path(header.key());
            }
            if let Some(header) = TableArrayHeader::cast(node.clone()) {
                let mut path = key_path(header.key());
                path.push(PathSegment::Item);
                return path;
            }
        }
        current = match el {
            rowan::NodeOrToken::Node(n) => n.siblings_with_tokens(Direction::Prev).nth(1),
            rowan::NodeOrToken::Token(t) => t.siblings_with_tokens(Direction::Prev).nth(1),
        };
    }
    Vec::new()
}

fn key_path(key: Option<Key>) -> Vec<PathSegment> {
    key.map(|k| k.path().into_iter().map(PathSegment::Key).collect())
        .unwrap_or_default()
}
