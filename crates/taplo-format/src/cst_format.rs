//! CST-based formatter for TOML documents.
//!
//! This formatter works directly with the lossless CST, preserving comments
//! and blank lines while normalizing everything else.

use taplo_cst::ast::{Array, AstNode, Entry, InlineTable, Key, Value, ValueKind};
use taplo_cst::{SyntaxKind, SyntaxNode};

use crate::{FormatterOptions, ScopedOptions};

/// Format a TOML document from its CST.
///
/// Documents containing syntax errors are returned unchanged.
pub fn format_syntax(node: &SyntaxNode, options: FormatterOptions, scopes: &ScopedOptions) -> String {
    if !is_well_formed(node) {
        debug!("not formatting a document with syntax errors");
        return node.to_string();
    }
    let mut formatter = CstFormatter::new(options, scopes);
    formatter.format_root(node);
    formatter.finish()
}

/// Format a TOML document from source text.
///
/// Parses the source, formats the CST, and returns the formatted output.
/// Returns the original source if parsing fails.
pub fn format_source(source: &str, options: FormatterOptions) -> String {
    format_source_with_scopes(source, options, &ScopedOptions::default())
}

/// [`format_source`] with key-scoped option overrides.
pub fn format_source_with_scopes(source: &str, options: FormatterOptions, scopes: &ScopedOptions) -> String {
    let parsed = taplo_cst::parse(source);
    if !parsed.is_ok() {
        // Don't format documents with parse errors
        return source.to_string();
    }
    format_syntax(&parsed.syntax(), options, scopes)
}

fn is_well_formed(root: &SyntaxNode) -> bool {
    let last_token = |node: &SyntaxNode| {
        node.children_with_tokens()
            .filter(|el| !el.kind().is_trivia())
            .last()
            .map(|el| el.kind())
    };
    root.descendants_with_tokens().all(|el| match el.kind() {
        SyntaxKind::ERROR | SyntaxKind::ERROR_NODE => false,
        SyntaxKind::VALUE => el.as_node().is_some_and(|n| n.first_child_or_token().is_some()),
        SyntaxKind::ARRAY | SyntaxKind::TABLE_HEADER | SyntaxKind::TABLE_ARRAY_HEADER => {
            el.as_node().and_then(last_token) == Some(SyntaxKind::BRACKET_END)
        }
        SyntaxKind::INLINE_TABLE => el.as_node().and_then(last_token) == Some(SyntaxKind::BRACE_END),
        SyntaxKind::ENTRY => el
            .as_node()
            .is_some_and(|n| n.children().any(|c| c.kind() == SyntaxKind::VALUE)),
        _ => true,
    })
}

/// A top-level line of the document.
enum Item {
    Entry {
        entry: Entry,
        comment: Option<String>,
    },
    Header {
        key: Vec<String>,
        text: String,
        comment: Option<String>,
    },
    Comment(String),
}

struct Line {
    item: Item,
    /// Blank lines between this line and the previous one.
    blank_before: usize,
}

/// Split the root into lines, attaching comments that follow an entry or
/// header on the same line.
fn collect_lines(root: &SyntaxNode) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut newlines = 0usize;
    let mut line_open = false;

    for el in root.children_with_tokens() {
        let item = match el.kind() {
            SyntaxKind::NEWLINE => {
                newlines += 1;
                line_open = false;
                continue;
            }
            SyntaxKind::COMMENT => {
                let text = el.to_string();
                if line_open {
                    match lines.last_mut().map(|l| &mut l.item) {
                        Some(Item::Entry { comment, .. } | Item::Header { comment, .. }) => {
                            *comment = Some(text);
                        }
                        _ => {}
                    }
                    continue;
                }
                Item::Comment(text)
            }
            SyntaxKind::ENTRY => {
                let Some(entry) = el.into_node().and_then(Entry::cast) else {
                    continue;
                };
                line_open = true;
                Item::Entry {
                    entry,
                    comment: None,
                }
            }
            SyntaxKind::TABLE_HEADER | SyntaxKind::TABLE_ARRAY_HEADER => {
                let array = el.kind() == SyntaxKind::TABLE_ARRAY_HEADER;
                let Some(node) = el.into_node() else {
                    continue;
                };
                let key = node.children().find_map(Key::cast);
                let key_text = key.as_ref().map(Key::normalized_text).unwrap_or_default();
                line_open = true;
                Item::Header {
                    key: key.map(|k| k.path()).unwrap_or_default(),
                    text: if array {
                        format!("[[{key_text}]]")
                    } else {
                        format!("[{key_text}]")
                    },
                    comment: None,
                }
            }
            _ => continue,
        };

        let blank_before = if lines.is_empty() {
            0
        } else {
            newlines.saturating_sub(1)
        };
        lines.push(Line { item, blank_before });
        newlines = 0;
    }

    lines
}

/// The indentation level of a header: one deeper than the latest header
/// whose key is a strict prefix of this one.
fn header_level(history: &[(Vec<String>, usize)], key: &[String], options: &FormatterOptions) -> usize {
    if !options.indent_tables {
        return 0;
    }
    history
        .iter()
        .rev()
        .find_map(|(previous, level)| {
            (previous.len() < key.len() && key.starts_with(previous)).then_some(level + 1)
        })
        .unwrap_or(0)
}

/// An entry waiting to be written with the rest of its group.
struct FormattedEntry {
    path: Vec<String>,
    indent: String,
    key: String,
    value: String,
    comment: Option<String>,
    options: FormatterOptions,
}

impl FormattedEntry {
    fn separator(&self) -> &'static str {
        if self.options.compact_entries { "=" } else { " = " }
    }
}

/// An element of a multi-line array.
enum ArrayElement {
    Value { text: String, comment: Option<String> },
    Comment(String),
}

struct CstFormatter<'a> {
    out: String,
    options: FormatterOptions,
    scopes: &'a ScopedOptions,
}

impl<'a> CstFormatter<'a> {
    fn new(options: FormatterOptions, scopes: &'a ScopedOptions) -> Self {
        Self {
            out: String::new(),
            options,
            scopes,
        }
    }

    fn finish(mut self) -> String {
        let newline = self.options.newline();
        while self.out.ends_with(newline) {
            self.out.truncate(self.out.len() - newline.len());
        }
        if self.options.trailing_newline && !self.out.is_empty() {
            self.out.push_str(newline);
        }
        self.out
    }

    fn options_for(&self, path: &[String]) -> FormatterOptions {
        if self.scopes.is_empty() {
            self.options.clone()
        } else {
            self.scopes.resolve(&self.options, path)
        }
    }

    fn newline(&self) -> &'static str {
        self.options.newline()
    }

    /// End the previous line and write the allowed number of blank lines.
    fn separate(&mut self, blank_lines: usize) {
        if self.out.is_empty() {
            return;
        }
        let newline = self.newline();
        let count = 1 + blank_lines.min(self.options.allowed_blank_lines);
        for _ in 0..count {
            self.out.push_str(newline);
        }
    }

    fn format_root(&mut self, root: &SyntaxNode) {
        let lines = collect_lines(root);
        trace!(lines = lines.len(), "formatting document");

        let mut table_path: Vec<String> = Vec::new();
        let mut entry_level = 0;
        let mut history: Vec<(Vec<String>, usize)> = Vec::new();
        let mut group: Vec<FormattedEntry> = Vec::new();
        let mut group_blank = 0;

        for (index, line) in lines.iter().enumerate() {
            let continues_group =
                matches!(line.item, Item::Entry { .. }) && line.blank_before == 0 && !group.is_empty();
            if !continues_group {
                self.flush_entries(&mut group, group_blank);
            }

            match &line.item {
                Item::Entry { entry, comment } => {
                    if group.is_empty() {
                        group_blank = line.blank_before;
                    }
                    group.push(self.format_entry(entry, comment.clone(), &table_path, entry_level));
                }
                Item::Comment(text) => {
                    let next = lines[index + 1..]
                        .iter()
                        .find(|l| !matches!(l.item, Item::Comment(_)));
                    let level = match next.map(|l| &l.item) {
                        Some(Item::Header { key, .. }) => {
                            header_level(&history, key, &self.options_for(key))
                        }
                        _ => entry_level,
                    };
                    let indent = self.options_for(&table_path).indent(level);
                    self.separate(line.blank_before);
                    self.out.push_str(&indent);
                    self.out.push_str(text);
                }
                Item::Header { key, text, comment } => {
                    let options = self.options_for(key);
                    let level = header_level(&history, key, &options);
                    history.push((key.clone(), level));

                    self.separate(line.blank_before);
                    self.out.push_str(&options.indent(level));
                    self.out.push_str(text);
                    if let Some(comment) = comment {
                        self.out.push(' ');
                        self.out.push_str(comment);
                    }

                    table_path = key.clone();
                    entry_level = level + usize::from(options.indent_entries);
                }
            }
        }

        self.flush_entries(&mut group, group_blank);
    }

    fn format_entry(
        &self,
        entry: &Entry,
        comment: Option<String>,
        table_path: &[String],
        level: usize,
    ) -> FormattedEntry {
        let key = entry.key();
        let mut path = table_path.to_vec();
        path.extend(key.as_ref().map(Key::path).unwrap_or_default());
        let options = self.options_for(&path);

        let mut formatted = FormattedEntry {
            path,
            indent: options.indent(level),
            key: key.map(|k| k.normalized_text()).unwrap_or_default(),
            value: String::new(),
            comment,
            options,
        };

        let Some(value) = entry.value() else {
            return formatted;
        };
        formatted.value = self.format_value(&value, &formatted.options, level, false);

        // Too long, try again with the array expanded.
        if formatted.options.array_auto_expand
            && matches!(value.kind(), ValueKind::Array(_))
            && !formatted.value.contains('\n')
        {
            let width = formatted.indent.chars().count()
                + formatted.key.chars().count()
                + formatted.separator().len()
                + formatted.value.chars().count()
                + formatted.comment.as_ref().map_or(0, |c| c.chars().count() + 1);
            if width > formatted.options.column_width {
                trace!(key = %formatted.key, width, "expanding array");
                formatted.value = self.format_value(&value, &formatted.options, level, true);
            }
        }

        formatted
    }

    /// Write a group of consecutive entries, aligning them as configured.
    fn flush_entries(&mut self, group: &mut Vec<FormattedEntry>, blank_before: usize) {
        if group.is_empty() {
            return;
        }
        let options = group[0].options.clone();
        if options.reorder_keys {
            group.sort_by(|a, b| a.path.cmp(&b.path));
        }

        let can_align = group.iter().all(|e| !e.value.contains('\n'));
        let key_width = if options.align_entries && can_align {
            group.iter().map(|e| e.key.chars().count()).max().unwrap_or(0)
        } else {
            0
        };

        let rows: Vec<String> = group
            .iter()
            .map(|e| {
                let padding = key_width.saturating_sub(e.key.chars().count());
                format!("{}{}{}{}{}", e.indent, e.key, " ".repeat(padding), e.separator(), e.value)
            })
            .collect();

        let comment_count = group.iter().filter(|e| e.comment.is_some()).count();
        let comment_column = if can_align && options.should_align_comments(comment_count) {
            rows.iter()
                .zip(group.iter())
                .filter(|(_, e)| e.comment.is_some())
                .map(|(row, _)| row.chars().count())
                .max()
                .unwrap_or(0)
        } else {
            0
        };

        let newline = self.newline();
        self.separate(blank_before);
        for (index, (row, entry)) in rows.iter().zip(group.iter()).enumerate() {
            if index > 0 {
                self.out.push_str(newline);
            }
            self.out.push_str(row);
            if let Some(comment) = &entry.comment {
                let padding = comment_column.saturating_sub(row.chars().count());
                self.out.push_str(&" ".repeat(padding + 1));
                self.out.push_str(comment);
            }
        }
        group.clear();
    }

    fn format_value(&self, value: &Value, options: &FormatterOptions, level: usize, expand: bool) -> String {
        match value.kind() {
            ValueKind::Scalar(token) => token.text().to_string(),
            ValueKind::Array(array) => self.format_array(&array, options, level, expand),
            ValueKind::InlineTable(table) => self.format_inline_table(&table, options, level),
            ValueKind::Missing => String::new(),
        }
    }

    fn format_array(&self, array: &Array, options: &FormatterOptions, level: usize, expand: bool) -> String {
        let mut elements: Vec<(usize, ArrayElement)> = Vec::new();
        let mut newlines = 0usize;
        let mut newline_since_value = true;

        for el in array.syntax().children_with_tokens() {
            match el.kind() {
                SyntaxKind::NEWLINE => {
                    newlines += 1;
                    newline_since_value = true;
                }
                SyntaxKind::COMMENT => {
                    let text = el.to_string();
                    if !newline_since_value
                        && let Some((_, ArrayElement::Value { comment, .. })) = elements.last_mut()
                    {
                        *comment = Some(text);
                        continue;
                    }
                    let blank = if elements.is_empty() { 0 } else { newlines.saturating_sub(1) };
                    elements.push((blank, ArrayElement::Comment(text)));
                    newlines = 0;
                }
                SyntaxKind::VALUE => {
                    let Some(value) = el.into_node().and_then(Value::cast) else {
                        continue;
                    };
                    let text = self.format_value(&value, options, level + 1, false);
                    let blank = if elements.is_empty() { 0 } else { newlines.saturating_sub(1) };
                    elements.push((blank, ArrayElement::Value { text, comment: None }));
                    newlines = 0;
                    newline_since_value = false;
                }
                _ => {}
            }
        }

        let values = || {
            elements.iter().filter_map(|(_, e)| match e {
                ArrayElement::Value { text, .. } => Some(text.as_str()),
                ArrayElement::Comment(_) => None,
            })
        };

        let multiline = expand
            || array.has_comments()
            || (array.is_multiline() && !options.array_auto_collapse)
            || values().any(|v| v.contains('\n'));

        if !multiline {
            let items: Vec<&str> = values().collect();
            if items.is_empty() {
                return "[]".to_string();
            }
            let padding = if options.compact_arrays { "" } else { " " };
            return format!("[{padding}{}{padding}]", items.join(", "));
        }

        let newline = self.newline();
        let indent = options.indent(level + 1);
        let value_count = values().count();

        let mut rows: Vec<(usize, String, Option<&String>)> = Vec::new();
        let mut value_index = 0;
        for (blank, element) in &elements {
            match element {
                ArrayElement::Value { text, comment } => {
                    value_index += 1;
                    let comma = value_index < value_count || options.array_trailing_comma;
                    let row = format!("{indent}{text}{}", if comma { "," } else { "" });
                    rows.push((*blank, row, comment.as_ref()));
                }
                ArrayElement::Comment(text) => rows.push((*blank, format!("{indent}{text}"), None)),
            }
        }

        let can_align = rows.iter().all(|(_, row, _)| !row.contains('\n'));
        let comment_count = rows.iter().filter(|(_, _, c)| c.is_some()).count();
        let comment_column = if can_align && options.should_align_comments(comment_count) {
            rows.iter()
                .filter(|(_, _, c)| c.is_some())
                .map(|(_, row, _)| row.chars().count())
                .max()
                .unwrap_or(0)
        } else {
            0
        };

        let mut out = String::from("[");
        for (blank, row, comment) in rows {
            for _ in 0..=blank.min(self.options.allowed_blank_lines) {
                out.push_str(newline);
            }
            out.push_str(&row);
            if let Some(comment) = comment {
                let padding = comment_column.saturating_sub(row.chars().count());
                out.push_str(&" ".repeat(padding + 1));
                out.push_str(comment);
            }
        }
        out.push_str(newline);
        out.push_str(&options.indent(level));
        out.push(']');
        out
    }

    fn format_inline_table(&self, table: &InlineTable, options: &FormatterOptions, level: usize) -> String {
        let separator = if options.compact_entries { "=" } else { " = " };
        let mut entries: Vec<(Vec<String>, String)> = table
            .entries()
            .map(|entry| {
                let key = entry.key();
                let value = entry
                    .value()
                    .map(|v| self.format_value(&v, options, level, false))
                    .unwrap_or_default();
                let path = key.as_ref().map(Key::path).unwrap_or_default();
                let text = key.map(|k| k.normalized_text()).unwrap_or_default();
                (path, format!("{text}{separator}{value}"))
            })
            .collect();

        if entries.is_empty() {
            return "{}".to_string();
        }
        if options.reorder_inline_tables {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let padding = if options.compact_inline_tables { "" } else { " " };
        let body: Vec<String> = entries.into_iter().map(|(_, text)| text).collect();
        format!("{{{padding}{}{padding}}}", body.join(", "))
    }
}
