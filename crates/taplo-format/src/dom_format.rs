//! Rendering a document model back to TOML.

use taplo_dom::{ArrayKind, Dom, NodeId, NodeKind, TableKind};

use crate::scalar::{format_key, format_key_path, format_scalar};
use crate::{FormatterOptions, format_source};

/// Render a document model as formatted TOML.
///
/// Values come first in each table, followed by sub-tables as `[headers]`
/// and arrays of tables as `[[headers]]`. Dotted tables are written as
/// dotted keys. Implicit tables only get a header if they hold values.
pub fn format_dom(dom: &Dom, options: FormatterOptions) -> String {
    let mut writer = DomWriter {
        dom,
        out: String::new(),
    };
    let root = dom.root();
    for line in writer.values(root) {
        writer.line(&line);
    }
    writer.sections(root, &mut Vec::new());
    format_source(&writer.out, options)
}

struct DomWriter<'a> {
    dom: &'a Dom,
    out: String,
}

impl DomWriter<'_> {
    fn line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn header(&mut self, header: String) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.line(&header);
    }

    /// Whether the node is written in a section of its own rather than as
    /// a value.
    fn is_section(&self, id: NodeId) -> bool {
        match &self.dom.node(id).kind {
            NodeKind::Table(table) => {
                matches!(table.kind, TableKind::Header | TableKind::Implicit | TableKind::ArrayItem)
            }
            NodeKind::Array(array) => array.kind == ArrayKind::Tables,
            NodeKind::Scalar(_) => false,
        }
    }

    /// `key = value` lines for a table, with dotted tables flattened.
    fn values(&self, id: NodeId) -> Vec<String> {
        let mut lines = Vec::new();
        self.collect_values(id, &mut Vec::new(), &mut lines);
        lines
    }

    fn collect_values(&self, id: NodeId, prefix: &mut Vec<String>, lines: &mut Vec<String>) {
        let Some(table) = self.dom.table(id) else {
            return;
        };
        for (key, entry) in &table.entries {
            if self.is_section(entry.node) {
                continue;
            }
            prefix.push(key.clone());
            match self.dom.table(entry.node) {
                Some(child) if child.kind == TableKind::Dotted => {
                    self.collect_values(entry.node, prefix, lines);
                }
                _ => lines.push(format!("{} = {}", format_key_path(prefix), self.value(entry.node))),
            }
            prefix.pop();
        }
    }

    fn sections(&mut self, id: NodeId, path: &mut Vec<String>) {
        let dom = self.dom;
        let Some(table) = dom.table(id) else {
            return;
        };
        for (key, entry) in &table.entries {
            path.push(key.clone());
            match &dom.node(entry.node).kind {
                NodeKind::Table(child) => match child.kind {
                    TableKind::Header | TableKind::Implicit | TableKind::ArrayItem => {
                        let values = self.values(entry.node);
                        let has_sections = child.entries.values().any(|e| self.is_section(e.node));
                        let explicit = child.kind != TableKind::Implicit;
                        if !values.is_empty() || (explicit && !has_sections) {
                            self.header(format!("[{}]", format_key_path(path)));
                            for line in &values {
                                self.line(line);
                            }
                        }
                        self.sections(entry.node, path);
                    }
                    // Values were flattened into the parent, but the dotted
                    // table can still hold sub-tables.
                    TableKind::Dotted => self.sections(entry.node, path),
                    TableKind::Root | TableKind::Inline => {}
                },
                NodeKind::Array(array) if array.kind == ArrayKind::Tables => {
                    for &item in &array.items {
                        self.header(format!("[[{}]]", format_key_path(path)));
                        for line in self.values(item) {
                            self.line(&line);
                        }
                        self.sections(item, path);
                    }
                }
                NodeKind::Array(_) | NodeKind::Scalar(_) => {}
            }
            path.pop();
        }
    }

    /// A node in value position.
    fn value(&self, id: NodeId) -> String {
        match &self.dom.node(id).kind {
            NodeKind::Scalar(scalar) => format_scalar(scalar),
            NodeKind::Array(array) => {
                let items: Vec<String> = array.items.iter().map(|&item| self.value(item)).collect();
                format!("[{}]", items.join(", "))
            }
            NodeKind::Table(table) => {
                if table.entries.is_empty() {
                    return "{}".to_string();
                }
                let entries: Vec<String> = table
                    .entries
                    .iter()
                    .map(|(key, entry)| format!("{} = {}", format_key(key), self.value(entry.node)))
                    .collect();
                format!("{{ {} }}", entries.join(", "))
            }
        }
    }
}
