//! Formatting options and key-scoped overrides.

use serde::{Deserialize, Serialize};

/// Declares [`FormatterOptions`] and its partial counterpart
/// [`OptionsIncomplete`] from one field list.
macro_rules! formatter_options {
    ($(
        $(#[doc = $doc:literal])*
        $field:ident ($camel:literal): $ty:ty = $default:expr;
    )*) => {
        /// All formatting options.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct FormatterOptions {
            $(
                $(#[doc = $doc])*
                #[serde(alias = $camel)]
                pub $field: $ty,
            )*
        }

        impl Default for FormatterOptions {
            fn default() -> Self {
                Self {
                    $($field: $default,)*
                }
            }
        }

        /// Formatting options where every field is optional, as found in
        /// configuration files and editor settings.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct OptionsIncomplete {
            $(
                #[serde(alias = $camel, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl FormatterOptions {
            /// Apply the fields that are set in `incomplete`.
            pub fn update(&mut self, incomplete: &OptionsIncomplete) {
                $(
                    if let Some(value) = &incomplete.$field {
                        self.$field = value.clone();
                    }
                )*
            }
        }

        impl OptionsIncomplete {
            /// Combine with `other`, whose set fields take precedence.
            pub fn merge(&mut self, other: &OptionsIncomplete) {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field.clone();
                    }
                )*
            }

            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())*
            }
        }
    };
}

formatter_options! {
    /// Align entries vertically. Entries separated by blank lines, comments
    /// or headers are aligned separately.
    align_entries ("alignEntries"): bool = false;
    /// Align comments after entries and array items vertically.
    align_comments ("alignComments"): bool = true;
    /// With `align_comments`, also align a group with a single comment.
    align_single_comments ("alignSingleComments"): bool = true;
    /// Put a trailing comma after the last element of multi-line arrays.
    array_trailing_comma ("arrayTrailingComma"): bool = true;
    /// Expand arrays to multiple lines once they exceed `column_width`.
    array_auto_expand ("arrayAutoExpand"): bool = true;
    /// Collapse multi-line arrays without comments if they fit on one line.
    array_auto_collapse ("arrayAutoCollapse"): bool = true;
    /// Omit the padding inside single-line arrays.
    compact_arrays ("compactArrays"): bool = true;
    /// Omit the padding inside inline tables.
    compact_inline_tables ("compactInlineTables"): bool = false;
    /// Omit the whitespace around `=`.
    compact_entries ("compactEntries"): bool = false;
    /// Target maximum line width, used for array expansion.
    column_width ("columnWidth"): usize = 80;
    /// Indent sub-tables under their parent table.
    indent_tables ("indentTables"): bool = false;
    /// Indent entries under their table header.
    indent_entries ("indentEntries"): bool = false;
    /// The string used for one level of indentation.
    indent_string ("indentString"): String = "  ".to_string();
    /// End the document with a newline.
    trailing_newline ("trailingNewline"): bool = true;
    /// Sort keys alphabetically within groups not separated by blank lines
    /// or comments.
    reorder_keys ("reorderKeys"): bool = false;
    /// Sort the entries of inline tables alphabetically.
    reorder_inline_tables ("reorderInlineTables"): bool = false;
    /// The maximum number of consecutive blank lines.
    allowed_blank_lines ("allowedBlankLines"): usize = 2;
    /// Use `\r\n` line endings.
    crlf ("crlf"): bool = false;
}

impl FormatterOptions {
    pub(crate) fn newline(&self) -> &'static str {
        if self.crlf { "\r\n" } else { "\n" }
    }

    pub(crate) fn should_align_comments(&self, comment_count: usize) -> bool {
        self.align_comments && (comment_count != 1 || self.align_single_comments)
    }

    pub(crate) fn indent(&self, level: usize) -> String {
        self.indent_string.repeat(level)
    }
}

/// Formatting overrides for parts of a document, selected by key patterns.
///
/// A pattern is a dotted key whose segments may contain glob syntax
/// (`*`, `?`, `[...]`) or be `**` to match any number of segments, e.g.
/// `dependencies` or `**.dependencies.*`. A pattern applies to the keys it
/// matches and everything below them.
#[derive(Debug, Clone, Default)]
pub struct ScopedOptions {
    scopes: Vec<Scope>,
}

#[derive(Debug, Clone)]
struct Scope {
    pattern: Vec<Segment>,
    options: OptionsIncomplete,
}

#[derive(Debug, Clone)]
enum Segment {
    Any,
    Glob(glob::Pattern),
    Literal(String),
}

impl Segment {
    fn parse(segment: &str) -> Self {
        if segment == "**" {
            return Segment::Any;
        }
        if segment.contains(['*', '?', '[']) {
            if let Ok(pattern) = glob::Pattern::new(segment) {
                return Segment::Glob(pattern);
            }
        }
        Segment::Literal(segment.to_string())
    }
}

/// Whether `pattern` matches a prefix of `path`.
fn matches_prefix(pattern: &[Segment], path: &[String]) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return true;
    };
    match first {
        Segment::Any => (0..=path.len()).any(|skip| matches_prefix(rest, &path[skip..])),
        Segment::Glob(glob) => path
            .first()
            .is_some_and(|key| glob.matches(key) && matches_prefix(rest, &path[1..])),
        Segment::Literal(literal) => path
            .first()
            .is_some_and(|key| key == literal && matches_prefix(rest, &path[1..])),
    }
}

impl ScopedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add overrides for keys matching `pattern`.
    pub fn add(&mut self, pattern: &str, options: OptionsIncomplete) {
        let pattern = pattern.split('.').map(|s| Segment::parse(s.trim())).collect();
        self.scopes.push(Scope { pattern, options });
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// The options for the key at `path`.
    ///
    /// Every matching scope is applied from least to most specific, so the
    /// most specific scope wins for each option it sets. Specificity is the
    /// number of literal segments; among equally specific scopes the one
    /// declared first wins.
    pub fn resolve(&self, base: &FormatterOptions, path: &[String]) -> FormatterOptions {
        let mut matching: Vec<(usize, usize, &OptionsIncomplete)> = self
            .scopes
            .iter()
            .enumerate()
            .filter(|(_, scope)| matches_prefix(&scope.pattern, path))
            .map(|(index, scope)| {
                let specificity = scope
                    .pattern
                    .iter()
                    .filter(|s| matches!(s, Segment::Literal(_)))
                    .count();
                (specificity, index, &scope.options)
            })
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut options = base.clone();
        for (_, _, scope) in matching {
            options.update(scope);
        }
        options
    }
}

impl<S: AsRef<str>> FromIterator<(S, OptionsIncomplete)> for ScopedOptions {
    fn from_iter<T: IntoIterator<Item = (S, OptionsIncomplete)>>(iter: T) -> Self {
        let mut scoped = ScopedOptions::new();
        for (pattern, options) in iter {
            scoped.add(pattern.as_ref(), options);
        }
        scoped
    }
}
