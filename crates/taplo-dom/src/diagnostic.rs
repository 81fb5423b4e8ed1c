//! Semantic errors and their rendering.

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use taplo_cst::{ParseError, TextRange};

/// A problem with the meaning of an otherwise well-formed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    /// The same key was given a value twice.
    DuplicateKey {
        key: String,
        first: Option<TextRange>,
        range: TextRange,
    },
    /// A table was defined twice, or a closed table or array was extended.
    ConflictingTable {
        key: String,
        first: Option<TextRange>,
        range: TextRange,
    },
    /// A key path goes through something that is not a table.
    ExpectedTable {
        key: String,
        found: &'static str,
        first: Option<TextRange>,
        range: TextRange,
    },
    /// A value or key could not be decoded.
    InvalidValue { message: String, range: TextRange },
}

impl SemanticError {
    /// Where the error is reported.
    pub fn range(&self) -> TextRange {
        match self {
            SemanticError::DuplicateKey { range, .. }
            | SemanticError::ConflictingTable { range, .. }
            | SemanticError::ExpectedTable { range, .. }
            | SemanticError::InvalidValue { range, .. } => *range,
        }
    }

    /// The earlier definition this error conflicts with, if any.
    pub fn first(&self) -> Option<TextRange> {
        match self {
            SemanticError::DuplicateKey { first, .. }
            | SemanticError::ConflictingTable { first, .. }
            | SemanticError::ExpectedTable { first, .. } => *first,
            SemanticError::InvalidValue { .. } => None,
        }
    }

    /// Render this error with ariadne.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| self.to_string())
    }

    /// Write the error report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let range = span(self.range());
        let mut report = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_config(ariadne_config())
            .with_message(self.to_string());

        if let Some(first) = self.first() {
            report = report.with_label(
                Label::new((filename, span(first)))
                    .with_message("first defined here")
                    .with_color(Color::Blue),
            );
        }

        report = match self {
            SemanticError::DuplicateKey { .. } => report
                .with_label(
                    Label::new((filename, range))
                        .with_message("defined again here")
                        .with_color(Color::Red),
                )
                .with_help("each key can only be given a value once"),
            SemanticError::ConflictingTable { .. } => report
                .with_label(
                    Label::new((filename, range))
                        .with_message("conflicts with the earlier definition")
                        .with_color(Color::Red),
                )
                .with_help("tables can only be defined once, and inline tables and arrays cannot be extended"),
            SemanticError::ExpectedTable { found, .. } => report.with_label(
                Label::new((filename, range))
                    .with_message(format!("this is a {found}, not a table"))
                    .with_color(Color::Red),
            ),
            SemanticError::InvalidValue { .. } => report.with_label(
                Label::new((filename, range))
                    .with_message("invalid")
                    .with_color(Color::Red),
            ),
        };

        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }
}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticError::DuplicateKey { key, .. } => write!(f, "duplicate key `{key}`"),
            SemanticError::ConflictingTable { key, .. } => write!(f, "conflicting definition of table `{key}`"),
            SemanticError::ExpectedTable { key, found, .. } => {
                write!(f, "expected `{key}` to be a table, but it is a {found}")
            }
            SemanticError::InvalidValue { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for SemanticError {}

/// Render a syntax error from the parser with ariadne.
pub fn render_parse_error(error: &ParseError, filename: &str, source: &str) -> String {
    let range = span(error.range);
    let mut output = Vec::new();
    let _ = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_config(ariadne_config())
        .with_message(&error.message)
        .with_label(
            Label::new((filename, range))
                .with_message(&error.message)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut output);
    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

fn span(range: TextRange) -> std::ops::Range<usize> {
    range.start().into()..range.end().into()
}

/// Colors are disabled when `NO_COLOR` is set.
fn ariadne_config() -> Config {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
    Config::default().with_color(!no_color)
}
