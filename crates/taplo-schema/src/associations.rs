//! Which schema applies to which document.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{Value, json};
use taplo_config::{Config, GlobRule, SchemaConfig};
use tracing::{debug, warn};
use url::Url;

use crate::SchemaError;
use crate::builtin::TAPLO_CONFIG_SCHEMA_URL;

pub const PRIORITY_BUILTIN: i32 = 0;
pub const PRIORITY_CATALOG: i32 = 5;
pub const PRIORITY_LSP_CONFIG: i32 = 50;
pub const PRIORITY_CONFIG_FILE: i32 = 75;
pub const PRIORITY_DIRECTIVE: i32 = 90;
pub const PRIORITY_MANUAL: i32 = i32::MAX;

pub const SOURCE_BUILTIN: &str = "builtin";
pub const SOURCE_LSP_CONFIG: &str = "lsp configuration";
pub const SOURCE_CONFIG_FILE: &str = "configuration file";
pub const SOURCE_DIRECTIVE: &str = "directive";
pub const SOURCE_MANUAL: &str = "manual";

/// Selects the documents an association applies to.
#[derive(Debug, Clone)]
pub enum AssociationRule {
    /// Matches the path of the document URI.
    Glob(GlobRule),
    /// Matches the whole document URI.
    Regex(Regex),
    /// Matches exactly one document.
    Url(Url),
}

impl AssociationRule {
    pub fn glob(pattern: &str) -> Result<Self, SchemaError> {
        Self::globs(&[pattern.to_string()], &[])
    }

    pub fn globs(include: &[String], exclude: &[String]) -> Result<Self, SchemaError> {
        GlobRule::new(include, exclude)
            .map(AssociationRule::Glob)
            .map_err(|e| SchemaError::Pattern {
                pattern: include.join(", "),
                message: e.to_string(),
            })
    }

    pub fn regex(pattern: &str) -> Result<Self, SchemaError> {
        Regex::new(pattern)
            .map(AssociationRule::Regex)
            .map_err(|e| SchemaError::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    /// Whether both rules select documents the same way.
    pub fn same_as(&self, other: &AssociationRule) -> bool {
        match (self, other) {
            (AssociationRule::Glob(a), AssociationRule::Glob(b)) => a == b,
            (AssociationRule::Regex(a), AssociationRule::Regex(b)) => a.as_str() == b.as_str(),
            (AssociationRule::Url(a), AssociationRule::Url(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_match(&self, document: &Url) -> bool {
        match self {
            AssociationRule::Glob(glob) => glob.is_match(&document_path(document)),
            AssociationRule::Regex(regex) => regex.is_match(document.as_str()),
            AssociationRule::Url(url) => url == document,
        }
    }
}

fn document_path(document: &Url) -> PathBuf {
    if document.scheme() == "file"
        && let Ok(path) = document.to_file_path()
    {
        return path;
    }
    PathBuf::from(document.path())
}

/// A schema and what is known about why it applies.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaAssociation {
    pub url: Url,
    /// Free-form details, `source` names who registered the association.
    pub meta: Value,
    pub priority: i32,
}

impl SchemaAssociation {
    pub fn new(url: Url, priority: i32, source: &str) -> Self {
        Self {
            url,
            meta: json!({ "source": source }),
            priority,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.meta.get("source")?.as_str()
    }
}

/// How to choose between matching associations of equal priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    #[default]
    LastRegistered,
    FirstRegistered,
}

/// The registered association rules, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaAssociations {
    entries: Vec<(AssociationRule, SchemaAssociation)>,
    tie_break: TieBreak,
}

impl SchemaAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tie_break(tie_break: TieBreak) -> Self {
        Self {
            entries: Vec::new(),
            tie_break,
        }
    }

    pub fn add(&mut self, rule: AssociationRule, association: SchemaAssociation) {
        debug!(url = %association.url, priority = association.priority, "schema association added");
        self.entries.push((rule, association));
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&AssociationRule, &SchemaAssociation) -> bool) {
        self.entries.retain(|(rule, association)| keep(rule, association));
    }

    /// Add an association, replacing one registered by the same source
    /// under the same rule.
    pub fn replace(&mut self, rule: AssociationRule, association: SchemaAssociation) {
        let source = association.source().map(str::to_string);
        self.retain(|existing_rule, existing| {
            !(existing.source() == source.as_deref() && existing_rule.same_as(&rule))
        });
        self.add(rule, association);
    }

    /// Drop every association registered by `source`.
    pub fn remove_source(&mut self, source: &str) {
        self.retain(|_, association| association.source() != Some(source));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn list(&self) -> &[(AssociationRule, SchemaAssociation)] {
        &self.entries
    }

    /// Every association matching `document`, in registration order.
    pub fn matching(&self, document: &Url) -> Vec<&SchemaAssociation> {
        self.entries
            .iter()
            .filter(|(rule, _)| rule.is_match(document))
            .map(|(_, association)| association)
            .collect()
    }

    /// The schema for `document`.
    ///
    /// A rule naming the document's URL beats any pattern, whatever its
    /// priority. Otherwise the highest priority wins.
    pub fn association_for(&self, document: &Url) -> Option<&SchemaAssociation> {
        let matches = self
            .entries
            .iter()
            .filter(|(rule, _)| rule.is_match(document));

        let mut best: Option<(bool, &SchemaAssociation)> = None;
        for (rule, association) in matches {
            let explicit = matches!(rule, AssociationRule::Url(_));
            let better = match best {
                None => true,
                Some((best_explicit, best_association)) => {
                    if explicit != best_explicit {
                        explicit
                    } else if association.priority != best_association.priority {
                        association.priority > best_association.priority
                    } else {
                        self.tie_break == TieBreak::LastRegistered
                    }
                }
            };
            if better {
                best = Some((explicit, association));
            }
        }
        best.map(|(_, association)| association)
    }

    /// Associate the bundled configuration schema with configuration files.
    pub fn add_builtins(&mut self) {
        let Ok(url) = Url::parse(TAPLO_CONFIG_SCHEMA_URL) else {
            return;
        };
        let patterns = ["**/.taplo.toml".to_string(), "**/taplo.toml".to_string()];
        match AssociationRule::globs(&patterns, &[]) {
            Ok(rule) => self.add(rule, SchemaAssociation::new(url, PRIORITY_BUILTIN, SOURCE_BUILTIN)),
            Err(e) => warn!(error = %e, "builtin association"),
        }
    }

    /// Register the schemas of a prepared configuration file, replacing
    /// those registered from a previous one.
    ///
    /// Rule schemas rank above the global schema, and later rules above
    /// earlier ones.
    pub fn add_from_config(&mut self, config: &Config) {
        self.remove_source(SOURCE_CONFIG_FILE);

        let enabled = |schema: &taplo_config::SchemaOptions| schema.enabled.unwrap_or(true);

        if let Some(schema) = &config.schema
            && enabled(schema)
            && let Some(url) = &schema.url
        {
            let include = config
                .include
                .clone()
                .unwrap_or_else(|| vec!["**/*.toml".to_string()]);
            let exclude = config.exclude.clone().unwrap_or_default();
            self.add_config_association(&include, &exclude, url, PRIORITY_CONFIG_FILE);
        }

        for rule in &config.rule {
            if rule.keys.is_some() {
                continue;
            }
            let Some(schema) = &rule.schema else {
                continue;
            };
            let Some(url) = &schema.url else {
                continue;
            };
            if !enabled(schema) {
                continue;
            }
            let include = rule.include.clone().unwrap_or_else(|| vec!["**".to_string()]);
            let exclude = rule.exclude.clone().unwrap_or_default();
            self.add_config_association(&include, &exclude, url, PRIORITY_CONFIG_FILE + 1);
        }
    }

    fn add_config_association(&mut self, include: &[String], exclude: &[String], url: &Url, priority: i32) {
        match AssociationRule::globs(include, exclude) {
            Ok(rule) => self.add(
                rule,
                SchemaAssociation::new(url.clone(), priority, SOURCE_CONFIG_FILE),
            ),
            Err(e) => warn!(error = %e, "skipping configuration schema"),
        }
    }

    /// Register the `schema.associations` editor setting, replacing the
    /// previous one. Relative globs are relative to `root`.
    pub fn add_from_lsp_config(&mut self, config: &SchemaConfig, root: Option<&Path>) -> Vec<SchemaError> {
        self.remove_source(SOURCE_LSP_CONFIG);

        let mut errors = Vec::new();
        for (pattern, schema) in &config.associations {
            let url = match Url::parse(schema) {
                Ok(url) => url,
                Err(e) => {
                    errors.push(SchemaError::Pattern {
                        pattern: schema.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            let rule = match pattern.strip_prefix("regex:") {
                Some(regex) => AssociationRule::regex(regex),
                None => AssociationRule::glob(&root_glob(pattern, root)),
            };
            match rule {
                Ok(rule) => self.add(rule, SchemaAssociation::new(url, PRIORITY_LSP_CONFIG, SOURCE_LSP_CONFIG)),
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    /// Associate `schema` with exactly one document. Manual associations
    /// outrank everything else.
    pub fn associate_manual(&mut self, document: Url, schema: Url, meta: Option<Value>) {
        let mut meta = match meta {
            Some(Value::Object(map)) => Value::Object(map),
            _ => json!({}),
        };
        meta["source"] = json!(SOURCE_MANUAL);
        self.replace(
            AssociationRule::Url(document),
            SchemaAssociation {
                url: schema,
                meta,
                priority: PRIORITY_MANUAL,
            },
        );
    }

    /// Replace the association coming from a `#:schema` comment in the
    /// document.
    pub fn set_directive(&mut self, document: &Url, schema: Option<Url>) {
        self.retain(|rule, association| {
            !(association.source() == Some(SOURCE_DIRECTIVE)
                && matches!(rule, AssociationRule::Url(url) if url == document))
        });
        if let Some(schema) = schema {
            self.add(
                AssociationRule::Url(document.clone()),
                SchemaAssociation::new(schema, PRIORITY_DIRECTIVE, SOURCE_DIRECTIVE),
            );
        }
    }
}

fn root_glob(pattern: &str, root: Option<&Path>) -> String {
    match root {
        Some(root) if !pattern.starts_with('/') && !pattern.starts_with('*') => {
            root.join(pattern).to_string_lossy().into_owned()
        }
        _ => pattern.to_string(),
    }
}

/// Find a `#:schema <url>` comment before the first entry or header.
/// Relative URLs are resolved against the document.
pub fn schema_directive(source: &str, document: &Url) -> Option<Url> {
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let comment = line.strip_prefix('#')?;
        if let Some(target) = comment.strip_prefix(":schema") {
            let target = target.trim();
            return Url::parse(target).or_else(|_| document.join(target)).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn add(associations: &mut SchemaAssociations, rule: AssociationRule, schema: &str, priority: i32) {
        associations.add(rule, SchemaAssociation::new(url(schema), priority, "test"));
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut associations = SchemaAssociations::new();
        add(&mut associations, AssociationRule::glob("**/*.toml").unwrap(), "https://s/any.json", 10);
        add(&mut associations, AssociationRule::glob("**/Cargo.toml").unwrap(), "https://s/cargo.json", 50);
        add(&mut associations, AssociationRule::regex(r"pyproject\.toml$").unwrap(), "https://s/py.json", 50);

        let cargo = url("file:///work/Cargo.toml");
        assert_eq!(associations.association_for(&cargo).unwrap().url.as_str(), "https://s/cargo.json");
        let py = url("file:///work/pyproject.toml");
        assert_eq!(associations.association_for(&py).unwrap().url.as_str(), "https://s/py.json");
        let other = url("file:///work/x.toml");
        assert_eq!(associations.association_for(&other).unwrap().url.as_str(), "https://s/any.json");
        assert!(associations.association_for(&url("file:///work/x.json")).is_none());
        assert_eq!(associations.matching(&cargo).len(), 2);
    }

    #[test]
    fn test_url_rule_beats_priority() {
        let mut associations = SchemaAssociations::new();
        let document = url("file:///work/Cargo.toml");
        add(&mut associations, AssociationRule::Url(document.clone()), "https://s/explicit.json", 1);
        add(&mut associations, AssociationRule::glob("**/Cargo.toml").unwrap(), "https://s/glob.json", 1000);
        assert_eq!(
            associations.association_for(&document).unwrap().url.as_str(),
            "https://s/explicit.json"
        );
    }

    #[test]
    fn test_tie_break() {
        for (tie_break, expected) in [
            (TieBreak::LastRegistered, "https://s/second.json"),
            (TieBreak::FirstRegistered, "https://s/first.json"),
        ] {
            let mut associations = SchemaAssociations::with_tie_break(tie_break);
            add(&mut associations, AssociationRule::glob("**/*.toml").unwrap(), "https://s/first.json", 5);
            add(&mut associations, AssociationRule::glob("**/*.toml").unwrap(), "https://s/second.json", 5);
            let found = associations.association_for(&url("file:///a.toml")).unwrap();
            assert_eq!(found.url.as_str(), expected);
        }
    }

    #[test]
    fn test_builtin_and_manual() {
        let mut associations = SchemaAssociations::new();
        associations.add_builtins();
        let config = url("file:///work/.taplo.toml");
        assert_eq!(associations.association_for(&config).unwrap().url.as_str(), TAPLO_CONFIG_SCHEMA_URL);

        associations.associate_manual(config.clone(), url("https://s/mine.json"), None);
        associations.associate_manual(config.clone(), url("https://s/mine2.json"), Some(json!({ "name": "x" })));
        let found = associations.association_for(&config).unwrap();
        assert_eq!(found.url.as_str(), "https://s/mine2.json");
        assert_eq!(found.source(), Some(SOURCE_MANUAL));
        assert_eq!(found.meta["name"], "x");
        assert_eq!(found.priority, PRIORITY_MANUAL);
        assert_eq!(associations.list().len(), 2);
    }

    #[test]
    fn test_replace_same_rule() {
        let mut associations = SchemaAssociations::new();
        let manual = |schema: &str| SchemaAssociation::new(url(schema), PRIORITY_MANUAL, SOURCE_MANUAL);
        let glob = || AssociationRule::glob("**/*.toml").unwrap();

        associations.replace(glob(), manual("https://s/one.json"));
        associations.replace(glob(), manual("https://s/two.json"));
        associations.replace(AssociationRule::regex(r"\.toml$").unwrap(), manual("https://s/regex.json"));
        associations.replace(AssociationRule::regex(r"\.toml$").unwrap(), manual("https://s/regex2.json"));
        // Another source under the same rule is kept
        associations.add(glob(), SchemaAssociation::new(url("https://s/lsp.json"), 50, SOURCE_LSP_CONFIG));
        associations.replace(glob(), manual("https://s/three.json"));

        let urls: Vec<&str> = associations.list().iter().map(|(_, a)| a.url.as_str()).collect();
        assert_eq!(urls, ["https://s/regex2.json", "https://s/lsp.json", "https://s/three.json"]);

        assert!(glob().same_as(&glob()));
        assert!(!glob().same_as(&AssociationRule::glob("**/Cargo.toml").unwrap()));
        let document = AssociationRule::Url(url("file:///a.toml"));
        assert!(!glob().same_as(&document));
        assert!(document.same_as(&AssociationRule::Url(url("file:///a.toml"))));
    }

    #[test]
    fn test_lsp_config() {
        let mut config = SchemaConfig::default();
        config
            .associations
            .insert("Cargo.toml".into(), "https://s/cargo.json".into());
        config
            .associations
            .insert(r"regex:^file:///.*/pyproject\.toml$".into(), "https://s/py.json".into());
        config.associations.insert("regex:(".into(), "https://s/bad.json".into());

        let mut associations = SchemaAssociations::new();
        let errors = associations.add_from_lsp_config(&config, Some(Path::new("/work")));
        assert_eq!(errors.len(), 1);
        assert!(associations.association_for(&url("file:///work/Cargo.toml")).is_some());
        assert!(associations.association_for(&url("file:///other/Cargo.toml")).is_none());
        assert!(associations.association_for(&url("file:///x/pyproject.toml")).is_some());

        // Applying the settings again replaces the old associations.
        associations.add_from_lsp_config(&SchemaConfig::default(), None);
        assert!(associations.list().is_empty());
    }

    #[test]
    fn test_config_file() {
        let mut config = Config::from_toml(
            r#"
[schema]
url = "https://s/global.json"

[[rule]]
include = ["Cargo.toml"]
schema = { url = "https://s/cargo.json" }

[[rule]]
keys = ["dependencies"]
schema = { url = "https://s/ignored.json" }
"#,
            "taplo.toml",
        )
        .unwrap();
        config
            .prepare(&taplo_config::MemoryEnvironment::new(), Path::new("/work"))
            .unwrap();

        let mut associations = SchemaAssociations::new();
        associations.add_from_config(&config);
        associations.add_from_config(&config);
        assert_eq!(associations.list().len(), 2);
        assert_eq!(
            associations.association_for(&url("file:///work/Cargo.toml")).unwrap().url.as_str(),
            "https://s/cargo.json"
        );
        assert_eq!(
            associations.association_for(&url("file:///work/sub/a.toml")).unwrap().url.as_str(),
            "https://s/global.json"
        );
        assert!(associations.association_for(&url("file:///work/a.json")).is_none());
    }

    #[test]
    fn test_directive() {
        let document = url("file:///work/a.toml");
        let source = "# header\n#:schema ./schema.json\n\nkey = 1\n";
        assert_eq!(
            schema_directive(source, &document).unwrap().as_str(),
            "file:///work/schema.json"
        );
        assert!(schema_directive("key = 1\n#:schema x.json\n", &document).is_none());

        let mut associations = SchemaAssociations::new();
        associations.set_directive(&document, schema_directive(source, &document));
        associations.set_directive(&document, Some(url("https://s/d.json")));
        assert_eq!(associations.list().len(), 1);
        assert_eq!(associations.association_for(&document).unwrap().priority, PRIORITY_DIRECTIVE);
        associations.set_directive(&document, None);
        assert!(associations.list().is_empty());
    }
}
