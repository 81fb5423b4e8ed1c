//! Server state shared by all handlers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use taplo_config::{Config, ConfigError, Environment, InitConfig, LspConfig};
use taplo_format::{FormatterOptions, ScopedOptions};
use taplo_schema::{
    AssociationRule, PRIORITY_LSP_CONFIG, SOURCE_LSP_CONFIG, SchemaAssociation, SchemaAssociations,
    SchemaCache, SchemaError, schema_directive,
};
use tower_lsp::lsp_types::{FormattingOptions, Url};
use tracing::{debug, info, warn};

use crate::document::Document;

/// What the client said it supports during `initialize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientSupport {
    pub configuration: bool,
    pub watch_files: bool,
}

/// Everything the server knows. Lives behind one lock, so messages are
/// applied in the order they arrive.
pub struct Session<E: Environment> {
    pub env: E,
    pub documents: HashMap<Url, Document>,
    pub associations: SchemaAssociations,
    pub cache: SchemaCache<E>,
    /// The workspace configuration file, if one was found.
    pub config: Option<Config>,
    pub config_path: Option<PathBuf>,
    /// `rules` from the editor settings, prepared against the root.
    pub lsp_rules: Config,
    pub lsp_config: LspConfig,
    pub init_config: InitConfig,
    pub root: Option<Url>,
    pub client: ClientSupport,
}

impl<E: Environment> Session<E> {
    pub fn new(env: E) -> Self {
        Self {
            cache: SchemaCache::new(env.clone()),
            env,
            documents: HashMap::new(),
            associations: SchemaAssociations::new(),
            config: None,
            config_path: None,
            lsp_rules: Config::default(),
            lsp_config: LspConfig::default(),
            init_config: InitConfig::default(),
            root: None,
            client: ClientSupport::default(),
        }
    }

    pub fn root_path(&self) -> Option<PathBuf> {
        self.root.as_ref().and_then(|root| self.env.to_file_path(root))
    }

    /// The filesystem path of a document, or its URL path for other schemes.
    pub fn document_path(&self, uri: &Url) -> PathBuf {
        self.env
            .to_file_path(uri)
            .unwrap_or_else(|| PathBuf::from(uri.path()))
    }

    /// Start tracking a document, replacing any earlier state for it.
    pub fn open_document(&mut self, uri: &Url, text: String, version: i32) {
        self.associations
            .set_directive(uri, schema_directive(&text, uri));
        self.documents
            .insert(uri.clone(), Document::new(text, version));
    }

    /// Store a new version of an open document.
    ///
    /// Returns false, and changes nothing, if the document is not open or
    /// `version` is older than the stored one.
    pub fn update_document(&mut self, uri: &Url, text: String, version: i32) -> bool {
        let Some(current) = self.documents.get(uri) else {
            debug!(%uri, version, "ignoring change to a document that is not open");
            return false;
        };
        if version < current.version {
            debug!(%uri, version, current = current.version, "ignoring stale change");
            return false;
        }
        self.open_document(uri, text, version);
        true
    }

    pub fn close_document(&mut self, uri: &Url) {
        self.documents.remove(uri);
        self.associations.set_directive(uri, None);
    }

    /// The association that decides the schema of `uri`, unless schemas are
    /// turned off for it.
    pub fn association_for(&self, uri: &Url) -> Option<&SchemaAssociation> {
        if !self.lsp_config.schema.enabled {
            return None;
        }
        if let Some(config) = &self.config {
            let path = self.document_path(uri);
            if config.is_included(&path) && !config.is_schema_enabled(&path) {
                return None;
            }
        }
        self.associations.association_for(uri)
    }

    pub fn schema_for(&self, uri: &Url) -> Option<Url> {
        self.association_for(uri).map(|a| a.url.clone())
    }

    /// Formatting options for a document.
    ///
    /// Layers from lowest to highest: defaults, the editor's indentation,
    /// the editor's formatter settings and rules, then the configuration
    /// file when it includes the document.
    pub fn format_options(&self, uri: &Url, editor: &FormattingOptions) -> (FormatterOptions, ScopedOptions) {
        let path = self.document_path(uri);
        let mut options = FormatterOptions::default();
        options.indent_string = if editor.insert_spaces {
            " ".repeat(editor.tab_size as usize)
        } else {
            "\t".to_string()
        };
        options.update(&self.lsp_config.formatter);

        let mut scopes = ScopedOptions::new();
        self.lsp_rules
            .apply_format_options(&path, &mut options, &mut scopes);
        if let Some(config) = &self.config
            && config.is_included(&path)
        {
            config.apply_format_options(&path, &mut options, &mut scopes);
        }
        (options, scopes)
    }

    /// Find and load the configuration file, replacing the current one.
    pub async fn load_config(&mut self) -> Result<(), ConfigError> {
        self.config = None;
        self.config_path = None;
        self.associations
            .remove_source(taplo_schema::SOURCE_CONFIG_FILE);

        let settings = &self.lsp_config.taplo.config_file;
        if !settings.enabled {
            debug!("configuration file disabled");
            return Ok(());
        }

        let root = self.root_path();
        let path = match (&settings.path, &root) {
            (Some(path), Some(root)) if !self.env.is_absolute(path) => Some(root.join(path)),
            (Some(path), _) => Some(path.clone()),
            (None, Some(root)) => self.env.find_config_file(root).await,
            (None, None) => None,
        };
        let Some(path) = path else {
            debug!("no configuration file found");
            return Ok(());
        };

        let config = Config::load(&self.env, &path).await?;
        self.associations.add_from_config(&config);
        info!(path = %path.display(), "using configuration file");
        self.config = Some(config);
        self.config_path = Some(path);
        Ok(())
    }

    /// Apply the current editor settings: schema associations, cache
    /// lifetimes and rules.
    pub fn apply_lsp_config(&mut self) -> Vec<SchemaError> {
        let root = self.root_path();
        let schema = &self.lsp_config.schema;

        self.cache.set_expiration(
            Duration::from_secs(schema.cache.memory_expiration),
            Duration::from_secs(schema.cache.disk_expiration),
        );
        let mut errors = self
            .associations
            .add_from_lsp_config(schema, root.as_deref());

        let mut rules = Config::default();
        rules.rule = self.lsp_config.rules.clone();
        let base = root.clone().unwrap_or_else(|| PathBuf::from("/"));
        if let Err(error) = rules.prepare(&self.env, &base) {
            warn!(%error, "invalid rules in settings");
            rules = Config::default();
        }

        for rule in rules.rule.iter().filter(|r| r.keys.is_none()) {
            let Some(url) = rule.schema.as_ref().and_then(|s| s.url.clone()) else {
                continue;
            };
            let include = rule.include.clone().unwrap_or_else(|| vec!["**".to_string()]);
            let exclude = rule.exclude.clone().unwrap_or_default();
            match AssociationRule::globs(&include, &exclude) {
                Ok(glob) => self.associations.add(
                    glob,
                    SchemaAssociation::new(url, PRIORITY_LSP_CONFIG, SOURCE_LSP_CONFIG),
                ),
                Err(error) => errors.push(error),
            }
        }
        self.lsp_rules = rules;
        errors
    }

    /// Whether `path` is the configuration file in use, or could become one.
    pub fn is_config_file(&self, path: &Path) -> bool {
        self.config_path.as_deref() == Some(path)
            || path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| taplo_config::CONFIG_FILE_NAMES.contains(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use serde_json::json;
    use taplo_config::MemoryEnvironment;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn session() -> Session<MemoryEnvironment> {
        let mut session = Session::new(MemoryEnvironment::new());
        session.root = Some(uri("file:///project"));
        session
    }

    fn editor() -> FormattingOptions {
        FormattingOptions {
            tab_size: 4,
            insert_spaces: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_stale_update_is_ignored() {
        let mut session = session();
        let doc = uri("file:///project/a.toml");
        session.open_document(&doc, "a = 1".into(), 5);
        assert!(!session.update_document(&doc, "a = 2".into(), 3));
        assert_eq!(session.documents[&doc].text, "a = 1");
        assert!(session.update_document(&doc, "a = 3".into(), 6));
        assert_eq!(session.documents[&doc].version, 6);
    }

    #[test]
    fn test_change_needs_open_document() {
        let mut session = session();
        let doc = uri("file:///project/a.toml");
        assert!(!session.update_document(&doc, "a = 1\n".into(), 7));
        assert!(session.documents.is_empty());

        session.open_document(&doc, "a = 1\n".into(), 1);
        session.close_document(&doc);
        assert!(!session.update_document(&doc, "#:schema ./s.json\n".into(), 2));
        assert!(session.documents.is_empty());
        assert!(session.schema_for(&doc).is_none());
    }

    #[test]
    fn test_directive_association() {
        let mut session = session();
        let doc = uri("file:///project/a.toml");
        session.open_document(&doc, "#:schema ./schema.json\na = 1\n".into(), 1);
        assert_eq!(
            session.schema_for(&doc).unwrap().as_str(),
            "file:///project/schema.json"
        );

        session.close_document(&doc);
        assert!(session.schema_for(&doc).is_none());
    }

    #[tokio::test]
    async fn test_config_file_drives_schema_and_formatting() {
        let mut session = session();
        session.env.insert_file(
            "/project/.taplo.toml",
            r#"
[formatting]
column_width = 40

[schema]
url = "https://example.com/main.json"

[[rule]]
include = ["other/**"]
schema = { enabled = false }
"#,
        );
        session.load_config().await.unwrap();
        assert_eq!(
            session.config_path.as_deref(),
            Some(Path::new("/project/.taplo.toml"))
        );

        let main = uri("file:///project/a.toml");
        let other = uri("file:///project/other/b.toml");
        assert_eq!(
            session.schema_for(&main).unwrap().as_str(),
            "https://example.com/main.json"
        );
        assert!(session.schema_for(&other).is_none());

        let (options, _) = session.format_options(&main, &editor());
        assert_eq!(options.column_width, 40);
        assert_eq!(options.indent_string, "    ");
    }

    #[test]
    fn test_lsp_settings() {
        let mut session = session();
        session
            .lsp_config
            .update_from_json(&json!({
                "schema": {
                    "associations": { "*.conf.toml": "https://example.com/conf.json" },
                    "cache": { "memoryExpiration": 5 }
                },
                "formatter": { "alignEntries": true },
                "rules": [
                    { "include": ["ci/**"], "schema": { "url": "https://example.com/ci.json" } },
                    { "keys": ["deps"], "formatting": { "reorder_keys": true } }
                ]
            }))
            .unwrap();
        assert!(session.apply_lsp_config().is_empty());

        assert_eq!(
            session
                .schema_for(&uri("file:///project/x.conf.toml"))
                .unwrap()
                .as_str(),
            "https://example.com/conf.json"
        );
        assert_eq!(
            session
                .schema_for(&uri("file:///project/ci/build.toml"))
                .unwrap()
                .as_str(),
            "https://example.com/ci.json"
        );

        let doc = uri("file:///project/a.toml");
        let (options, scopes) = session.format_options(&doc, &editor());
        assert!(options.align_entries);
        assert!(scopes.resolve(&options, &["deps".into()]).reorder_keys);

        session
            .lsp_config
            .update_from_json(&json!({ "schema": { "enabled": false } }))
            .unwrap();
        assert!(
            session
                .schema_for(&uri("file:///project/x.conf.toml"))
                .is_none()
        );
    }

    #[test]
    fn test_is_config_file() {
        let session = session();
        assert!(session.is_config_file(Path::new("/project/taplo.toml")));
        assert!(session.is_config_file(Path::new("/project/sub/.taplo.toml")));
        assert!(!session.is_config_file(Path::new("/project/Cargo.toml")));
    }
}
