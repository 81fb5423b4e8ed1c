//! The `.taplo.toml` configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taplo_format::{FormatterOptions, OptionsIncomplete, ScopedOptions};
use tracing::debug;
use url::Url;

use crate::environment::{EnvError, Environment};
use crate::glob_rule::{GlobRule, normalize};

/// File names searched for, in order, when looking for a configuration file.
pub const CONFIG_FILE_NAMES: &[&str] = &[".taplo.toml", "taplo.toml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Read(EnvError),
    /// The file has syntax or semantic errors. Each entry is a rendered
    /// diagnostic.
    Invalid { diagnostics: Vec<String> },
    /// The document does not have the shape of a configuration.
    Deserialize(String),
    /// A glob pattern could not be compiled.
    Pattern { pattern: String, message: String },
    /// A schema path could not be turned into a URL.
    SchemaPath(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(error) => write!(f, "failed to read configuration: {error}"),
            ConfigError::Invalid { diagnostics } => {
                writeln!(f, "invalid configuration file:")?;
                for diagnostic in diagnostics {
                    writeln!(f, "{diagnostic}")?;
                }
                Ok(())
            }
            ConfigError::Deserialize(message) => write!(f, "invalid configuration: {message}"),
            ConfigError::Pattern { pattern, message } => {
                write!(f, "invalid glob pattern `{pattern}`: {message}")
            }
            ConfigError::SchemaPath(path) => write!(f, "invalid schema path `{path}`"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<EnvError> for ConfigError {
    fn from(error: EnvError) -> Self {
        ConfigError::Read(error)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Files to include. Omitting this includes every TOML file, an empty
    /// list includes none.
    pub include: Option<Vec<String>>,
    /// Files to exclude. Takes precedence over `include`.
    pub exclude: Option<Vec<String>>,
    pub formatting: Option<OptionsIncomplete>,
    pub schema: Option<SchemaOptions>,
    /// Overrides by file path and document key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule: Vec<Rule>,

    #[serde(skip)]
    file_rule: Option<GlobRule>,
}

/// Overrides for files and keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub name: Option<String>,
    /// Files this rule applies to. Defaults to all files.
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    /// Dotted key globs, e.g. `dependencies.*`. The rule applies to the
    /// matched keys and everything below them. Schemas of rules with keys
    /// are ignored.
    pub keys: Option<Vec<String>>,
    pub formatting: Option<OptionsIncomplete>,
    pub schema: Option<SchemaOptions>,

    #[serde(skip)]
    file_rule: Option<GlobRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaOptions {
    /// Defaults to true.
    pub enabled: Option<bool>,
    /// A local path to the schema. Takes precedence over `url`.
    pub path: Option<String>,
    /// Supported schemes are `http`, `https`, `file` and `taplo`.
    pub url: Option<Url>,
}

impl SchemaOptions {
    fn prepare(&mut self, env: &impl Environment, base: &Path) -> Result<(), ConfigError> {
        let Some(path) = self.path.take() else {
            return Ok(());
        };
        if let Ok(url) = Url::parse(&path)
            && url.scheme().len() > 1
        {
            self.url = Some(url);
            return Ok(());
        }
        let absolute = if env.is_absolute(Path::new(&path)) {
            PathBuf::from(&path)
        } else {
            normalize(&base.join(&path))
        };
        let url = Url::from_file_path(&absolute)
            .or_else(|()| Url::parse(&format!("file://{}", absolute.to_string_lossy())))
            .map_err(|_| ConfigError::SchemaPath(path))?;
        self.url = Some(url);
        Ok(())
    }
}

fn make_absolute(env: &impl Environment, base: &Path, patterns: &mut Option<Vec<String>>) {
    for pattern in patterns.iter_mut().flatten() {
        if !env.is_absolute(Path::new(pattern.as_str())) {
            *pattern = normalize(&base.join(pattern.as_str()))
                .to_string_lossy()
                .into_owned();
        }
    }
}

fn file_rule(include: &Option<Vec<String>>, exclude: &Option<Vec<String>>, default: &str) -> Result<GlobRule, ConfigError> {
    let default = [default.to_string()];
    GlobRule::new(
        include.as_deref().unwrap_or(&default),
        exclude.as_deref().unwrap_or(&[]),
    )
}

impl Rule {
    fn prepare(&mut self, env: &impl Environment, base: &Path) -> Result<(), ConfigError> {
        make_absolute(env, base, &mut self.include);
        make_absolute(env, base, &mut self.exclude);
        self.file_rule = Some(file_rule(&self.include, &self.exclude, "**")?);
        if let Some(schema) = &mut self.schema {
            schema.prepare(env, base)?;
        }
        Ok(())
    }

    /// Whether the rule applies to the file at `path`. Rules that were
    /// not prepared apply everywhere.
    pub fn is_included(&self, path: &Path) -> bool {
        self.file_rule.as_ref().is_none_or(|r| r.is_match(path))
    }
}

impl Config {
    /// Parse a configuration file.
    ///
    /// The file goes through the regular TOML pipeline; any syntax or
    /// semantic error makes the whole configuration invalid.
    pub fn from_toml(source: &str, filename: &str) -> Result<Self, ConfigError> {
        let (parse, dom) = taplo_dom::parse(source);
        let mut diagnostics: Vec<String> = parse
            .errors()
            .iter()
            .map(|e| taplo_dom::render_parse_error(e, filename, source))
            .collect();
        diagnostics.extend(dom.errors().iter().map(|e| e.render(filename, source)));
        if !diagnostics.is_empty() {
            return Err(ConfigError::Invalid { diagnostics });
        }

        let value = taplo_convert::to_value(&dom).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Read, parse and prepare the configuration file at `path`.
    pub async fn load(env: &impl Environment, path: &Path) -> Result<Self, ConfigError> {
        let bytes = env.read_file(path).await?;
        let source = String::from_utf8_lossy(&bytes);
        let mut config = Config::from_toml(&source, &path.to_string_lossy())?;
        let base = path.parent().unwrap_or(Path::new("/"));
        config.prepare(env, base)?;
        debug!(path = %path.display(), rules = config.rule.len(), "loaded configuration");
        Ok(config)
    }

    /// Make relative paths absolute against `base` and compile the globs.
    pub fn prepare(&mut self, env: &impl Environment, base: &Path) -> Result<(), ConfigError> {
        make_absolute(env, base, &mut self.include);
        make_absolute(env, base, &mut self.exclude);
        self.file_rule = Some(file_rule(&self.include, &self.exclude, "**/*.toml")?);
        if let Some(schema) = &mut self.schema {
            schema.prepare(env, base)?;
        }
        for rule in &mut self.rule {
            rule.prepare(env, base)?;
        }
        Ok(())
    }

    /// Whether the file at `path` is covered by this configuration.
    pub fn is_included(&self, path: &Path) -> bool {
        match &self.file_rule {
            Some(rule) => rule.is_match(path),
            None => {
                debug!("configuration was not prepared");
                false
            }
        }
    }

    pub fn rules_for<'r>(&'r self, path: &'r Path) -> impl DoubleEndedIterator<Item = &'r Rule> + 'r {
        self.rule.iter().filter(move |r| r.is_included(path))
    }

    /// Formatting options for a file, and the key-scoped overrides of rules
    /// with `keys`.
    pub fn format_options(&self, path: &Path) -> (FormatterOptions, ScopedOptions) {
        let mut options = FormatterOptions::default();
        let mut scopes = ScopedOptions::new();
        self.apply_format_options(path, &mut options, &mut scopes);
        (options, scopes)
    }

    /// Layer this configuration's formatting for `path` over `options`,
    /// adding key-scoped overrides to `scopes`.
    pub fn apply_format_options(&self, path: &Path, options: &mut FormatterOptions, scopes: &mut ScopedOptions) {
        if let Some(formatting) = &self.formatting {
            options.update(formatting);
        }

        for rule in self.rules_for(path) {
            let Some(formatting) = &rule.formatting else {
                continue;
            };
            match &rule.keys {
                None => options.update(formatting),
                Some(keys) => {
                    for key in keys {
                        scopes.add(key, formatting.clone());
                    }
                }
            }
        }
    }

    pub fn is_schema_enabled(&self, path: &Path) -> bool {
        let enabled = |schema: &Option<SchemaOptions>| {
            schema.as_ref().and_then(|s| s.enabled).unwrap_or(true)
        };
        enabled(&self.schema)
            && self
                .rules_for(path)
                .filter(|r| r.keys.is_none())
                .all(|r| enabled(&r.schema))
    }

    /// The schema for a file: that of the last matching rule without keys,
    /// or the global one.
    pub fn schema_for(&self, path: &Path) -> Option<Url> {
        if !self.is_schema_enabled(path) {
            return None;
        }
        self.rules_for(path)
            .filter(|r| r.keys.is_none())
            .rev()
            .find_map(|r| r.schema.as_ref()?.url.clone())
            .or_else(|| self.schema.as_ref()?.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryEnvironment;
    use facet_testhelpers::test;

    const CONFIG: &str = r#"
include = ["src/**/*.toml", "Cargo.toml"]
exclude = ["src/generated/**"]

[formatting]
align_entries = true
column_width = 100

[schema]
path = "schemas/main.json"

[[rule]]
name = "cargo"
include = ["Cargo.toml"]
formatting = { reorder_keys = true }
schema = { url = "https://example.com/cargo.json" }

[[rule]]
keys = ["dependencies"]
formatting = { align_entries = false }
"#;

    fn config() -> Config {
        let mut config = Config::from_toml(CONFIG, ".taplo.toml").unwrap();
        config
            .prepare(&MemoryEnvironment::new(), Path::new("/project"))
            .unwrap();
        config
    }

    #[test]
    fn test_include_exclude() {
        let config = config();
        assert!(config.is_included(Path::new("/project/Cargo.toml")));
        assert!(config.is_included(Path::new("/project/src/a/b.toml")));
        assert!(!config.is_included(Path::new("/project/src/generated/x.toml")));
        assert!(!config.is_included(Path::new("/elsewhere/Cargo.toml")));
    }

    #[test]
    fn test_default_include() {
        let mut config = Config::from_toml("", "taplo.toml").unwrap();
        config.prepare(&MemoryEnvironment::new(), Path::new("/p")).unwrap();
        assert!(config.is_included(Path::new("/anywhere/x.toml")));
        assert!(!config.is_included(Path::new("/anywhere/x.json")));
    }

    #[test]
    fn test_format_options() {
        let config = config();
        let (options, scopes) = config.format_options(Path::new("/project/Cargo.toml"));
        assert!(options.align_entries);
        assert!(options.reorder_keys);
        assert_eq!(options.column_width, 100);

        let deps = scopes.resolve(&options, &["dependencies".into(), "serde".into()]);
        assert!(!deps.align_entries);

        let (options, _) = config.format_options(Path::new("/project/src/x.toml"));
        assert!(!options.reorder_keys);
    }

    #[test]
    fn test_schema_for() {
        let config = config();
        assert_eq!(
            config.schema_for(Path::new("/project/Cargo.toml")).unwrap().as_str(),
            "https://example.com/cargo.json"
        );
        assert_eq!(
            config.schema_for(Path::new("/project/src/x.toml")).unwrap().as_str(),
            "file:///project/schemas/main.json"
        );

        let mut disabled = Config::from_toml("[schema]\nenabled = false\nurl = \"taplo://taplo.toml\"\n", "t").unwrap();
        disabled.prepare(&MemoryEnvironment::new(), Path::new("/")).unwrap();
        assert_eq!(disabled.schema_for(Path::new("/x.toml")), None);
    }

    #[test]
    fn test_invalid_config() {
        let Err(ConfigError::Invalid { diagnostics }) = Config::from_toml("a = 1\na = 2\n", "bad.toml") else {
            panic!("expected an invalid configuration");
        };
        assert_eq!(diagnostics.len(), 1);
        let plain = String::from_utf8(strip_ansi_escapes::strip(diagnostics[0].as_bytes())).unwrap();
        assert!(plain.contains("duplicate key `a`"));

        assert!(matches!(
            Config::from_toml("unknown = 1\n", "t"),
            Err(ConfigError::Deserialize(_))
        ));
    }

    #[test]
    fn test_load() {
        let env = MemoryEnvironment::new();
        env.insert_file("/w/.taplo.toml", "exclude = [\"target/**\"]\n");
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let config = runtime
            .block_on(Config::load(&env, Path::new("/w/.taplo.toml")))
            .unwrap();
        assert!(!config.is_included(Path::new("/w/target/a.toml")));
        assert!(config.is_included(Path::new("/w/a.toml")));
    }
}
