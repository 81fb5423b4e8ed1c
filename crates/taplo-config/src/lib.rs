//! Configuration for TOML tooling, and the environment it runs in.
//!
//! - [`Config`] is a `.taplo.toml` file: which files are included, how they
//!   are formatted and which schemas apply, with per-file and per-key rules.
//! - [`LspConfig`] and [`InitConfig`] are the settings an editor sends.
//! - [`Environment`] abstracts the filesystem, network and clock.

mod config;
mod environment;
mod glob_rule;
mod lsp;

pub use config::{CONFIG_FILE_NAMES, Config, ConfigError, Rule, SchemaOptions};
pub use environment::{EnvError, Environment, MemoryEnvironment, NativeEnvironment};
pub use glob_rule::GlobRule;
pub use lsp::{
    CompletionConfig, ConfigFileConfig, InitConfig, LspConfig, SchemaCacheConfig, SchemaConfig,
    TaploConfig,
};
