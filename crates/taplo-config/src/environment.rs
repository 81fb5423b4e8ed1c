//! The host environment: filesystem, network, clock and process state.
//!
//! Everything that touches the outside world goes through [`Environment`],
//! so the engine can run natively, in a sandbox, or against in-memory files
//! in tests.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use url::Url;

use crate::CONFIG_FILE_NAMES;

/// An error reported by the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// Reading or writing a file failed.
    Io { path: PathBuf, message: String },
    /// A glob pattern is invalid.
    Glob { pattern: String, message: String },
    /// This environment cannot make network requests.
    FetchUnsupported { url: String },
    /// A network request failed.
    Fetch { url: String, message: String },
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::Io { path, message } => write!(f, "{}: {message}", path.display()),
            EnvError::Glob { pattern, message } => write!(f, "invalid glob `{pattern}`: {message}"),
            EnvError::FetchUnsupported { url } => {
                write!(f, "cannot fetch {url}: network access is not available")
            }
            EnvError::Fetch { url, message } => write!(f, "failed to fetch {url}: {message}"),
        }
    }
}

impl std::error::Error for EnvError {}

/// Capabilities supplied by the host.
pub trait Environment: Clone + Send + Sync + 'static {
    fn now(&self) -> SystemTime;

    fn env_var(&self, name: &str) -> Option<String>;

    fn env_vars(&self) -> Vec<(String, String)>;

    fn glob_files(&self, pattern: &str) -> Result<Vec<PathBuf>, EnvError>;

    fn is_absolute(&self, path: &Path) -> bool;

    /// Absolute current working directory.
    fn cwd(&self) -> Option<PathBuf>;

    fn to_file_path(&self, url: &Url) -> Option<PathBuf>;

    fn read_file(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, EnvError>> + Send;

    fn write_file(&self, path: &Path, bytes: &[u8]) -> impl Future<Output = Result<(), EnvError>> + Send;

    /// Search `from` and then each parent directory for a configuration
    /// file, trying the names in [`CONFIG_FILE_NAMES`] in order.
    fn find_config_file(&self, from: &Path) -> impl Future<Output = Option<PathBuf>> + Send {
        let from = from.to_path_buf();
        async move {
            for dir in from.ancestors() {
                for name in CONFIG_FILE_NAMES {
                    let candidate = dir.join(name);
                    if self.read_file(&candidate).await.is_ok() {
                        return Some(candidate);
                    }
                }
            }
            None
        }
    }

    /// Fetch the body of an `http(s)` URL.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, EnvError>> + Send {
        let url = url.to_string();
        async move { Err(EnvError::FetchUnsupported { url }) }
    }
}

/// The environment of a native process, backed by tokio and reqwest.
#[derive(Debug, Clone, Default)]
pub struct NativeEnvironment {
    client: reqwest::Client,
}

impl NativeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }
}

fn io_error(path: &Path, error: std::io::Error) -> EnvError {
    EnvError::Io {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

impl Environment for NativeEnvironment {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }

    fn glob_files(&self, pattern: &str) -> Result<Vec<PathBuf>, EnvError> {
        let paths = glob::glob_with(
            pattern,
            glob::MatchOptions {
                case_sensitive: true,
                ..Default::default()
            },
        )
        .map_err(|e| EnvError::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(paths.filter_map(Result::ok).collect())
    }

    fn is_absolute(&self, path: &Path) -> bool {
        path.is_absolute()
    }

    fn cwd(&self) -> Option<PathBuf> {
        std::env::current_dir().ok()
    }

    fn to_file_path(&self, url: &Url) -> Option<PathBuf> {
        url.to_file_path().ok()
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, EnvError> {
        tokio::fs::read(path).await.map_err(|e| io_error(path, e))
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), EnvError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(path, bytes).await.map_err(|e| io_error(path, e))
    }

    async fn find_config_file(&self, from: &Path) -> Option<PathBuf> {
        for dir in from.ancestors() {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, EnvError> {
        let fetch_error = |e: reqwest::Error| EnvError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;
        let body = response.bytes().await.map_err(fetch_error)?;
        Ok(body.to_vec())
    }
}

/// An environment that keeps files and network responses in memory.
///
/// Useful for embedding and tests. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryEnvironment {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, Vec<u8>>,
    responses: HashMap<String, Vec<u8>>,
    vars: HashMap<String, String>,
    fetches: usize,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.state().files.insert(path.into(), contents.into());
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    /// Serve `body` for requests to `url`.
    pub fn insert_response(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.state().responses.insert(url.to_string(), body.into());
    }

    pub fn set_var(&self, name: &str, value: &str) {
        self.state().vars.insert(name.to_string(), value.to_string());
    }

    /// How many times [`Environment::fetch`] was called.
    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }
}

impl Environment for MemoryEnvironment {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.state().vars.get(name).cloned()
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        self.state()
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn glob_files(&self, pattern: &str) -> Result<Vec<PathBuf>, EnvError> {
        let glob = glob::Pattern::new(pattern).map_err(|e| EnvError::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let mut paths: Vec<PathBuf> = self
            .state()
            .files
            .keys()
            .filter(|path| glob.matches_path(path))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn is_absolute(&self, path: &Path) -> bool {
        path.has_root()
    }

    fn cwd(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/"))
    }

    fn to_file_path(&self, url: &Url) -> Option<PathBuf> {
        (url.scheme() == "file").then(|| PathBuf::from(url.path()))
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, EnvError> {
        self.file(path).ok_or_else(|| EnvError::Io {
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        })
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), EnvError> {
        self.insert_file(path, bytes);
        Ok(())
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, EnvError> {
        let mut state = self.state();
        state.fetches += 1;
        state
            .responses
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| EnvError::Fetch {
                url: url.to_string(),
                message: "404 Not Found".to_string(),
            })
    }
}
