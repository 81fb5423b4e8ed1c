//! Loading schemas, with an in-memory and an optional on-disk cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use taplo_config::Environment;
use tracing::{debug, trace, warn};
use url::Url;

use crate::SchemaError;
use crate::builtin::builtin_schema;
use crate::resolver::{SchemaResolver, external_refs};

/// Where a schema is in its lifecycle. URLs the cache has never seen, or
/// that were invalidated, are [`SchemaState::Unresolved`].
#[derive(Debug, Clone)]
pub enum SchemaState {
    Unresolved,
    Fetching,
    Cached { schema: Arc<Value>, fetched_at: SystemTime },
    FetchFailed { error: SchemaError, at: SystemTime },
}

/// The on-disk form of a cached schema.
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    url: String,
    /// Seconds since the Unix epoch.
    fetched_at: u64,
    schema: Value,
}

#[derive(Debug)]
struct CacheInner {
    states: HashMap<Url, SchemaState>,
    memory_ttl: Duration,
    disk_ttl: Duration,
    cache_path: Option<PathBuf>,
}

/// Schemas by URL. Clones share the same cache.
#[derive(Debug, Clone)]
pub struct SchemaCache<E: Environment> {
    env: E,
    inner: Arc<Mutex<CacheInner>>,
}

const DEFAULT_TTL: Duration = Duration::from_secs(600);

impl<E: Environment> SchemaCache<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            inner: Arc::new(Mutex::new(CacheInner {
                states: HashMap::new(),
                memory_ttl: DEFAULT_TTL,
                disk_ttl: DEFAULT_TTL,
                cache_path: None,
            })),
        }
    }

    /// The platform cache directory for schemas, if there is one.
    pub fn default_cache_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("taplo"))
    }

    fn inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep fetched schemas under `path` as well. `None` disables the
    /// disk cache.
    pub fn set_cache_path(&self, path: Option<PathBuf>) {
        self.inner().cache_path = path;
    }

    pub fn set_expiration(&self, memory: Duration, disk: Duration) {
        let mut inner = self.inner();
        inner.memory_ttl = memory;
        inner.disk_ttl = disk;
    }

    pub fn state(&self, url: &Url) -> SchemaState {
        self.inner()
            .states
            .get(url)
            .cloned()
            .unwrap_or(SchemaState::Unresolved)
    }

    /// The schema at `url` if it is cached, however old.
    pub fn cached(&self, url: &Url) -> Option<Arc<Value>> {
        match self.inner().states.get(url)? {
            SchemaState::Cached { schema, .. } => Some(schema.clone()),
            _ => None,
        }
    }

    /// Whether an entry from `at` has outlived the memory expiration.
    pub fn is_expired(&self, at: SystemTime) -> bool {
        let ttl = self.inner().memory_ttl;
        self.env
            .now()
            .duration_since(at)
            .is_ok_and(|age| age >= ttl)
    }

    pub fn invalidate(&self, url: &Url) {
        self.inner().states.remove(url);
    }

    pub fn invalidate_all(&self) {
        self.inner().states.clear();
    }

    /// Load the schema at `url` unless it expired from memory.
    pub async fn get(&self, url: &Url) -> Result<Arc<Value>, SchemaError> {
        self.load(url, |at| self.is_expired(at)).await
    }

    /// Load the schema at `url`.
    ///
    /// A cached schema, or a cached failure, is returned as is unless
    /// `needs_update` says that the entry from that time is stale.
    pub async fn load(
        &self,
        url: &Url,
        needs_update: impl FnOnce(SystemTime) -> bool,
    ) -> Result<Arc<Value>, SchemaError> {
        let current = self.state(url);
        let settled_at = match &current {
            SchemaState::Cached { fetched_at, .. } => Some(*fetched_at),
            SchemaState::FetchFailed { at, .. } => Some(*at),
            SchemaState::Fetching => {
                trace!(%url, "schema is already being fetched");
                None
            }
            SchemaState::Unresolved => None,
        };
        if settled_at.is_some_and(|at| !needs_update(at)) {
            match current {
                SchemaState::Cached { schema, .. } => return Ok(schema),
                SchemaState::FetchFailed { error, .. } => return Err(error),
                _ => {}
            }
        }

        let cache_path = {
            let mut inner = self.inner();
            inner.states.insert(url.clone(), SchemaState::Fetching);
            inner.cache_path.clone()
        };

        let result = self.fetch(url, cache_path.as_deref()).await;

        let mut inner = self.inner();
        match result {
            Ok((schema, fetched_at)) => {
                let schema = Arc::new(schema);
                inner.states.insert(
                    url.clone(),
                    SchemaState::Cached {
                        schema: schema.clone(),
                        fetched_at,
                    },
                );
                Ok(schema)
            }
            Err(error) => {
                warn!(%url, %error, "failed to load schema");
                inner.states.insert(
                    url.clone(),
                    SchemaState::FetchFailed {
                        error: error.clone(),
                        at: self.env.now(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Load the schema at `url` and every schema it refers to.
    ///
    /// Referenced schemas that fail to load are left out, so references
    /// into them resolve to nothing.
    pub async fn resolver(&self, url: &Url) -> Result<(Arc<Value>, SchemaResolver), SchemaError> {
        let root = self.get(url).await?;
        let mut resolver = SchemaResolver::with_base(url.clone());

        let mut seen = vec![url.clone()];
        let mut pending = external_refs(&root, url);
        while let Some(next) = pending.pop() {
            if seen.contains(&next) {
                continue;
            }
            seen.push(next.clone());
            match self.get(&next).await {
                Ok(schema) => {
                    pending.extend(external_refs(&schema, &next));
                    resolver.insert(next, schema);
                }
                Err(error) => debug!(url = %next, %error, "referenced schema unavailable"),
            }
        }
        Ok((root, resolver))
    }

    async fn fetch(&self, url: &Url, cache_path: Option<&Path>) -> Result<(Value, SystemTime), SchemaError> {
        let remote = matches!(url.scheme(), "http" | "https");
        if remote
            && let Some(cache_path) = cache_path
            && let Some(cached) = self.read_disk(cache_path, url).await
        {
            return Ok(cached);
        }

        let bytes = match url.scheme() {
            "taplo" => return Ok((builtin_schema(url)?, self.env.now())),
            "file" => {
                let path = self
                    .env
                    .to_file_path(url)
                    .ok_or_else(|| SchemaError::UnsupportedScheme {
                        url: url.to_string(),
                    })?;
                self.env.read_file(&path).await?
            }
            "http" | "https" => self.env.fetch(url).await?,
            _ => {
                return Err(SchemaError::UnsupportedScheme {
                    url: url.to_string(),
                });
            }
        };
        debug!(%url, bytes = bytes.len(), "fetched schema");

        let schema: Value = serde_json::from_slice(&bytes).map_err(|e| SchemaError::InvalidJson {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let fetched_at = self.env.now();
        if remote && let Some(cache_path) = cache_path {
            self.write_disk(cache_path, url, &schema, fetched_at).await;
        }
        Ok((schema, fetched_at))
    }

    async fn read_disk(&self, cache_path: &Path, url: &Url) -> Option<(Value, SystemTime)> {
        let bytes = self.env.read_file(&disk_path(cache_path, url)).await.ok()?;
        let entry: DiskEntry = serde_json::from_slice(&bytes).ok()?;
        if entry.url != url.as_str() {
            return None;
        }
        let fetched_at = UNIX_EPOCH + Duration::from_secs(entry.fetched_at);
        let ttl = self.inner().disk_ttl;
        let fresh = self
            .env
            .now()
            .duration_since(fetched_at)
            .is_ok_and(|age| age < ttl);
        if !fresh {
            return None;
        }
        debug!(%url, "schema loaded from disk cache");
        Some((entry.schema, fetched_at))
    }

    async fn write_disk(&self, cache_path: &Path, url: &Url, schema: &Value, fetched_at: SystemTime) {
        let entry = DiskEntry {
            url: url.to_string(),
            fetched_at: fetched_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            schema: schema.clone(),
        };
        let Ok(bytes) = serde_json::to_vec(&entry) else {
            return;
        };
        if let Err(error) = self.env.write_file(&disk_path(cache_path, url), &bytes).await {
            warn!(%url, %error, "failed to write schema cache");
        }
    }
}

/// `cache_path/schemas/<sha256 of the url>.json`
fn disk_path(cache_path: &Path, url: &Url) -> PathBuf {
    let hash = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    cache_path.join("schemas").join(format!("{hash}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taplo_config::MemoryEnvironment;

    const SCHEMA_URL: &str = "https://example.com/schema.json";

    fn env_with_schema() -> MemoryEnvironment {
        let env = MemoryEnvironment::new();
        env.insert_response(SCHEMA_URL, r#"{ "type": "object" }"#);
        env
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let env = env_with_schema();
        let cache = SchemaCache::new(env.clone());
        let url = Url::parse(SCHEMA_URL).unwrap();
        assert!(matches!(cache.state(&url), SchemaState::Unresolved));

        let schema = cache.get(&url).await.unwrap();
        assert_eq!(schema["type"], "object");
        cache.get(&url).await.unwrap();
        assert_eq!(env.fetch_count(), 1);
        assert!(matches!(cache.state(&url), SchemaState::Cached { .. }));

        // The caller decides when an entry is stale.
        cache.load(&url, |_| true).await.unwrap();
        assert_eq!(env.fetch_count(), 2);

        cache.invalidate(&url);
        assert!(matches!(cache.state(&url), SchemaState::Unresolved));
        cache.get(&url).await.unwrap();
        assert_eq!(env.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_cached() {
        let env = MemoryEnvironment::new();
        let cache = SchemaCache::new(env.clone());
        let url = Url::parse("https://example.com/missing.json").unwrap();

        assert!(matches!(cache.get(&url).await, Err(SchemaError::Env(_))));
        assert!(matches!(cache.state(&url), SchemaState::FetchFailed { .. }));
        assert!(cache.get(&url).await.is_err());
        assert_eq!(env.fetch_count(), 1);

        env.insert_response(url.as_str(), "{}");
        cache.invalidate_all();
        assert!(cache.get(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_schemes() {
        let env = MemoryEnvironment::new();
        env.insert_file("/schemas/local.json", r#"{ "title": "local" }"#);
        env.insert_file("/schemas/broken.json", "{");
        let cache = SchemaCache::new(env.clone());

        let local = cache.get(&Url::parse("file:///schemas/local.json").unwrap()).await.unwrap();
        assert_eq!(local["title"], "local");
        let builtin = cache.get(&Url::parse("taplo://taplo.toml").unwrap()).await.unwrap();
        assert!(builtin["properties"]["rule"].is_object());

        assert!(matches!(
            cache.get(&Url::parse("file:///schemas/broken.json").unwrap()).await,
            Err(SchemaError::InvalidJson { .. })
        ));
        assert!(matches!(
            cache.get(&Url::parse("ftp://example.com/s.json").unwrap()).await,
            Err(SchemaError::UnsupportedScheme { .. })
        ));
        assert_eq!(env.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_disk_cache() {
        let env = env_with_schema();
        let cache = SchemaCache::new(env.clone());
        cache.set_cache_path(Some(PathBuf::from("/cache")));
        let url = Url::parse(SCHEMA_URL).unwrap();

        cache.get(&url).await.unwrap();
        let stored = env.file(&disk_path(Path::new("/cache"), &url)).unwrap();
        let stored: Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(stored["url"], SCHEMA_URL);
        assert_eq!(stored["schema"]["type"], "object");

        cache.invalidate_all();
        cache.get(&url).await.unwrap();
        assert_eq!(env.fetch_count(), 1);

        cache.set_expiration(Duration::from_secs(600), Duration::ZERO);
        cache.invalidate_all();
        cache.get(&url).await.unwrap();
        assert_eq!(env.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_resolver_loads_references() {
        let env = MemoryEnvironment::new();
        env.insert_response(
            "https://example.com/main.json",
            r#"{ "properties": { "a": { "$ref": "defs.json#/definitions/a" } } }"#,
        );
        env.insert_response(
            "https://example.com/defs.json",
            r#"{ "definitions": { "a": { "$ref": "more.json" } } }"#,
        );
        env.insert_response("https://example.com/more.json", r#"{ "type": "string" }"#);
        let cache = SchemaCache::new(env.clone());

        let url = Url::parse("https://example.com/main.json").unwrap();
        let (root, resolver) = cache.resolver(&url).await.unwrap();
        let scope = resolver.root_scope(&root);
        let (scope, target, _) = resolver.resolve(scope, "defs.json#/definitions/a").unwrap();
        let (_, target, _) = resolver.resolve(scope, target["$ref"].as_str().unwrap()).unwrap();
        assert_eq!(target["type"], "string");
        assert_eq!(env.fetch_count(), 3);
    }
}
