//! Key-value store backends
//!
//! The handler only ever needs `get` and `put` on string keys. There is no
//! compare-and-swap: two writers that read the same value will both write,
//! and the later write wins.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use statskv_common::{StatsRecord, StoreBackend, StoreConfig, STATS_KEY};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid key '{0}'")]
    InvalidKey(String),

    #[error("IO error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("value under key '{key}' is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Raw stored value, `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Short name for logs
    fn backend_name(&self) -> &'static str;

    /// Stored value parsed as JSON; an absent key reads as `null`
    async fn get_json(&self, key: &str) -> Result<Value, StoreError> {
        match self.get(key).await? {
            None => Ok(Value::Null),
            Some(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Keys become file names, so only a safe alphabet is accepted
fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Process-local store, lost on restart
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        validate_key(key)?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// One file per key under a directory
pub struct FileStore {
    root: PathBuf,
    /// Suffix for temp files, so concurrent writes never share one
    next_tmp: AtomicU64,
}

impl FileStore {
    /// Open the store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::Io {
                key: root.display().to_string(),
                source,
            })?;
        Ok(Self {
            root,
            next_tmp: AtomicU64::new(0),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Valid keys never contain '.', so the temp name cannot shadow a key
        let seq = self.next_tmp.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq));
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        tokio::fs::write(&tmp, value).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

/// Build the backend selected in the configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>, StoreError> {
    let store: Arc<dyn KvStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(&config.path).await?),
    };
    Ok(store)
}

/// Write a zeroed stats record if none exists yet.
///
/// Returns whether a record was written.
pub async fn seed_stats(store: &dyn KvStore) -> Result<bool, StoreError> {
    if store.get(STATS_KEY).await?.is_some() {
        return Ok(false);
    }

    let record = StatsRecord::zeroed(Utc::now());
    store.put(STATS_KEY, record.to_json_string()?).await?;
    info!("Seeded empty '{}' record", STATS_KEY);
    Ok(true)
}
