use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::{debug, instrument};

use super::CacheError;

const ENTRY_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Key-value persistence used as the local cache of a library.
///
/// Values are opaque strings; the stores above this layer put JSON in them.
#[async_trait]
pub trait KeyValueStore: fmt::Debug + Send + Sync {
    /// Returns the value stored under `key`, or `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Lists every key currently stored, in ascending order.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// Shared handle to a [`KeyValueStore`] with JSON helpers and a write lock.
///
/// Reads go straight to the backend. Writes must go through a [`CacheSession`] obtained from
/// [`Cache::acquire`], which holds the write lock until it is dropped.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn KeyValueStore>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Cache {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Cache {
            backend,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Reads and deserializes the value under `key`.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.backend.keys().await
    }

    /// Acquires the write lock. Writes issued through the returned session are serialized
    /// with every other session on this cache; the lock is released when it is dropped.
    pub async fn acquire(&self) -> CacheSession<'_> {
        let guard = self.write_lock.lock().await;
        CacheSession {
            backend: self.backend.as_ref(),
            _guard: guard,
        }
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend)
            .finish()
    }
}

/// Scoped write access to a [`Cache`].
pub struct CacheSession<'a> {
    backend: &'a dyn KeyValueStore,
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl CacheSession<'_> {
    pub async fn put_json<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend.remove(key).await
    }
}


/// In-memory [`KeyValueStore`]. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        MemoryStore {
            entries: Mutex::new(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}


/// [`KeyValueStore`] keeping one JSON file per key inside a directory.
///
/// Keys are escaped into file names: ASCII letters, digits, `-`, `_` and `.` are kept, every
/// other byte becomes `%XX`. Writes go to a temporary file that is then renamed over the
/// entry, so a crashed write never leaves a truncated entry behind.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens the store rooted at `root`, creating the directory if necessary.
    #[instrument(skip(root), fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        match fs::metadata(&root).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(CacheError::Unavailable(format!(
                    "cache path is not a directory: {}",
                    root.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Creating cache directory");
                fs::create_dir_all(&root).await?;
            }
            Err(e) => return Err(CacheError::Io(e)),
        }
        Ok(DirectoryStore { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION))
    }
}

#[async_trait]
impl KeyValueStore for DirectoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.entry_path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        fs::write(&temp, value).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::Io(e));
        }
        debug!(key, path = %path.display(), "Cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let suffix = format!(".{}", ENTRY_EXTENSION);
        let mut keys = Vec::new();
        let mut read_dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(encoded) = name.strip_suffix(&suffix) {
                if let Some(key) = decode_key(encoded) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// Keys become file names, so everything outside the URL-unreserved set is percent-encoded.
fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn decode_key(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|key| key.into_owned())
}
