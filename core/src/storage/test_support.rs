//! Test doubles for the cache and the remote source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CacheError, Category, Document, KeyValueStore, MemoryStore, RemoteSource, SyncError};

/// Memory-backed store whose writes can be made to fail on demand.
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.inner.keys().await
    }
}


#[derive(Debug, Default)]
struct RemoteState {
    documents: Vec<Document>,
    categories: Vec<Category>,
    deleted: Vec<String>,
    offline: bool,
    next_id: usize,
}

/// In-memory remote source that assigns ids and paths the way the HTTP backend does.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRemote {
    state: Mutex<RemoteState>,
}

impl ScriptedRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_documents(documents: Vec<Document>) -> Self {
        let remote = Self::new();
        remote.state.lock().unwrap().documents = documents;
        remote
    }

    pub(crate) fn set_categories(&self, categories: Vec<Category>) {
        self.state.lock().unwrap().categories = categories;
    }

    pub(crate) fn go_offline(&self) {
        self.state.lock().unwrap().offline = true;
    }

    pub(crate) fn documents(&self) -> Vec<Document> {
        self.state.lock().unwrap().documents.clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    fn online(&self) -> Result<std::sync::MutexGuard<'_, RemoteState>, SyncError> {
        let state = self.state.lock().unwrap();
        if state.offline {
            Err(SyncError::Unreachable("connection refused".to_string()))
        } else {
            Ok(state)
        }
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn list(&self) -> Result<Vec<Document>, SyncError> {
        Ok(self.online()?.documents.clone())
    }

    async fn create(&self, document: &Document) -> Result<Document, SyncError> {
        let mut state = self.online()?;
        state.next_id += 1;
        let mut acknowledged = document.clone();
        acknowledged.id = Some(format!("srv-{}", state.next_id));
        acknowledged.path = Some(format!("/uploads/{}", document.filename));
        acknowledged.file_size.get_or_insert(1024);
        state.documents.push(acknowledged.clone());
        Ok(acknowledged)
    }

    async fn delete(&self, filename: &str) -> Result<(), SyncError> {
        let mut state = self.online()?;
        state.documents.retain(|d| d.filename != filename);
        state.deleted.push(filename.to_string());
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<Category>, SyncError> {
        Ok(self.online()?.categories.clone())
    }

    async fn content(&self, filename: &str) -> Result<String, SyncError> {
        let state = self.online()?;
        if state.documents.iter().any(|d| d.filename == filename) {
            Ok(format!("<html><body>{}</body></html>", filename))
        } else {
            Err(SyncError::Status {
                status: 404,
                message: "File not found".to_string(),
            })
        }
    }
}
