use std::sync::Mutex;

use async_trait::async_trait;
use folio_core::storage::{Category, Document, RemoteSource, SyncError};

/// Remote source backed by a vector, switchable offline.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    documents: Mutex<Vec<Document>>,
    categories: Mutex<Vec<Category>>,
    offline: Mutex<bool>,
}

#[allow(dead_code)]
impl InMemoryRemote {
    pub fn with_documents(documents: Vec<Document>) -> Self {
        InMemoryRemote {
            documents: Mutex::new(documents),
            ..Default::default()
        }
    }

    pub fn with_categories(self, categories: Vec<Category>) -> Self {
        *self.categories.lock().unwrap() = categories;
        self
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn filenames(&self) -> Vec<String> {
        self.documents.lock().unwrap().iter().map(|d| d.filename.clone()).collect()
    }

    fn check(&self) -> Result<(), SyncError> {
        if *self.offline.lock().unwrap() {
            Err(SyncError::Unreachable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteSource for InMemoryRemote {
    async fn list(&self) -> Result<Vec<Document>, SyncError> {
        self.check()?;
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn create(&self, document: &Document) -> Result<Document, SyncError> {
        self.check()?;
        let mut stored = document.clone();
        stored.path = Some(format!("/uploads/{}", document.filename));
        self.documents.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, filename: &str) -> Result<(), SyncError> {
        self.check()?;
        self.documents.lock().unwrap().retain(|d| d.filename != filename);
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<Category>, SyncError> {
        self.check()?;
        Ok(self.categories.lock().unwrap().clone())
    }
}
