use std::fmt;

use async_trait::async_trait;

use super::{Category, Document, SyncError};

/// The remote source of truth for document metadata.
///
/// Stores treat the remote as optional: they call it after a change has been applied
/// locally and degrade to cache-only operation when a call fails.
#[async_trait]
pub trait RemoteSource: fmt::Debug + Send + Sync {
    /// Lists every document the remote knows about.
    async fn list(&self) -> Result<Vec<Document>, SyncError>;

    /// Registers `document` and returns the remote's copy, including any fields the remote
    /// assigns itself (identifier, canonical path, size, upload date).
    async fn create(&self, document: &Document) -> Result<Document, SyncError>;

    /// Deletes the document stored under `filename`.
    async fn delete(&self, filename: &str) -> Result<(), SyncError>;

    /// Lists the categories the remote knows about. An empty list means the remote has no
    /// opinion and local categories are kept as they are.
    async fn categories(&self) -> Result<Vec<Category>, SyncError> {
        Ok(Vec::new())
    }

    /// Fetches the HTML content of `filename`.
    async fn content(&self, filename: &str) -> Result<String, SyncError> {
        Err(SyncError::Configuration(format!(
            "remote source cannot serve content (requested '{}')",
            filename
        )))
    }
}
