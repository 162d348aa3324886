//! Document metadata storage: the collections a library owns, how they are cached, and how
//! they are reconciled with a remote source of truth.
//!
//! # Core Concepts
//!
//! *   **[`Library`]:** The root container. It owns one [`MetadataStore`] and one
//!     [`CategoryRegistry`], shares a cache handle and an optional remote source between them,
//!     and coordinates the operations that touch more than one collection (removing a category,
//!     deleting a document together with its version history). A library is an explicit value
//!     created with [`Library::init`] and passed by reference; there is no global instance.
//! *   **[`MetadataStore`]:** The sole writer of the [`Document`] collection. Every mutation is
//!     applied in memory first, so it is visible to the next read without waiting for any I/O,
//!     and is then written to the cache. Remote failures degrade the store to cache-only
//!     operation instead of failing the call.
//! *   **[`CategoryRegistry`]:** The set of [`Category`] buckets. The sentinel category
//!     [`OTHER_CATEGORY`] always exists and cannot be removed.
//! *   **[`KeyValueStore`]:** The cache capability. [`MemoryStore`] keeps everything in memory;
//!     [`DirectoryStore`] keeps one JSON file per key inside a directory.
//! *   **[`RemoteSource`]:** The remote metadata capability. The HTTP implementation lives in
//!     the `folio_extensions` crate.
//!
//! # Cache Layout
//!
//! | key                  | value                                      |
//! |----------------------|--------------------------------------------|
//! | `documents`          | JSON array of [`Document`] records         |
//! | `categories`         | JSON array of [`Category`] records         |
//! | `versions:<filename>`| JSON array of version snapshots, newest first |
//!
//! # Errors
//!
//! Caller-facing failures ([`Error::Validation`], [`Error::NotFound`], [`Error::Integrity`])
//! reject an operation without touching in-memory state. A cache write failure
//! ([`Error::Cache`]) rolls back the in-memory change before it is returned, so each public
//! operation either fully applies or fully rejects.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use folio_core::storage::{Document, Library, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut library = Library::init(Arc::new(MemoryStore::new()), None).await;
//!
//!     let doc = Document::new("demo.html")
//!         .with_category("portfolio")
//!         .with_tags(["Blue", "design"]);
//!     library.create_document(doc).await?;
//!
//!     assert_eq!(library.documents().list().len(), 1);
//!     Ok(())
//! }
//! ```

pub use self::cache::{Cache, CacheSession, DirectoryStore, KeyValueStore, MemoryStore};
pub use self::category::{
    CategoriesChanged, Category, CategoryChange, CategoryEvents, CategoryRegistry,
};
pub use self::document::{Document, DocumentPatch, Tags, UploadReceipt};
pub use self::library::Library;
pub use self::metadata::{
    DocumentChange, DocumentEvents, DocumentsChanged, LoadSource, MetadataStore,
};
pub use self::remote::RemoteSource;

mod cache;
mod category;
mod document;
mod library;
mod metadata;
mod remote;

#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

/// Id of the fallback category. Always present, never removable.
pub const OTHER_CATEGORY: &str = "other";

/// Cache key of the document collection.
pub const DOCUMENTS_KEY: &str = "documents";

/// Cache key of the category collection.
pub const CATEGORIES_KEY: &str = "categories";

/// Cache key holding the version snapshots of `filename`.
pub fn versions_key(filename: &str) -> String {
    format!("versions:{}", filename)
}


/// Failure talking to the remote metadata source.
///
/// Stores recover from these locally; they only reach callers that use a
/// [`RemoteSource`] directly.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote source unreachable: {0}")]
    Unreachable(String),

    #[error("Remote source returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Remote source returned an unreadable body: {0}")]
    InvalidResponse(String),

    #[error("Remote source is misconfigured: {0}")]
    Configuration(String),
}

/// Failure reading or writing the persistent cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache serialization/deserialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache IO error")]
    Io(#[from] std::io::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Remote sync failed")]
    Sync(#[from] SyncError),

    #[error("Cache failure")]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, Error>;
