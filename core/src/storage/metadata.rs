use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::event::{define_event_listeners, Event};
use crate::index::TagIndex;

use super::{
    versions_key, Cache, Document, DocumentPatch, Error, RemoteSource, Result, UploadReceipt,
    DOCUMENTS_KEY,
};

/// Where the collection came from on the last [`MetadataStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// The remote source answered; its listing replaced the collection.
    Remote,
    /// The remote was unavailable or not configured; the cached collection is in use.
    Cache,
    /// Nothing usable was found.
    Empty,
}

/// What happened to the document collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChange {
    Loaded(LoadSource),
    Created(String),
    Updated(String),
    Deleted(String),
    Recategorized { from: String, to: String, count: usize },
    Cleared,
}

#[derive(Debug, Clone)]
pub struct DocumentsChanged {
    pub change: DocumentChange,
}

impl Event for DocumentsChanged {}

define_event_listeners! { DocumentEvents {
    changed: DocumentsChanged,
}}


/// Owns the collection of [`Document`] records of a library.
///
/// Every mutation is applied in memory, written to the cache and only then offered to the
/// remote source. If the cache write fails the in-memory change is undone and the error is
/// returned; if the remote call fails the failure is logged and the store carries on with
/// its local state. The [`TagIndex`] is rebuilt after each successful mutation, before
/// listeners on [`on`](Self::on) are notified.
#[derive(Debug)]
pub struct MetadataStore {
    documents: Vec<Document>,
    tags: TagIndex,
    cache: Cache,
    remote: Option<Arc<dyn RemoteSource>>,
    pub on: DocumentEvents,
}

impl MetadataStore {
    /// Creates an empty store. Call [`load`](Self::load) to populate it.
    pub fn new(cache: Cache, remote: Option<Arc<dyn RemoteSource>>) -> Self {
        MetadataStore {
            documents: Vec::new(),
            tags: TagIndex::default(),
            cache,
            remote,
            on: DocumentEvents::new(),
        }
    }

    /// Populates the collection from the cache, then refreshes it from the remote source.
    ///
    /// Never fails. An unreadable cache entry counts as empty; a remote failure keeps
    /// whatever the cache provided. A successful remote listing replaces the collection and
    /// is written back to the cache.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> LoadSource {
        let mut source = match self.cache.read_json::<Vec<Document>>(DOCUMENTS_KEY).await {
            Ok(Some(cached)) => {
                self.documents = unique_by_filename(cached);
                LoadSource::Cache
            }
            Ok(None) => {
                self.documents.clear();
                LoadSource::Empty
            }
            Err(e) => {
                warn!(error = %e, "Cached documents are unreadable, starting empty");
                self.documents.clear();
                LoadSource::Empty
            }
        };

        if let Some(remote) = self.remote.clone() {
            match remote.list().await {
                Ok(fetched) => {
                    self.documents = unique_by_filename(fetched);
                    source = LoadSource::Remote;
                    if let Err(e) = self.persist().await {
                        warn!(error = %e, "Unable to cache documents fetched from remote");
                    }
                }
                Err(e) => warn!(error = %e, "Remote refresh failed, keeping cached documents"),
            }
        }

        debug!(count = self.documents.len(), ?source, "Documents loaded");
        self.reindex();
        self.notify(DocumentChange::Loaded(source));
        source
    }

    /// Every record, in insertion order.
    pub fn list(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, filename: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.filename == filename)
    }

    /// Tag statistics of the current collection.
    pub fn tag_index(&self) -> &TagIndex {
        &self.tags
    }

    /// Adds `document` to the collection and returns the stored record.
    ///
    /// Fields assigned by the remote source (identifier, path, size, upload date) are merged
    /// into the stored record when the remote acknowledges it.
    #[instrument(skip(self, document), fields(filename = %document.filename))]
    pub async fn create(&mut self, document: Document) -> Result<Document> {
        if document.filename.trim().is_empty() {
            return Err(Error::Validation("filename must not be empty".to_string()));
        }
        if self.get(&document.filename).is_some() {
            return Err(Error::Validation(format!(
                "a document named '{}' already exists",
                document.filename
            )));
        }

        let pos = self.documents.len();
        self.documents.push(document);
        if let Err(e) = self.persist().await {
            self.documents.pop();
            return Err(e);
        }

        if let Some(remote) = self.remote.clone() {
            match remote.create(&self.documents[pos]).await {
                Ok(acknowledged) => {
                    self.documents[pos].merge_server_fields(acknowledged);
                    if let Err(e) = self.persist().await {
                        warn!(error = %e, "Unable to cache server-assigned fields");
                    }
                }
                Err(e) => warn!(error = %e, "Remote create failed, document kept locally"),
            }
        }

        let stored = self.documents[pos].clone();
        debug!("Document created");
        self.reindex();
        self.notify(DocumentChange::Created(stored.filename.clone()));
        Ok(stored)
    }

    /// Creates the record for an acknowledged upload.
    pub async fn create_from_upload(&mut self, receipt: UploadReceipt) -> Result<Document> {
        self.create(receipt.into_document()).await
    }

    /// Applies `patches` in order to the record stored under `filename` and stamps its
    /// modification time. Either every patch is applied or none is.
    #[instrument(skip(self, patches))]
    pub async fn update<I>(&mut self, filename: &str, patches: I) -> Result<Document>
    where
        I: IntoIterator<Item = DocumentPatch>,
    {
        let patches: Vec<DocumentPatch> = patches.into_iter().collect();
        for patch in &patches {
            patch.validate().map_err(Error::Validation)?;
        }
        let pos = self
            .position(filename)
            .ok_or_else(|| Error::NotFound(format!("document '{}'", filename)))?;

        let previous = self.documents[pos].clone();
        let doc = &mut self.documents[pos];
        for patch in patches {
            doc.apply(patch);
        }
        doc.last_modified = Some(Utc::now());

        if let Err(e) = self.persist().await {
            self.documents[pos] = previous;
            return Err(e);
        }

        debug!("Document updated");
        self.reindex();
        self.notify(DocumentChange::Updated(filename.to_string()));
        Ok(self.documents[pos].clone())
    }

    /// Removes the record stored under `filename` together with its cached version history.
    ///
    /// Returns `false` if there was no such record. The deletion is forwarded to the remote
    /// source once it is applied locally.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, filename: &str) -> Result<bool> {
        let Some(pos) = self.position(filename) else {
            debug!("Nothing to delete");
            return Ok(false);
        };

        let removed = self.documents.remove(pos);
        if let Err(e) = self.persist_removal(filename).await {
            self.documents.insert(pos, removed);
            if let Err(restore_err) = self.persist().await {
                warn!(
                    error = %restore_err,
                    "Unable to restore cached documents after failed delete"
                );
            }
            return Err(e);
        }

        if let Some(remote) = self.remote.clone() {
            if let Err(e) = remote.delete(filename).await {
                warn!(error = %e, "Remote delete failed, document removed locally");
            }
        }

        debug!("Document deleted");
        self.reindex();
        self.notify(DocumentChange::Deleted(filename.to_string()));
        Ok(true)
    }

    /// Moves every record in category `from` to category `to` and returns how many moved.
    #[instrument(skip(self))]
    pub async fn reassign_category(&mut self, from: &str, to: &str) -> Result<usize> {
        let moved = self.reassign_in_memory(from, to);
        if moved.is_empty() {
            return Ok(0);
        }
        if let Err(e) = self.persist().await {
            self.restore_category(&moved, from);
            return Err(e);
        }
        self.notify(DocumentChange::Recategorized {
            from: from.to_string(),
            to: to.to_string(),
            count: moved.len(),
        });
        Ok(moved.len())
    }

    /// Writes the collection to the cache.
    pub async fn persist(&self) -> Result<()> {
        let session = self.cache.acquire().await;
        session.put_json(DOCUMENTS_KEY, &self.documents).await?;
        Ok(())
    }

    /// Recategorizes in memory only and returns the positions of the records that moved.
    pub(crate) fn reassign_in_memory(&mut self, from: &str, to: &str) -> Vec<usize> {
        let mut moved = Vec::new();
        for (pos, doc) in self.documents.iter_mut().enumerate() {
            if doc.category == from {
                doc.category = to.to_string();
                moved.push(pos);
            }
        }
        moved
    }

    /// Undoes [`reassign_in_memory`](Self::reassign_in_memory).
    pub(crate) fn restore_category(&mut self, moved: &[usize], category: &str) {
        for &pos in moved {
            if let Some(doc) = self.documents.get_mut(pos) {
                doc.category = category.to_string();
            }
        }
    }

    pub(crate) fn notify(&self, change: DocumentChange) {
        self.on.changed.dispatch(&DocumentsChanged { change });
    }

    /// Empties the collection in memory.
    pub(crate) fn clear(&mut self) {
        self.documents.clear();
        self.reindex();
        self.notify(DocumentChange::Cleared);
    }

    fn position(&self, filename: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.filename == filename)
    }

    fn reindex(&mut self) {
        self.tags = TagIndex::build(&self.documents);
    }

    async fn persist_removal(&self, filename: &str) -> Result<()> {
        let session = self.cache.acquire().await;
        session.put_json(DOCUMENTS_KEY, &self.documents).await?;
        session.remove(&versions_key(filename)).await?;
        Ok(())
    }
}

// Keeps the first record of each filename.
fn unique_by_filename(documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(documents.len());
    for doc in documents {
        if seen.insert(doc.filename.clone()) {
            unique.push(doc);
        } else {
            warn!(filename = %doc.filename, "Dropping duplicate document record");
        }
    }
    unique
}
