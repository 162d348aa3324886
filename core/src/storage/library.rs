use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::history::VersionHistory;
use crate::search::{self, SearchQuery};

use super::{
    Cache, Category, CategoryRegistry, Document, DocumentPatch, Error, KeyValueStore, LoadSource,
    MetadataStore, RemoteSource, Result, SyncError, UploadReceipt, CATEGORIES_KEY, DOCUMENTS_KEY,
};

const VERSIONS_PREFIX: &str = "versions:";

/// The root container of a document library.
///
/// Owns the [`MetadataStore`] and the [`CategoryRegistry`], which share one cache handle and
/// one optional remote source. Operations that must keep both collections consistent go
/// through the library.
#[derive(Debug)]
pub struct Library {
    cache: Cache,
    remote: Option<Arc<dyn RemoteSource>>,
    documents: MetadataStore,
    categories: CategoryRegistry,
}

impl Library {
    /// Builds a library over `backend` and loads both collections.
    ///
    /// Loading never fails: unreachable remotes and unreadable cache entries are logged and
    /// the library starts from whatever could be read.
    #[instrument(skip_all, fields(remote = remote.is_some()))]
    pub async fn init(
        backend: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn RemoteSource>>,
    ) -> Self {
        let cache = Cache::new(backend);
        let mut library = Library {
            documents: MetadataStore::new(cache.clone(), remote.clone()),
            categories: CategoryRegistry::new(cache.clone(), remote.clone()),
            cache,
            remote,
        };
        let source = library.reload().await;
        info!(
            documents = library.documents.list().len(),
            categories = library.categories.list().len(),
            ?source,
            "Library ready"
        );
        library
    }

    /// Reloads categories and documents from the cache and the remote source.
    pub async fn reload(&mut self) -> LoadSource {
        self.categories.load().await;
        self.documents.load().await
    }

    /// Forgets every document, custom category and version history, in memory and in the
    /// cache. The default categories are restored.
    #[instrument(skip(self))]
    pub async fn reset(&mut self) -> Result<()> {
        let keys = self.cache.keys().await?;
        {
            let session = self.cache.acquire().await;
            for key in keys.iter().filter(|k| k.starts_with(VERSIONS_PREFIX)) {
                session.remove(key).await?;
            }
            session.remove(DOCUMENTS_KEY).await?;
            session.remove(CATEGORIES_KEY).await?;
        }
        self.documents.clear();
        self.categories.reset();
        info!("Library reset");
        Ok(())
    }

    pub fn documents(&self) -> &MetadataStore {
        &self.documents
    }

    /// Direct access to the document store, for operations that take it by `&mut`
    /// (creating versions, registering listeners).
    pub fn documents_mut(&mut self) -> &mut MetadataStore {
        &mut self.documents
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut CategoryRegistry {
        &mut self.categories
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteSource>> {
        self.remote.as_ref()
    }

    /// Adds a document after checking that its category exists.
    pub async fn create_document(&mut self, document: Document) -> Result<Document> {
        self.ensure_category(&document.category)?;
        self.documents.create(document).await
    }

    /// Records an acknowledged upload. An unknown category falls back to `other`.
    pub async fn import_upload(&mut self, receipt: UploadReceipt) -> Result<Document> {
        let mut document = receipt.into_document();
        if !self.categories.contains(&document.category) {
            warn!(
                filename = %document.filename,
                category = %document.category,
                "Upload names an unknown category, filing it under 'other'"
            );
            document.category = super::OTHER_CATEGORY.to_string();
        }
        self.documents.create(document).await
    }

    /// Patches a document. A category patch must name an existing category.
    pub async fn update_document<I>(&mut self, filename: &str, patches: I) -> Result<Document>
    where
        I: IntoIterator<Item = DocumentPatch>,
    {
        let patches: Vec<DocumentPatch> = patches.into_iter().collect();
        for patch in &patches {
            if let DocumentPatch::Category(id) = patch {
                self.ensure_category(id)?;
            }
        }
        self.documents.update(filename, patches).await
    }

    /// Deletes a document together with its version history.
    pub async fn delete_document(&mut self, filename: &str) -> Result<bool> {
        self.documents.delete(filename).await
    }

    pub async fn upsert_category(&mut self, category: Category) -> Result<()> {
        self.categories.upsert(category).await
    }

    /// Removes a category, moving its documents to `other`. Returns how many moved.
    pub async fn remove_category(&mut self, id: &str) -> Result<usize> {
        self.categories.remove(id, &mut self.documents).await
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<&Document> {
        search::filter(self.documents.list(), query)
    }

    pub fn popular_tags(&self, n: usize) -> Vec<&str> {
        self.documents.tag_index().popular_tags(n)
    }

    /// Most used categories with their document counts.
    pub fn top_categories(&self, limit: usize) -> Vec<(&Category, usize)> {
        self.categories.usage(self.documents.list(), limit)
    }

    /// Opens the version history of `filename` with `content` as the live content.
    pub async fn open_history(
        &self,
        filename: &str,
        content: impl Into<String>,
    ) -> Result<VersionHistory> {
        if self.documents.get(filename).is_none() {
            return Err(Error::NotFound(format!("document '{}'", filename)));
        }
        VersionHistory::open(self.cache.clone(), filename, content).await
    }

    /// Like [`open_history`](Self::open_history), fetching the live content from the remote
    /// source.
    #[instrument(skip(self))]
    pub async fn open_history_from_remote(&self, filename: &str) -> Result<VersionHistory> {
        if self.documents.get(filename).is_none() {
            return Err(Error::NotFound(format!("document '{}'", filename)));
        }
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| SyncError::Configuration("no remote source configured".to_string()))?;
        let content = remote.content(filename).await?;
        debug!(bytes = content.len(), "Fetched document content");
        VersionHistory::open(self.cache.clone(), filename, content).await
    }

    fn ensure_category(&self, id: &str) -> Result<()> {
        if self.categories.contains(id) {
            Ok(())
        } else {
            Err(Error::Validation(format!("unknown category '{}'", id)))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::ScriptedRemote;
    use crate::storage::{MemoryStore, OTHER_CATEGORY};

    async fn offline_library() -> (Arc<MemoryStore>, Library) {
        let backend = Arc::new(MemoryStore::new());
        let library = Library::init(backend.clone(), None).await;
        (backend, library)
    }

    #[tokio::test]
    async fn unknown_category_is_rejected_on_create_and_update() {
        let (_, mut library) = offline_library().await;

        let created = library.create_document(Document::new("a.html").with_category("nope")).await;
        assert!(matches!(created, Err(Error::Validation(_))));

        library.create_document(Document::new("a.html").with_category("blog")).await.unwrap();
        let updated = library
            .update_document("a.html", [DocumentPatch::Category("nope".into())])
            .await;
        assert!(matches!(updated, Err(Error::Validation(_))));
        assert_eq!(library.documents().get("a.html").unwrap().category, "blog");
    }

    #[tokio::test]
    async fn upload_with_unknown_category_lands_in_other() {
        let (_, mut library) = offline_library().await;
        let receipt = UploadReceipt {
            filename: "x.html".into(),
            path: "/uploads/x.html".into(),
            category: Some("made-up".into()),
            ..Default::default()
        };
        let doc = library.import_upload(receipt).await.unwrap();
        assert_eq!(doc.category, OTHER_CATEGORY);
    }

    #[tokio::test]
    async fn removing_a_category_cascades_through_the_library() {
        let (_, mut library) = offline_library().await;
        library.create_document(Document::new("a.html").with_category("blog")).await.unwrap();

        assert_eq!(library.remove_category("blog").await.unwrap(), 1);
        assert_eq!(library.top_categories(15)[0].0.id, OTHER_CATEGORY);
    }

    #[tokio::test]
    async fn reset_clears_documents_categories_and_versions() {
        let (backend, mut library) = offline_library().await;
        library.upsert_category(Category::new("games", "Games")).await.unwrap();
        library.create_document(Document::new("a.html").with_category("games")).await.unwrap();
        let mut history = library.open_history("a.html", "<p>a</p>").await.unwrap();
        history
            .create_version("first", "1", library.documents_mut())
            .await
            .unwrap();

        library.reset().await.unwrap();

        assert!(library.documents().list().is_empty());
        assert!(!library.categories().contains("games"));
        assert!(library.categories().contains(OTHER_CATEGORY));
        assert!(backend.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_requires_an_existing_document() {
        let (_, library) = offline_library().await;
        let result = library.open_history("ghost.html", "").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn history_content_can_come_from_remote() {
        let remote = Arc::new(ScriptedRemote::with_documents(vec![Document::new("a.html")]));
        let mut library = Library::init(Arc::new(MemoryStore::new()), Some(remote)).await;

        let history = library.open_history_from_remote("a.html").await.unwrap();
        assert!(history.live().contains("a.html"));

        library.delete_document("a.html").await.unwrap();
        assert!(library.open_history_from_remote("a.html").await.is_err());
    }

    #[tokio::test]
    async fn history_from_remote_needs_a_remote() {
        let (_, mut library) = offline_library().await;
        library.create_document(Document::new("a.html")).await.unwrap();
        let result = library.open_history_from_remote("a.html").await;
        assert!(matches!(result, Err(Error::Sync(SyncError::Configuration(_)))));
    }
}
