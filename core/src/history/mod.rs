//! Per-document version snapshots and the live edit session of an open document.
//!
//! A [`VersionHistory`] is opened for one document. It holds the saved [`Version`]
//! snapshots of that document (newest first, cached under `versions:<filename>`) and an
//! [`EditSession`] with the unsaved live content and its undo/redo stacks. Snapshots are
//! immutable; the only operations on them are create, load and delete.

pub use self::session::{EditSession, EditState};

mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::event::{define_event_listeners, Event};
use crate::storage::{versions_key, Cache, DocumentPatch, Error, MetadataStore, Result};

/// An immutable saved copy of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    /// Owning document. Older cache entries omit it; it is filled in on load.
    #[serde(default)]
    pub filename: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "description")]
    pub label: String,
    #[serde(alias = "version")]
    pub version_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
    Created(String),
    Loaded(String),
    Deleted(String),
}

#[derive(Debug, Clone)]
pub struct VersionsChanged {
    pub filename: String,
    pub change: VersionChange,
}

impl Event for VersionsChanged {}

define_event_listeners! { HistoryEvents {
    changed: VersionsChanged,
}}


/// Version snapshots and edit session of one document.
#[derive(Debug)]
pub struct VersionHistory {
    filename: String,
    // Newest first.
    versions: Vec<Version>,
    current: Option<String>,
    session: EditSession,
    cache: Cache,
    pub on: HistoryEvents,
}

impl VersionHistory {
    /// Loads the snapshots of `filename` from the cache and starts an edit session on
    /// `content`. No snapshot is current until one is created or loaded.
    #[instrument(skip(cache, content))]
    pub async fn open(cache: Cache, filename: &str, content: impl Into<String>) -> Result<Self> {
        let mut versions: Vec<Version> = cache
            .read_json(&versions_key(filename))
            .await?
            .unwrap_or_default();
        for version in versions.iter_mut().filter(|v| v.filename.is_empty()) {
            version.filename = filename.to_string();
        }
        debug!(count = versions.len(), "Version history opened");

        Ok(VersionHistory {
            filename: filename.to_string(),
            versions,
            current: None,
            session: EditSession::new(content),
            cache,
            on: HistoryEvents::new(),
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Saved snapshots, newest first.
    pub fn list_versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn get(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The snapshot most recently created or loaded in this session.
    pub fn current(&self) -> Option<&Version> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn live(&self) -> &str {
        self.session.live()
    }

    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        self.session.edit(content)
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.session.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.can_redo()
    }

    pub fn is_dirty(&self) -> bool {
        self.session.is_dirty()
    }

    pub fn state(&self) -> EditState {
        self.session.state()
    }

    /// Accepts the live content as saved. No snapshot is created.
    pub fn save(&mut self) {
        self.session.mark_saved();
    }

    /// Snapshots the live content as the newest version and makes it current.
    ///
    /// The owning document is marked as having history and its version is set to
    /// `version_number`. If writing the snapshot list or updating the document fails,
    /// neither change is kept.
    #[instrument(skip(self, documents), fields(filename = %self.filename))]
    pub async fn create_version(
        &mut self,
        label: &str,
        version_number: &str,
        documents: &mut MetadataStore,
    ) -> Result<Version> {
        let label = label.trim();
        let version_number = version_number.trim();
        if label.is_empty() {
            return Err(Error::Validation("version label must not be empty".to_string()));
        }
        if version_number.is_empty() {
            return Err(Error::Validation("version number must not be empty".to_string()));
        }
        if documents.get(&self.filename).is_none() {
            return Err(Error::NotFound(format!("document '{}'", self.filename)));
        }

        let version = Version {
            id: Uuid::now_v7().to_string(),
            filename: self.filename.clone(),
            content: self.session.live().to_string(),
            timestamp: Utc::now(),
            label: label.to_string(),
            version_number: version_number.to_string(),
        };
        self.versions.insert(0, version.clone());
        let previous_current = self.current.replace(version.id.clone());

        if let Err(e) = self.persist().await {
            self.versions.remove(0);
            self.current = previous_current;
            return Err(e);
        }

        let marked = documents
            .update(
                &self.filename,
                [
                    DocumentPatch::Version(Some(version_number.to_string())),
                    DocumentPatch::HasHistory(true),
                ],
            )
            .await;
        if let Err(e) = marked {
            self.versions.remove(0);
            self.current = previous_current;
            if let Err(restore_err) = self.persist().await {
                warn!(
                    error = %restore_err,
                    "Unable to restore cached versions after failed snapshot"
                );
            }
            return Err(e);
        }

        debug!(id = %version.id, "Version created");
        self.dispatch(VersionChange::Created(version.id.clone()));
        Ok(version)
    }

    /// Replaces the live content with snapshot `id` and makes it current.
    ///
    /// Both undo/redo stacks are cleared. The saved baseline is not touched, so loading a
    /// snapshot that differs from it leaves the session dirty until [`save`](Self::save).
    pub fn load_version(&mut self, id: &str) -> Result<&Version> {
        let pos = self
            .position(id)
            .ok_or_else(|| Error::NotFound(format!("version '{}'", id)))?;
        self.session.restore(self.versions[pos].content.clone());
        self.current = Some(id.to_string());
        debug!(filename = %self.filename, id, "Version loaded");
        self.dispatch(VersionChange::Loaded(id.to_string()));
        Ok(&self.versions[pos])
    }

    /// Deletes snapshot `id`. The current snapshot cannot be deleted.
    #[instrument(skip(self), fields(filename = %self.filename))]
    pub async fn delete_version(&mut self, id: &str) -> Result<()> {
        if self.current.as_deref() == Some(id) {
            return Err(Error::Integrity(format!(
                "version '{}' is current and cannot be deleted",
                id
            )));
        }
        let pos = self
            .position(id)
            .ok_or_else(|| Error::NotFound(format!("version '{}'", id)))?;

        let removed = self.versions.remove(pos);
        if let Err(e) = self.persist().await {
            self.versions.insert(pos, removed);
            return Err(e);
        }

        debug!("Version deleted");
        self.dispatch(VersionChange::Deleted(id.to_string()));
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.versions.iter().position(|v| v.id == id)
    }

    async fn persist(&self) -> Result<()> {
        let session = self.cache.acquire().await;
        session.put_json(&versions_key(&self.filename), &self.versions).await?;
        Ok(())
    }

    fn dispatch(&self, change: VersionChange) {
        self.on.changed.dispatch(&VersionsChanged {
            filename: self.filename.clone(),
            change,
        });
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::event::Listener;
    use crate::storage::test_support::FlakyStore;
    use crate::storage::{Document, KeyValueStore, MemoryStore};

    async fn fixture(content: &str) -> (Arc<MemoryStore>, MetadataStore, VersionHistory) {
        let backend = Arc::new(MemoryStore::new());
        let cache = Cache::new(backend.clone());
        let mut documents = MetadataStore::new(cache.clone(), None);
        documents.create(Document::new("page.html")).await.unwrap();
        let history = VersionHistory::open(cache, "page.html", content).await.unwrap();
        (backend, documents, history)
    }

    #[tokio::test]
    async fn versions_are_listed_newest_first_and_load_moves_current() {
        let (_, mut documents, mut history) = fixture("<p>one</p>").await;

        let first = history.create_version("v1.0", "1.0", &mut documents).await.unwrap();
        history.edit("<p>two</p>");
        let second = history.create_version("v1.1", "1.1", &mut documents).await.unwrap();

        let labels: Vec<&str> = history.list_versions().iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["v1.1", "v1.0"]);
        assert_eq!(history.current().unwrap().id, second.id);

        history.load_version(&first.id).unwrap();

        assert_eq!(history.live(), "<p>one</p>");
        assert_eq!(history.current().unwrap().id, first.id);
        assert_eq!(history.state(), EditState::Clean);
        assert!(!history.can_undo());
    }

    #[tokio::test]
    async fn current_version_cannot_be_deleted() {
        let (_, mut documents, mut history) = fixture("<p>one</p>").await;
        let version = history.create_version("first", "1", &mut documents).await.unwrap();

        let result = history.delete_version(&version.id).await;

        assert!(matches!(result, Err(Error::Integrity(_))));
        assert_eq!(history.list_versions().len(), 1);
    }

    #[tokio::test]
    async fn older_version_can_be_deleted() {
        let (backend, mut documents, mut history) = fixture("a").await;
        let old = history.create_version("old", "1", &mut documents).await.unwrap();
        history.edit("b");
        history.create_version("new", "2", &mut documents).await.unwrap();

        history.delete_version(&old.id).await.unwrap();

        assert!(history.get(&old.id).is_none());
        let raw = backend.get(&versions_key("page.html")).await.unwrap().unwrap();
        assert!(!raw.contains(&old.id));

        let missing = history.delete_version(&old.id).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn creating_a_version_marks_the_document() {
        let (_, mut documents, mut history) = fixture("a").await;
        history.create_version(" first ", " 1.0 ", &mut documents).await.unwrap();

        let doc = documents.get("page.html").unwrap();
        assert!(doc.has_history);
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(history.list_versions()[0].label, "first");
    }

    #[tokio::test]
    async fn blank_label_or_number_is_rejected() {
        let (_, mut documents, mut history) = fixture("a").await;
        let no_label = history.create_version("  ", "1", &mut documents).await;
        let no_number = history.create_version("first", "", &mut documents).await;

        assert!(matches!(no_label, Err(Error::Validation(_))));
        assert!(matches!(no_number, Err(Error::Validation(_))));
        assert!(history.list_versions().is_empty());
        assert!(!documents.get("page.html").unwrap().has_history);
    }

    #[tokio::test]
    async fn version_of_unknown_document_is_not_found() {
        let cache = Cache::new(Arc::new(MemoryStore::new()));
        let mut documents = MetadataStore::new(cache.clone(), None);
        let mut history = VersionHistory::open(cache, "ghost.html", "x").await.unwrap();

        let result = history.create_version("first", "1", &mut documents).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_snapshot_write_is_rolled_back() {
        let backend = Arc::new(FlakyStore::new());
        let cache = Cache::new(backend.clone());
        let mut documents = MetadataStore::new(cache.clone(), None);
        documents.create(Document::new("page.html")).await.unwrap();
        let mut history = VersionHistory::open(cache, "page.html", "a").await.unwrap();

        backend.fail_writes(true);
        let result = history.create_version("first", "1", &mut documents).await;

        assert!(matches!(result, Err(Error::Cache(_))));
        assert!(history.list_versions().is_empty());
        assert!(history.current().is_none());
        assert!(!documents.get("page.html").unwrap().has_history);
    }

    #[tokio::test]
    async fn snapshots_survive_reopening() {
        let (backend, mut documents, mut history) = fixture("saved").await;
        let version = history.create_version("first", "1", &mut documents).await.unwrap();

        let reopened = VersionHistory::open(Cache::new(backend), "page.html", "live")
            .await
            .unwrap();

        assert_eq!(reopened.list_versions(), &[version]);
        assert!(reopened.current().is_none());
        assert_eq!(reopened.live(), "live");
    }

    #[tokio::test]
    async fn legacy_snapshot_fields_are_accepted() {
        let backend = Arc::new(MemoryStore::with_entries([(
            versions_key("page.html"),
            r#"[{"id":"1714550400000","content":"<p>x</p>","timestamp":"2024-05-01T08:00:00.000Z","description":"Initial","version":"1.0"}]"#,
        )]));
        let history = VersionHistory::open(Cache::new(backend), "page.html", "").await.unwrap();

        let version = &history.list_versions()[0];
        assert_eq!(version.filename, "page.html");
        assert_eq!(version.label, "Initial");
        assert_eq!(version.version_number, "1.0");
    }

    #[tokio::test]
    async fn save_makes_live_content_the_baseline() {
        let (_, _, mut history) = fixture("a").await;
        history.edit("b");
        assert!(history.is_dirty());
        history.save();
        assert_eq!(history.state(), EditState::Clean);
        assert!(history.list_versions().is_empty());
    }

    #[tokio::test]
    async fn loading_an_older_version_leaves_unsaved_changes() {
        let (_, mut documents, mut history) = fixture("one").await;
        let first = history.create_version("v1.0", "1.0", &mut documents).await.unwrap();
        history.edit("two");
        history.save();
        history.create_version("v1.1", "1.1", &mut documents).await.unwrap();

        history.load_version(&first.id).unwrap();

        assert_eq!(history.live(), "one");
        assert_eq!(history.session().baseline(), "two");
        assert_eq!(history.state(), EditState::Dirty);
        assert!(!history.can_undo());

        history.save();
        assert_eq!(history.state(), EditState::Clean);
    }

    #[tokio::test]
    async fn loading_an_unknown_version_changes_nothing() {
        let (_, mut documents, mut history) = fixture("one").await;
        let version = history.create_version("v1.0", "1.0", &mut documents).await.unwrap();
        history.edit("two");

        let result = history.load_version("no-such-id");

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(history.live(), "two");
        assert!(history.can_undo());
        assert_eq!(history.current().unwrap().id, version.id);
    }

    #[tokio::test]
    async fn listeners_see_version_changes() {
        let (_, mut documents, mut history) = fixture("one").await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _listener = Listener::new(&history.on.changed, move |event: &VersionsChanged| {
            sink.lock().unwrap().push((event.filename.clone(), event.change.clone()));
        });

        let old = history.create_version("old", "1", &mut documents).await.unwrap();
        history.edit("two");
        let new = history.create_version("new", "2", &mut documents).await.unwrap();
        history.load_version(&old.id).unwrap();
        history.delete_version(&new.id).await.unwrap();
        history.load_version("missing").unwrap_err();

        let seen = seen.lock().unwrap();
        let changes: Vec<&VersionChange> = seen.iter().map(|(_, change)| change).collect();
        assert_eq!(
            changes,
            vec![
                &VersionChange::Created(old.id.clone()),
                &VersionChange::Created(new.id.clone()),
                &VersionChange::Loaded(old.id.clone()),
                &VersionChange::Deleted(new.id.clone()),
            ]
        );
        assert!(seen.iter().all(|(filename, _)| filename == "page.html"));
    }
}
