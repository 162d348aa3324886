use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::event::{define_event_listeners, Event};

use super::metadata::{DocumentChange, MetadataStore};
use super::{Cache, Document, Error, RemoteSource, Result, CATEGORIES_KEY, OTHER_CATEGORY};

/// A classification bucket. Every document belongs to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Category {
            id: id.into(),
            name: name.into(),
            icon: "pi-folder".to_string(),
            color: "#6B7280".to_string(),
            description: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The categories a fresh library starts with.
    pub fn defaults() -> Vec<Category> {
        [
            ("dashboard", "Dashboard", "pi-chart-line", "#3B82F6"),
            ("portfolio", "Portfolio", "pi-briefcase", "#10B981"),
            ("documentation", "Documentation", "pi-book", "#F59E0B"),
            ("template", "Template", "pi-palette", "#EF4444"),
            ("landing", "Landing Page", "pi-home", "#8B5CF6"),
            ("admin", "Admin Panel", "pi-cog", "#6B7280"),
            ("ecommerce", "E-commerce", "pi-shopping-cart", "#EC4899"),
            ("blog", "Blog", "pi-pencil", "#06B6D4"),
            (OTHER_CATEGORY, "Other", "pi-folder", "#84CC16"),
        ]
        .into_iter()
        .map(|(id, name, icon, color)| Category::new(id, name).with_icon(icon).with_color(color))
        .collect()
    }

    fn sentinel() -> Category {
        Category::new(OTHER_CATEGORY, "Other")
            .with_icon("pi-folder")
            .with_color("#84CC16")
    }
}


/// What happened to the category collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryChange {
    Loaded,
    Upserted(String),
    Removed { id: String, reassigned: usize },
    Reset,
}

#[derive(Debug, Clone)]
pub struct CategoriesChanged {
    pub change: CategoryChange,
}

impl Event for CategoriesChanged {}

define_event_listeners! { CategoryEvents {
    changed: CategoriesChanged,
}}


/// Owns the set of categories and guarantees the fallback category exists.
#[derive(Debug)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
    cache: Cache,
    remote: Option<Arc<dyn RemoteSource>>,
    pub on: CategoryEvents,
}

impl CategoryRegistry {
    /// Creates a registry holding the default categories. Call [`load`](Self::load) to pick
    /// up cached and remote state.
    pub fn new(cache: Cache, remote: Option<Arc<dyn RemoteSource>>) -> Self {
        CategoryRegistry {
            categories: Category::defaults(),
            cache,
            remote,
            on: CategoryEvents::new(),
        }
    }

    /// Loads categories from the cache (defaults if none are cached), then merges in the
    /// remote's categories. Remote categories come first, followed by local categories the
    /// remote does not list. Failures are logged and never returned.
    #[instrument(skip(self))]
    pub async fn load(&mut self) {
        self.categories = match self.cache.read_json::<Vec<Category>>(CATEGORIES_KEY).await {
            Ok(Some(cached)) => cached,
            Ok(None) => Category::defaults(),
            Err(e) => {
                warn!(error = %e, "Unable to read cached categories, using defaults");
                Category::defaults()
            }
        };

        if let Some(remote) = self.remote.clone() {
            match remote.categories().await {
                Ok(server) if !server.is_empty() => {
                    let server_ids: HashSet<&str> = server.iter().map(|c| c.id.as_str()).collect();
                    let local_only: Vec<Category> = self
                        .categories
                        .iter()
                        .filter(|c| !server_ids.contains(c.id.as_str()))
                        .cloned()
                        .collect();
                    let mut merged = server;
                    merged.extend(local_only);
                    self.categories = merged;
                    debug!(count = self.categories.len(), "Merged remote categories");
                    if let Err(e) = self.persist().await {
                        warn!(error = %e, "Unable to cache merged categories");
                    }
                }
                Ok(_) => debug!("Remote source lists no categories"),
                Err(e) => warn!(error = %e, "Unable to refresh categories from remote source"),
            }
        }

        self.normalize();
        self.on.changed.dispatch(&CategoriesChanged { change: CategoryChange::Loaded });
    }

    pub fn list(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Inserts `category`, or replaces the fields of the category with the same id.
    #[instrument(skip(self, category), fields(id = %category.id))]
    pub async fn upsert(&mut self, category: Category) -> Result<()> {
        if category.id.trim().is_empty() {
            return Err(Error::Validation("category id must not be empty".to_string()));
        }
        if category.name.trim().is_empty() {
            return Err(Error::Validation(format!("category '{}' needs a name", category.id)));
        }

        let id = category.id.clone();
        let previous = match self.categories.iter().position(|c| c.id == id) {
            Some(pos) => Some((pos, std::mem::replace(&mut self.categories[pos], category))),
            None => {
                self.categories.push(category);
                None
            }
        };

        if let Err(e) = self.persist().await {
            match previous {
                Some((pos, old)) => self.categories[pos] = old,
                None => {
                    self.categories.pop();
                }
            }
            return Err(e);
        }

        debug!("Category upserted");
        self.on.changed.dispatch(&CategoriesChanged { change: CategoryChange::Upserted(id) });
        Ok(())
    }

    /// Removes category `id` and moves its documents to the fallback category.
    ///
    /// Returns the number of documents reassigned. Fails with [`Error::Integrity`] for the
    /// fallback category itself and [`Error::NotFound`] for an unknown id. Both collections
    /// are persisted; if either write fails, both are restored.
    #[instrument(skip(self, documents))]
    pub async fn remove(&mut self, id: &str, documents: &mut MetadataStore) -> Result<usize> {
        if id == OTHER_CATEGORY {
            return Err(Error::Integrity(format!(
                "the '{}' category cannot be removed",
                OTHER_CATEGORY
            )));
        }
        let pos = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("category '{}'", id)))?;

        let removed = self.categories.remove(pos);
        let moved = documents.reassign_in_memory(id, OTHER_CATEGORY);

        let persisted = match self.persist().await {
            Ok(()) => documents.persist().await,
            Err(e) => Err(e),
        };
        if let Err(e) = persisted {
            self.categories.insert(pos, removed);
            documents.restore_category(&moved, id);
            if let Err(restore_err) = self.persist().await {
                warn!(
                    error = %restore_err,
                    "Unable to restore cached categories after failed removal"
                );
            }
            return Err(e);
        }

        let reassigned = moved.len();
        debug!(reassigned, "Category removed");
        documents.notify(DocumentChange::Recategorized {
            from: id.to_string(),
            to: OTHER_CATEGORY.to_string(),
            count: reassigned,
        });
        self.on.changed.dispatch(&CategoriesChanged {
            change: CategoryChange::Removed { id: id.to_string(), reassigned },
        });
        Ok(reassigned)
    }

    /// Categories in use, most used first, at most `limit`. Ties keep registry order and
    /// documents referencing unknown categories are not counted.
    pub fn usage<'a>(&'a self, documents: &[Document], limit: usize) -> Vec<(&'a Category, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for doc in documents {
            *counts.entry(doc.category.as_str()).or_default() += 1;
        }
        let mut used: Vec<(&Category, usize)> = self
            .categories
            .iter()
            .filter_map(|c| counts.get(c.id.as_str()).map(|&n| (c, n)))
            .collect();
        used.sort_by(|a, b| b.1.cmp(&a.1));
        used.truncate(limit);
        used
    }

    /// Writes the category collection to the cache.
    pub async fn persist(&self) -> Result<()> {
        let session = self.cache.acquire().await;
        session.put_json(CATEGORIES_KEY, &self.categories).await?;
        Ok(())
    }

    /// Drops every custom category and restores the defaults in memory.
    pub(crate) fn reset(&mut self) {
        self.categories = Category::defaults();
        self.on.changed.dispatch(&CategoriesChanged { change: CategoryChange::Reset });
    }

    // Drops duplicate ids (first wins) and makes sure the fallback category exists.
    fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.categories.retain(|c| seen.insert(c.id.clone()));
        if !seen.contains(OTHER_CATEGORY) {
            self.categories.push(Category::sentinel());
        }
    }
}
