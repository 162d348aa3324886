//! Composable category / tag / text filtering over a document collection.

use crate::storage::{Document, Tags};

/// Category selection that disables category filtering.
pub const ALL_CATEGORIES: &str = "all";

/// Which category a view is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// Parses a selection as shown in a category picker, where [`ALL_CATEGORIES`] means
    /// "no restriction".
    pub fn from_selection(selection: &str) -> Self {
        match selection.trim() {
            "" | ALL_CATEGORIES => CategoryFilter::All,
            id => CategoryFilter::Only(id.to_string()),
        }
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(id) => doc.category == *id,
        }
    }
}

/// Active selections of a document view.
///
/// Predicates without a selection are always true; the rest are ANDed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: CategoryFilter,
    /// Selected tags; a document passes if it carries any of them.
    pub tags: Tags,
    /// Case-insensitive substring searched in filename, title, description and tags.
    pub text: String,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, selection: &str) -> Self {
        self.category = CategoryFilter::from_selection(selection);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Selects `tag` as the only tag filter and clears the category restriction, or clears
    /// the tag filter if `tag` was already the selection.
    pub fn toggle_tag(&mut self, tag: &str) {
        let already_selected = self.tags.len() == 1 && self.tags.contains(tag);
        self.tags = Tags::new();
        if !already_selected {
            self.tags.insert(tag);
            self.category = CategoryFilter::All;
        }
    }

    /// True if no predicate is active.
    pub fn is_empty(&self) -> bool {
        self.category == CategoryFilter::All && self.tags.is_empty() && self.text.trim().is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.matches_prepared(doc, self.needle().as_deref())
    }

    // Blank text disables the predicate; otherwise the text is matched as typed, untrimmed.
    fn needle(&self) -> Option<String> {
        if self.text.trim().is_empty() {
            None
        } else {
            Some(self.text.to_lowercase())
        }
    }

    fn matches_prepared(&self, doc: &Document, needle: Option<&str>) -> bool {
        self.category.matches(doc)
            && (self.tags.is_empty() || doc.tags.intersects(&self.tags))
            && needle.is_none_or(|needle| text_matches(doc, needle))
    }
}

fn text_matches(doc: &Document, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);
    contains(&doc.filename)
        || doc.title.as_deref().is_some_and(contains)
        || doc.description.as_deref().is_some_and(contains)
        || doc.tags.iter().any(contains)
}

/// Returns the documents passing `query`, in collection order.
pub fn filter<'a>(documents: &'a [Document], query: &SearchQuery) -> Vec<&'a Document> {
    let needle = query.needle();
    documents
        .iter()
        .filter(|doc| query.matches_prepared(doc, needle.as_deref()))
        .collect()
}
