//! Tag statistics derived from the document collection.

use std::collections::HashMap;

use crate::storage::Document;

/// Number of documents carrying one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    /// Spelling of the tag as first seen in collection order.
    pub tag: String,
    pub count: usize,
}

/// Tag → document count statistics.
///
/// The index is a pure derivation of a document collection: [`MetadataStore`] rebuilds it
/// after every mutation, so reads always reflect the latest change. Tags are compared
/// ignoring case.
///
/// [`MetadataStore`]: crate::storage::MetadataStore
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    // First-seen order.
    entries: Vec<TagCount>,
    // Lowercased tag -> position in `entries`.
    positions: HashMap<String, usize>,
}

impl TagIndex {
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut index = TagIndex::default();
        for doc in documents {
            // `Tags` is already deduplicated per document, so each tag counts once.
            for tag in doc.tags.iter() {
                let key = tag.to_lowercase();
                match index.positions.get(&key) {
                    Some(&pos) => index.entries[pos].count += 1,
                    None => {
                        index.positions.insert(key, index.entries.len());
                        index.entries.push(TagCount { tag: tag.to_string(), count: 1 });
                    }
                }
            }
        }
        index
    }

    /// At most `n` tags, most used first. Ties are broken by ascending order of the tag
    /// spelling.
    pub fn popular_tags(&self, n: usize) -> Vec<&str> {
        self.popular(n).into_iter().map(|entry| entry.tag.as_str()).collect()
    }

    /// Like [`popular_tags`](Self::popular_tags) but keeps the counts.
    pub fn popular(&self, n: usize) -> Vec<&TagCount> {
        let mut ranked: Vec<&TagCount> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        ranked.truncate(n);
        ranked
    }

    /// Number of documents tagged with `tag`, ignoring case.
    pub fn count_for(&self, tag: &str) -> usize {
        self.positions
            .get(&tag.trim().to_lowercase())
            .map(|&pos| self.entries[pos].count)
            .unwrap_or(0)
    }

    /// Every distinct tag, sorted.
    pub fn all_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.entries.iter().map(|entry| entry.tag.as_str()).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
