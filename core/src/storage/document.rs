use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::OTHER_CATEGORY;

/// Metadata record describing one managed HTML file.
///
/// Records are keyed by `filename`, which never changes once the record exists. Field names
/// follow the camelCase JSON used by the cache and the remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Identifier assigned by the remote source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty")]
    pub id: Option<String>,
    pub filename: String,
    /// Canonical path assigned when the upload was acknowledged.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty")]
    pub author: Option<String>,
    #[serde(default = "default_category", deserialize_with = "category_or_default")]
    pub category: String,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default = "Utc::now")]
    pub upload_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Version number of the most recently saved snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "non_empty")]
    pub version: Option<String>,
    #[serde(default)]
    pub has_history: bool,
}

impl Document {
    /// Creates a record for `filename` in the fallback category, uploaded now.
    pub fn new(filename: impl Into<String>) -> Self {
        Document {
            id: None,
            filename: filename.into(),
            path: None,
            title: None,
            description: None,
            author: None,
            category: default_category(),
            tags: Tags::default(),
            upload_date: Utc::now(),
            last_modified: None,
            file_size: None,
            version: None,
            has_history: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Title if set, otherwise the filename.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.filename)
    }

    /// Copies the fields a remote source assigns on creation from `acknowledged`.
    pub(crate) fn merge_server_fields(&mut self, acknowledged: Document) {
        if acknowledged.id.is_some() {
            self.id = acknowledged.id;
        }
        if acknowledged.path.is_some() {
            self.path = acknowledged.path;
        }
        if acknowledged.file_size.is_some() {
            self.file_size = acknowledged.file_size;
        }
        self.upload_date = acknowledged.upload_date;
    }

    pub(crate) fn apply(&mut self, patch: DocumentPatch) {
        match patch {
            DocumentPatch::Title(title) => self.title = title,
            DocumentPatch::Description(description) => self.description = description,
            DocumentPatch::Author(author) => self.author = author,
            DocumentPatch::Category(category) => self.category = category,
            DocumentPatch::Tags(tags) => self.tags = tags,
            DocumentPatch::Version(version) => self.version = version,
            DocumentPatch::FileSize(size) => self.file_size = size,
            DocumentPatch::HasHistory(flag) => self.has_history = flag,
        }
    }
}


/// One field change applied by [`MetadataStore::update`](super::MetadataStore::update).
///
/// `Tags` and `Category` replace the stored value wholesale. The filename is the record's
/// identity and cannot be patched.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentPatch {
    Title(Option<String>),
    Description(Option<String>),
    Author(Option<String>),
    Category(String),
    Tags(Tags),
    Version(Option<String>),
    FileSize(Option<u64>),
    HasHistory(bool),
}

impl DocumentPatch {
    /// Checks the shape of the patch without looking at any stored record.
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            DocumentPatch::Category(id) if id.trim().is_empty() => {
                Err("category id must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}


/// Acknowledgement returned by the upload transport, used to seed a new record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub filename: String,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl UploadReceipt {
    /// Builds the record for this upload. A missing or blank title defaults to the filename
    /// without its extension.
    pub fn into_document(self) -> Document {
        let title = match self.title.filter(|t| !t.trim().is_empty()) {
            Some(title) => title,
            None => match self.filename.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => self.filename.clone(),
            },
        };
        let mut doc = Document::new(self.filename)
            .with_title(title)
            .with_path(self.path)
            .with_tags(self.tags);
        if let Some(category) = self.category.filter(|c| !c.trim().is_empty()) {
            doc.category = category;
        }
        doc.description = self.description.filter(|d| !d.is_empty());
        doc.file_size = self.file_size;
        doc
    }
}


/// Set of tags attached to a document.
///
/// Tags are deduplicated case-insensitively: the first spelling wins and insertion order is
/// kept. Surrounding whitespace is trimmed and empty tags are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tag` unless an equal tag (ignoring case) is already present.
    /// Returns whether the tag was added.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, tag: &str) -> bool {
        let needle = tag.trim().to_lowercase();
        self.0.iter().any(|t| t.to_lowercase() == needle)
    }

    /// True if any tag in `self` is also in `other`, ignoring case.
    pub fn intersects(&self, other: &Tags) -> bool {
        let ours: HashSet<String> = self.0.iter().map(|t| t.to_lowercase()).collect();
        other.0.iter().any(|t| ours.contains(&t.to_lowercase()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<Option<Vec<String>>> for Tags {
    fn from(tags: Option<Vec<String>>) -> Self {
        tags.unwrap_or_default().into()
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}


fn default_category() -> String {
    OTHER_CATEGORY.to_string()
}

fn category_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let category = Option::<String>::deserialize(deserializer)?;
    Ok(category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(default_category))
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_dedup_ignores_case_and_keeps_first_spelling() {
        let tags: Tags = ["Blue", "design", "blue", " Design ", ""].into_iter().collect();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["Blue", "design"]);
        assert!(tags.contains("BLUE"));
    }

    #[test]
    fn tags_intersect_ignoring_case() {
        let a: Tags = ["Blue", "design"].into_iter().collect();
        let b: Tags = ["DESIGN"].into_iter().collect();
        let c: Tags = ["red"].into_iter().collect();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn ingest_applies_defaults_for_remote_records() {
        // Shape produced by the backend: empty strings, null tags, offset timestamps.
        let raw = json!({
            "id": "",
            "filename": "landing.html",
            "title": "",
            "description": "",
            "category": "",
            "tags": null,
            "author": "",
            "version": "",
            "fileSize": 2048,
            "uploadDate": "2024-05-01T10:00:00+08:00",
            "path": "/uploads/landing.html",
            "hasHistory": false
        });

        let doc: Document = serde_json::from_value(raw).unwrap();

        assert_eq!(doc.category, OTHER_CATEGORY);
        assert!(doc.tags.is_empty());
        assert_eq!(doc.title, None);
        assert_eq!(doc.id, None);
        assert_eq!(doc.path.as_deref(), Some("/uploads/landing.html"));
        assert_eq!(doc.upload_date.to_rfc3339(), "2024-05-01T02:00:00+00:00");
    }

    #[test]
    fn missing_optional_fields_are_accepted() {
        let doc: Document = serde_json::from_value(json!({ "filename": "a.html" })).unwrap();
        assert_eq!(doc.category, OTHER_CATEGORY);
        assert!(doc.tags.is_empty());
        assert!(!doc.has_history);
    }

    #[test]
    fn serialized_record_uses_camel_case_and_iso_dates() {
        let doc = Document::new("demo.html").with_tags(["x"]);
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("uploadDate").unwrap().is_string());
        assert_eq!(value.get("hasHistory"), Some(&json!(false)));
        assert_eq!(value.get("tags"), Some(&json!(["x"])));
        assert!(value.get("title").is_none());
    }

    #[test]
    fn upload_receipt_seeds_title_and_category() {
        let receipt = UploadReceipt {
            filename: "report.final.html".into(),
            path: "/uploads/report.final.html".into(),
            title: Some("  ".into()),
            category: Some("documentation".into()),
            tags: vec!["q3".into(), "Q3".into()],
            description: Some(String::new()),
            file_size: Some(10),
        };
        let doc = receipt.into_document();
        assert_eq!(doc.title.as_deref(), Some("report.final"));
        assert_eq!(doc.category, "documentation");
        assert_eq!(doc.tags.len(), 1);
        assert_eq!(doc.description, None);
    }

    #[test]
    fn upload_receipt_keeps_given_title() {
        let receipt = UploadReceipt {
            filename: "q3.html".into(),
            path: "/uploads/q3.html".into(),
            title: Some("Quarterly report".into()),
            ..Default::default()
        };
        assert_eq!(receipt.into_document().title.as_deref(), Some("Quarterly report"));
    }

    #[test]
    fn category_patch_must_not_be_blank() {
        assert!(DocumentPatch::Category("  ".into()).validate().is_err());
        assert!(DocumentPatch::Category("blog".into()).validate().is_ok());
        assert!(DocumentPatch::Title(None).validate().is_ok());
    }
}
