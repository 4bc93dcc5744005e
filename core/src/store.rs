use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::DocId;

/// Where a document came from. Drives link labels in composed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Course,
    Forum,
    #[serde(other)]
    Unknown,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Origin::Course => "Course Material",
            Origin::Forum => "Discourse Discussion",
            Origin::Unknown => "Reference",
        }
    }

    fn url_fields(self) -> &'static [&'static str] {
        match self {
            Origin::Course => &["url", "github_url"],
            Origin::Forum => &["post_url", "url"],
            Origin::Unknown => &["url"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub origin: Origin,
    pub url: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read source `{source_name}`: {cause}")]
    Io {
        source_name: String,
        #[source]
        cause: std::io::Error,
    },
    #[error("source `{source_name}` is not valid JSON: {cause}")]
    Json {
        source_name: String,
        #[source]
        cause: serde_json::Error,
    },
    #[error("source `{source_name}` must be a JSON array of records")]
    NotAnArray { source_name: String },
    #[error("record {index} in `{source_name}` is not a JSON object")]
    NotAnObject { source_name: String, index: usize },
    #[error("record {index} in `{source_name}` has no string `content` or `text` field")]
    MissingText { source_name: String, index: usize },
    #[error("record {index} in `{source_name}` has empty text")]
    EmptyText { source_name: String, index: usize },
}

/// One origin-tagged collection of raw JSON records.
#[derive(Debug, Clone)]
pub struct SourceCollection {
    pub name: String,
    pub origin: Origin,
    pub records: Value,
}

impl SourceCollection {
    pub fn new(name: impl Into<String>, origin: Origin, records: Value) -> Self {
        Self { name: name.into(), origin, records }
    }

    /// Read a collection from a JSON file; the file name becomes the source name.
    pub fn from_path<P: AsRef<Path>>(origin: Origin, path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let f = File::open(path).map_err(|cause| LoadError::Io { source_name: name.clone(), cause })?;
        let records = serde_json::from_reader(BufReader::new(f))
            .map_err(|cause| LoadError::Json { source_name: name.clone(), cause })?;
        Ok(Self { name, origin, records })
    }
}

/// Where to find the collections a store is loaded from. Kept around by the
/// server so a reload can re-read the same files.
#[derive(Debug, Clone, Default)]
pub struct SourcePaths {
    pub course: Vec<PathBuf>,
    pub forum: Vec<PathBuf>,
}

impl SourcePaths {
    pub fn is_empty(&self) -> bool { self.course.is_empty() && self.forum.is_empty() }

    pub fn read(&self) -> Result<Vec<SourceCollection>, LoadError> {
        let course = self.course.iter().map(|p| SourceCollection::from_path(Origin::Course, p));
        let forum = self.forum.iter().map(|p| SourceCollection::from_path(Origin::Forum, p));
        course.chain(forum).collect()
    }
}

/// Immutable, insertion-ordered collection of documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    docs: Vec<Document>,
}

impl DocumentStore {
    /// Ingest every collection in order. Any malformed record fails the whole
    /// load; a partially loaded store is never returned.
    pub fn load(sources: &[SourceCollection]) -> Result<Self, LoadError> {
        let mut docs = Vec::new();
        for source in sources {
            let records = source
                .records
                .as_array()
                .ok_or_else(|| LoadError::NotAnArray { source_name: source.name.clone() })?;
            for (index, record) in records.iter().enumerate() {
                let obj = record.as_object().ok_or_else(|| LoadError::NotAnObject {
                    source_name: source.name.clone(),
                    index,
                })?;
                let text = ["content", "text"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                    .ok_or_else(|| LoadError::MissingText { source_name: source.name.clone(), index })?;
                if text.trim().is_empty() {
                    return Err(LoadError::EmptyText { source_name: source.name.clone(), index });
                }
                let url = source
                    .origin
                    .url_fields()
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                    .filter(|u| !u.trim().is_empty())
                    .map(str::to_string);
                docs.push(Document { id: docs.len() as DocId, text: text.to_string(), origin: source.origin, url });
            }
            tracing::debug!(source = %source.name, origin = ?source.origin, records = records.len(), "loaded source collection");
        }
        Ok(Self { docs })
    }

    pub fn all(&self) -> &[Document] { &self.docs }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_course_and_forum_shapes_in_order() {
        let store = DocumentStore::load(&[
            SourceCollection::new("course", Origin::Course, json!([{"content": "intro", "url": "c1"}])),
            SourceCollection::new("forum", Origin::Forum, json!([
                {"content": "a post", "post_url": "f1", "username": "x"},
                {"text": "no link"}
            ])),
        ])
        .unwrap();
        let docs = store.all();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].origin, Origin::Course);
        assert_eq!(docs[0].url.as_deref(), Some("c1"));
        assert_eq!(docs[1].url.as_deref(), Some("f1"));
        assert_eq!(docs[2].id, 2);
        assert_eq!(docs[2].url, None);
    }

    #[test]
    fn missing_content_is_a_load_error() {
        let err = DocumentStore::load(&[SourceCollection::new(
            "forum",
            Origin::Forum,
            json!([{"content": "ok"}, {"post_url": "f2"}]),
        )])
        .unwrap_err();
        assert!(matches!(err, LoadError::MissingText { index: 1, .. }));
    }

    #[test]
    fn rejects_non_array_and_blank_text() {
        let err = DocumentStore::load(&[SourceCollection::new("c", Origin::Course, json!({"content": "x"}))]).unwrap_err();
        assert!(matches!(err, LoadError::NotAnArray { .. }));
        let err = DocumentStore::load(&[SourceCollection::new("c", Origin::Course, json!([{"content": "   "}]))]).unwrap_err();
        assert!(matches!(err, LoadError::EmptyText { index: 0, .. }));
    }
}
