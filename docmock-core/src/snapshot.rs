//! Per-document snapshots produced by reads.

use bson::{Bson, Document};
use serde::Deserialize;

use crate::{
    document::{from_document, lookup_field},
    error::{MockError, MockResult},
};

/// An immutable view of one document at the time a read executed.
///
/// The snapshot owns its copy of the document, so mutating the value returned
/// by [`DocumentSnapshot::data`] never reaches the node it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    id: String,
    path: String,
    data: Option<Document>,
}

impl DocumentSnapshot {
    /// Creates a snapshot of an existing document.
    pub fn new(id: impl Into<String>, path: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            data: Some(data),
        }
    }

    /// Creates a snapshot of a document that does not exist.
    pub fn missing(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            data: None,
        }
    }

    /// Returns the document key within its collection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the full path of the document.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns a copy of the document data, or `None` if the document does not exist.
    pub fn data(&self) -> Option<Document> {
        self.data.clone()
    }

    /// Returns a copy of the value at a dot-separated field path.
    pub fn get(&self, field: &str) -> Option<Bson> {
        self.data
            .as_ref()
            .and_then(|data| lookup_field(data, field))
            .cloned()
    }

    /// Deserializes the document data into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::DocumentNotFound`] if the document does not exist, or
    /// [`MockError::Serialization`] if the data does not fit `T`.
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> MockResult<T> {
        match &self.data {
            Some(data) => from_document(data.clone()),
            None => Err(MockError::DocumentNotFound(self.path.clone())),
        }
    }
}
