//! Query results packaged for consumption.

use bson::Document;

use docmock_core::snapshot::DocumentSnapshot;

use crate::reference::Reference;

/// The result of a completed read, addressed by the collection it was read from.
///
/// Document snapshots appear in result order: sorted, paged and limited
/// exactly as the query described.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    query: Reference,
    docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    /// Packages ordered query results.
    pub fn new(query: Reference, results: Vec<(String, Document)>) -> Self {
        let docs = results
            .into_iter()
            .map(|(key, data)| {
                let path = query.child_path(&key);
                DocumentSnapshot::new(key, path, data)
            })
            .collect();

        Self { query, docs }
    }

    /// Creates a snapshot with no documents.
    pub fn empty(query: Reference) -> Self {
        Self { query, docs: Vec::new() }
    }

    /// Returns the collection reference the results belong to.
    pub fn query(&self) -> &Reference {
        &self.query
    }

    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    pub fn size(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Returns the document keys in result order.
    pub fn keys(&self) -> Vec<&str> {
        self.docs.iter().map(DocumentSnapshot::id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.docs.iter()
    }

    pub fn for_each<F: FnMut(&DocumentSnapshot)>(&self, f: F) {
        self.docs.iter().for_each(f)
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}
