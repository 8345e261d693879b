//! Normalization of data assigned into a mock node.
//!
//! Every data mapping stored by a node passes through [`normalize_data`] first.
//! Normalization is pure and idempotent, so normalizing already-stored data is
//! always a no-op.

use bson::{Bson, Document};
use tracing::warn;

/// Normalizes a data mapping of document key to document.
///
/// - Top-level entries that are not documents are dropped.
/// - `Undefined` fields are removed from documents at any depth.
/// - `Undefined` array elements are replaced with `Null` so positions are kept.
///
/// # Example
///
/// ```ignore
/// use bson::{doc, Bson};
/// use docmock_core::normalize::normalize_data;
///
/// let data = normalize_data(doc! { "a": { "n": 1, "gone": Bson::Undefined }, "b": 2 });
/// assert_eq!(data, doc! { "a": { "n": 1 } });
/// ```
pub fn normalize_data(data: Document) -> Document {
    data.into_iter()
        .filter_map(|(key, value)| match value {
            Bson::Document(document) => Some((key, Bson::Document(normalize_document(document)))),
            other => {
                warn!(
                    key = %key,
                    kind = ?other.element_type(),
                    "dropping non-document entry from data mapping"
                );
                None
            }
        })
        .collect()
}

/// Recursively normalizes a single document.
pub fn normalize_document(document: Document) -> Document {
    document
        .into_iter()
        .filter(|(_, value)| !matches!(value, Bson::Undefined))
        .map(|(key, value)| (key, normalize_value(value)))
        .collect()
}

fn normalize_value(value: Bson) -> Bson {
    match value {
        Bson::Document(document) => Bson::Document(normalize_document(document)),
        Bson::Array(array) => Bson::Array(
            array
                .into_iter()
                .map(|item| match item {
                    Bson::Undefined => Bson::Null,
                    other => normalize_value(other),
                })
                .collect(),
        ),
        other => other,
    }
}
