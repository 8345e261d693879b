//! Document value helpers shared by every node in a mock tree.
//!
//! A node's data is a [`Document`] mapping document keys to documents, each of
//! which maps field names to arbitrarily nested [`Bson`] values. The helpers here
//! convert caller values into that shape, look up dot-separated field paths and
//! derive node ids from paths.

use std::sync::LazyLock;

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MockError, MockResult};

/// Path metacharacters are `.`, `$`, `[`, `]`, `#` and `/`. The id is the trailing
/// run of anything else.
static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^.$\[\]#/]+)$").expect("id pattern is valid")
});

/// Derives a node id from the final segment of a path.
///
/// Returns `None` when the path ends in a metacharacter (for example `"users/"`).
///
/// # Example
///
/// ```ignore
/// use docmock_core::document::derive_id;
///
/// assert_eq!(derive_id("root/users").as_deref(), Some("users"));
/// assert_eq!(derive_id("root/users/"), None);
/// ```
pub fn derive_id(path: &str) -> Option<String> {
    ID_PATTERN
        .captures(path)
        .and_then(|captures| captures.get(1))
        .map(|segment| segment.as_str().to_string())
}

/// Looks up a dot-separated field path (`"address.city"`) inside a document.
pub fn lookup_field<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current
            .as_document()?
            .get(segment)?;
    }

    Some(current)
}

/// Converts any serializable value into a BSON document.
///
/// # Errors
///
/// Returns [`MockError::Serialization`] if the value does not serialize into a
/// document (for example a bare string or number).
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> MockResult<Document> {
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(MockError::Serialization(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// Converts a JSON object into a BSON document.
pub fn json_to_document(value: &Value) -> MockResult<Document> {
    to_document(value)
}

/// Deserializes a BSON document into any deserializable type.
pub fn from_document<T: for<'de> Deserialize<'de>>(document: Document) -> MockResult<T> {
    Ok(deserialize_from_bson(Bson::Document(document))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn derive_id_takes_trailing_segment() {
        assert_eq!(derive_id("users").as_deref(), Some("users"));
        assert_eq!(derive_id("root/users").as_deref(), Some("users"));
        assert_eq!(derive_id("root/users/alice").as_deref(), Some("alice"));
        assert_eq!(derive_id("root/users.archive").as_deref(), Some("archive"));
    }

    #[test]
    fn derive_id_is_none_without_trailing_segment() {
        assert_eq!(derive_id(""), None);
        assert_eq!(derive_id("root/users/"), None);
        assert_eq!(derive_id("root/users#"), None);
    }

    #[test]
    fn lookup_field_follows_dot_paths() {
        let document = doc! { "n": 1, "address": { "city": "Oslo", "geo": { "lat": 59 } } };

        assert_eq!(lookup_field(&document, "n"), Some(&Bson::Int32(1)));
        assert_eq!(
            lookup_field(&document, "address.city"),
            Some(&Bson::String("Oslo".to_string()))
        );
        assert_eq!(lookup_field(&document, "address.geo.lat"), Some(&Bson::Int32(59)));
        assert_eq!(lookup_field(&document, "address.zip"), None);
        assert_eq!(lookup_field(&document, "n.deeper"), None);
    }

    #[test]
    fn json_objects_convert_to_documents() {
        let document = json_to_document(&json!({ "a": { "n": 1 } })).unwrap();
        assert!(document.get_document("a").is_ok());

        assert!(matches!(
            json_to_document(&json!("nope")),
            Err(MockError::Serialization(_))
        ));
    }
}
