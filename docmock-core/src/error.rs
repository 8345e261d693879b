//! Error types and result types for mock document tree operations.
//!
//! Use [`MockResult<T>`] as the return type for fallible operations. Errors
//! registered with `fail_next` are surfaced unchanged through the deferred
//! operation they were registered for.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors produced by a mock document tree.
///
/// Most variants exist so tests can inject a realistic failure; the mock itself
/// only raises [`MockError::InvalidQuery`], [`MockError::Serialization`] and
/// [`MockError::Dropped`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MockError {
    /// A failure injected by a test for a specific operation type.
    #[error("Injected error: {0}")]
    Injected(String),
    /// The query was built in a way that cannot be executed, such as a cursor
    /// without any sort keys.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A deferred operation was discarded before it ever ran.
    #[error("Operation dropped before flush: {0}")]
    Dropped(String),
    /// The requested document was not found.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    /// A simulated backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A specialized `Result` type for mock document tree operations.
pub type MockResult<T> = Result<T, MockError>;

impl From<BsonError> for MockError {
    fn from(err: BsonError) -> Self {
        MockError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MockError {
    fn from(err: SerdeJsonError) -> Self {
        MockError::Serialization(err.to_string())
    }
}
