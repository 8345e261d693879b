//! Main docmock crate: a deterministic, in-memory document tree for tests.
//!
//! docmock stands in for a hierarchical document database so calling code can
//! be exercised without a live backend. It re-exports the core types and the
//! in-memory implementation behind a single crate.
//!
//! # Features
//!
//! - **Query building** - `filter`, `order_by`, `limit` and `start_after`, each
//!   returning a new node
//! - **Deterministic completion** - Reads resolve only when the tree's queue is
//!   flushed, explicitly or through auto-flush
//! - **Virtual time** - Delayed flushes fire when the test advances the clock
//! - **Error injection** - One-shot failures for the next operation of a type
//!
//! # Quick Start
//!
//! ```ignore
//! use docmock::{prelude::*, bson::doc};
//!
//! #[tokio::main]
//! async fn main() {
//!     let root = Reference::root("root", doc! {
//!         "users": {
//!             "alice": { "age": 30, "tags": ["admin"] },
//!             "bob": { "age": 25, "tags": [] },
//!         },
//!     });
//!     let users = root.child("users");
//!
//!     // Reads wait for a flush
//!     let pending = users.order_by_with("age", SortDirection::Desc).limit(1).get();
//!     root.flush(None);
//!
//!     let snapshot = pending.await.unwrap();
//!     assert_eq!(snapshot.keys(), vec!["alice"]);
//! }
//! ```
//!
//! # Auto-flush
//!
//! ```ignore
//! use docmock::{prelude::*, bson::doc};
//!
//! #[tokio::main]
//! async fn main() {
//!     let users = Reference::builder("users")
//!         .data(doc! { "alice": { "age": 30 } })
//!         .auto_flush(true)
//!         .build()
//!         .unwrap();
//!
//!     // Resolved as soon as it is queued
//!     let snapshot = users.get().await.unwrap();
//!     assert_eq!(snapshot.size(), 1);
//! }
//! ```
//!
//! # Error injection
//!
//! ```ignore
//! use docmock::{prelude::*, bson::doc};
//!
//! #[tokio::main]
//! async fn main() {
//!     let users = Reference::root("users", doc! { "alice": { "age": 30 } });
//!     users.fail_next("get", MockError::Backend("unavailable".into()));
//!
//!     let failed = users.get();
//!     let succeeded = users.get();
//!     users.flush(None);
//!
//!     assert!(failed.await.is_err());
//!     assert!(succeeded.await.is_ok());
//! }
//! ```

pub mod prelude;

pub use docmock_core::{document, error, normalize, query, scheduler, snapshot};

// Re-export BSON types for convenience
pub use bson;

/// In-memory reference nodes and read results.
pub mod memory {
    pub use docmock_memory::{
        DocumentStream, Operation, PendingResult, QuerySnapshot, Reference, ReferenceBuilder,
    };
}
