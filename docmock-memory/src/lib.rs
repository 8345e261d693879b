//! In-memory document tree with deferred, deterministic reads.
//!
//! This crate provides the [`Reference`] node: a position in a document tree
//! that doubles as a query builder. Reads are queued on a flush queue shared by
//! the whole tree and only execute when the queue is flushed, which gives tests
//! full control over when results arrive.
//!
//! # Features
//!
//! - **Query pipeline** - Equality and array-contains filters, multi-key sorting,
//!   start-after cursors and limits
//! - **Deferred execution** - Explicit flushes, auto-flush and delayed flushes on a
//!   virtual clock
//! - **Error injection** - One-shot failures per operation type
//! - **Value semantics** - Data is copied on every read and write
//!
//! # Quick Start
//!
//! ```ignore
//! use bson::doc;
//! use docmock_memory::Reference;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let items = Reference::root("items", doc! {
//!         "a": { "n": 1, "tags": ["x"] },
//!         "b": { "n": 2, "tags": ["y"] },
//!     });
//!
//!     let pending = items.filter("tags", "array-contains", "x").get();
//!     items.flush(None);
//!
//!     let snapshot = pending.await?;
//!     assert_eq!(snapshot.keys(), vec!["a"]);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmock_memory;

pub mod evaluator;
pub mod pending;
pub mod pipeline;
pub mod reference;
pub mod snapshot;

pub use pending::{DocumentStream, PendingResult};
pub use reference::{Operation, Reference, ReferenceBuilder};
pub use snapshot::QuerySnapshot;
