//! Convenient re-exports of commonly used types from docmock.
//!
//! ```ignore
//! use docmock::prelude::*;
//! ```

pub use docmock_core::{
    error::{MockError, MockResult},
    query::{SortDirection, StartAfterArg, WhereOp},
    scheduler::FlushDelay,
    snapshot::DocumentSnapshot,
};
pub use docmock_memory::{
    DocumentStream, Operation, PendingResult, QuerySnapshot, Reference, ReferenceBuilder,
};
