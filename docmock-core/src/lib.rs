//! Core types for docmock, a deterministic in-memory document tree for tests.
//!
//! This crate provides the building blocks shared by the in-memory implementation:
//!
//! - **Document helpers** ([`document`]) - Field path lookup, id derivation and serde conversions
//! - **Normalization** ([`normalize`]) - Cleaning of data assigned into a node
//! - **Query state** ([`query`]) - Sort keys, `where` operators and start-after cursors
//! - **Scheduling** ([`scheduler`]) - The FIFO flush queue with a virtual clock
//! - **Snapshots** ([`snapshot`]) - Per-document read results
//! - **Error handling** ([`error`]) - Error and result types

#[allow(unused_extern_crates)]
extern crate self as docmock_core;

pub mod document;
pub mod error;
pub mod normalize;
pub mod query;
pub mod scheduler;
pub mod snapshot;
