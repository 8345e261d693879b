//! Query state carried by every node in a mock tree.
//!
//! A node's query state is the list of sort keys, an optional result limit and
//! an optional start-after cursor. Filters are not part of the state: `where`
//! calls filter a node's data eagerly, so only [`WhereOp`] lives here.

use std::fmt;

use bson::Bson;

use crate::snapshot::DocumentSnapshot;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (lowest first). Missing fields sort first.
    #[default]
    Asc,
    /// Descending order (highest first). Missing fields sort last.
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sort key: which field path to sort by and in which direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The dot-separated field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Operators accepted by `where` filters.
///
/// Only equality and array containment are modeled. Anything else parses into
/// [`WhereOp::Unsupported`] and leaves the data set unfiltered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhereOp {
    /// `==`: deep equality with the field value.
    Eq,
    /// `array-contains`: the array-valued field includes the value.
    ArrayContains,
    /// Any operator the mock does not model, kept verbatim for logging.
    Unsupported(String),
}

impl From<&str> for WhereOp {
    fn from(op: &str) -> Self {
        match op {
            "==" => WhereOp::Eq,
            "array-contains" => WhereOp::ArrayContains,
            other => WhereOp::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for WhereOp {
    fn from(op: String) -> Self {
        WhereOp::from(op.as_str())
    }
}

impl fmt::Display for WhereOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereOp::Eq => f.write_str("=="),
            WhereOp::ArrayContains => f.write_str("array-contains"),
            WhereOp::Unsupported(op) => f.write_str(op),
        }
    }
}

/// Builds a fresh [`CursorState`] for every query execution.
///
/// The builder only remembers which document key the page starts after; all
/// per-scan state lives in the [`CursorState`] it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAfter {
    target_key: String,
}

impl StartAfter {
    pub fn new(target_key: impl Into<String>) -> Self {
        Self { target_key: target_key.into() }
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }

    /// Creates the one-shot scan state used by a single query execution.
    pub fn build(&self) -> CursorState {
        CursorState {
            target_key: Some(self.target_key.clone()),
            started: false,
        }
    }
}

/// Per-execution cursor state.
///
/// [`CursorState::matches`] returns `false` until the target key has been seen,
/// and `true` for every key after it. The target itself never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    target_key: Option<String>,
    started: bool,
}

impl CursorState {
    /// A cursor that considers every document in range from the start.
    pub fn unbounded() -> Self {
        Self { target_key: None, started: true }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn matches(&mut self, key: &str) -> bool {
        if self.started {
            return true;
        }

        if self.target_key.as_deref() == Some(key) {
            self.started = true;
        }

        false
    }
}

/// Arguments accepted by `start_after`.
///
/// Only a document snapshot can position a cursor. Raw field values are
/// accepted so callers written against a richer API still run, but they leave
/// the query unchanged.
#[derive(Debug, Clone)]
pub enum StartAfterArg {
    /// A document snapshot; the page starts after its id.
    Snapshot(DocumentSnapshot),
    /// Raw field values. Not modeled.
    FieldValues(Vec<Bson>),
}

impl From<DocumentSnapshot> for StartAfterArg {
    fn from(snapshot: DocumentSnapshot) -> Self {
        StartAfterArg::Snapshot(snapshot)
    }
}

impl From<&DocumentSnapshot> for StartAfterArg {
    fn from(snapshot: &DocumentSnapshot) -> Self {
        StartAfterArg::Snapshot(snapshot.clone())
    }
}

impl From<Vec<Bson>> for StartAfterArg {
    fn from(values: Vec<Bson>) -> Self {
        StartAfterArg::FieldValues(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_ops_parse() {
        assert_eq!(WhereOp::from("=="), WhereOp::Eq);
        assert_eq!(WhereOp::from("array-contains"), WhereOp::ArrayContains);
        assert_eq!(WhereOp::from(">"), WhereOp::Unsupported(">".to_string()));
        assert_eq!(WhereOp::from("in").to_string(), "in");
    }

    #[test]
    fn cursor_starts_strictly_after_target() {
        let mut cursor = StartAfter::new("b").build();

        assert!(!cursor.matches("a"));
        assert!(!cursor.matches("b"));
        assert!(cursor.started());
        assert!(cursor.matches("c"));
        assert!(cursor.matches("a"));
    }

    #[test]
    fn cursor_never_starts_without_target() {
        let mut cursor = StartAfter::new("missing").build();

        assert!(!cursor.matches("a"));
        assert!(!cursor.matches("b"));
        assert!(!cursor.started());
    }

    #[test]
    fn each_build_resets_state() {
        let builder = StartAfter::new("a");
        let mut first = builder.build();
        assert!(!first.matches("a"));
        assert!(first.matches("b"));

        let mut second = builder.build();
        assert!(!second.matches("b"));
    }

    #[test]
    fn unbounded_cursor_matches_everything() {
        let mut cursor = CursorState::unbounded();
        assert!(cursor.matches("a"));
        assert!(cursor.matches("z"));
    }
}
