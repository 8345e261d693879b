//! The query pipeline run when a deferred read executes.
//!
//! Execution order is fixed: order the documents, scan them through the
//! start-after cursor, and stop once the limit is reached. Filtering happens
//! earlier, when `filter` builds the node, so the pipeline only ever sees the
//! documents that survived it.

use std::cmp::Ordering;

use bson::{Bson, Document};
use tracing::trace;

use docmock_core::{
    document::lookup_field,
    query::{CursorState, Sort, SortDirection, StartAfter},
};

use crate::evaluator::compare_values;

/// Everything a read needs besides the data itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueryPlan<'a> {
    pub sorts: &'a [Sort],
    pub cursor: Option<&'a StartAfter>,
    /// Maximum number of results; zero means unlimited.
    pub limit: usize,
}

impl<'a> QueryPlan<'a> {
    /// Runs the plan over `data`, returning copies of the selected documents in
    /// result order.
    pub fn execute(&self, data: &Document) -> Vec<(String, Document)> {
        if data.is_empty() {
            return Vec::new();
        }

        let ordered = self.order(data);
        let mut cursor = match self.cursor {
            Some(builder) => builder.build(),
            None => CursorState::unbounded(),
        };

        let mut results = Vec::new();
        for (key, document) in ordered {
            if !cursor.matches(key) {
                continue;
            }

            results.push((key.to_string(), document.clone()));

            if self.limit > 0 && results.len() >= self.limit {
                break;
            }
        }

        trace!(
            scanned = data.len(),
            returned = results.len(),
            sort_keys = self.sorts.len(),
            limit = self.limit,
            "executed query pipeline"
        );

        results
    }

    /// Returns the documents in insertion order, or stably sorted by every sort
    /// key left to right when any are configured.
    fn order<'d>(&self, data: &'d Document) -> Vec<(&'d str, &'d Document)> {
        let documents = data
            .iter()
            .filter_map(|(key, value)| value.as_document().map(|doc| (key.as_str(), doc)));

        if self.sorts.is_empty() {
            return documents.collect();
        }

        let mut projected: Vec<(&'d str, &'d Document, Vec<Option<&'d Bson>>)> = documents
            .map(|(key, doc)| {
                let values = self
                    .sorts
                    .iter()
                    .map(|sort| lookup_field(doc, &sort.field))
                    .collect();
                (key, doc, values)
            })
            .collect();

        projected.sort_by(|(_, _, left), (_, _, right)| {
            self.sorts
                .iter()
                .zip(left.iter().zip(right.iter()))
                .map(|(sort, (left, right))| {
                    let ordering = compare_values(*left, *right);
                    match sort.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        projected
            .into_iter()
            .map(|(key, doc, _)| (key, doc))
            .collect()
    }
}
