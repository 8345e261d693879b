//! Value comparison for in-memory filtering and sorting.
//!
//! This module provides the equality used by `where` filters and the total
//! ordering used by `order_by`, both over BSON values.

use std::{cmp::Ordering, collections::BTreeMap};

use bson::{Bson, Document, datetime::DateTime};

use docmock_core::{document::lookup_field, query::WhereOp};

/// Type-erased, comparable representation of BSON values.
///
/// Integers of any width compare exactly with each other. Mixed integer and
/// double comparisons widen the integer, so `Int32(2)`, `Int64(2)` and
/// `Double(2.0)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (Int32 and Int64)
    Int(i64),
    /// Floating point value
    Double(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values, ordered by key
    Map(BTreeMap<&'a str, Comparable<'a>>),
    /// Any other BSON value, compared as-is
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<BTreeMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Int(a), Comparable::Double(b))
            | (Comparable::Double(b), Comparable::Int(a)) => cmp_int_double(*a, *b).is_eq(),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

/// Orders an integer against a double without rounding the integer away.
fn cmp_int_double(int: i64, double: f64) -> Ordering {
    let widened = int as f64;
    match widened.partial_cmp(&double) {
        // i64::MAX widens to 2^63, which no i64 reaches.
        Some(Ordering::Equal) if double >= i64::MAX as f64 => Ordering::Less,
        Some(Ordering::Equal) => int.cmp(&(double as i64)),
        Some(ordering) => ordering,
        None => widened.total_cmp(&double),
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Int(_) | Comparable::Double(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
            Comparable::Other(_) => 7,
        }
    }

    /// Total ordering used for sorting.
    ///
    /// Values of different types order by type: null, booleans, numbers, dates,
    /// strings, arrays, maps, then everything else. Arrays compare element-wise,
    /// maps compare their sorted entries key first.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => a.total_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => cmp_int_double(*a, *b),
            (Comparable::Double(a), Comparable::Int(b)) => cmp_int_double(*b, *a).reverse(),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.sort_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((left_key, left), (right_key, right))| {
                    left_key.cmp(right_key).then_with(|| left.sort_cmp(right))
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Other(Bson::ObjectId(a)), Comparable::Other(Bson::ObjectId(b))) => a.cmp(b),
            (Comparable::Other(a), Comparable::Other(b)) => {
                (a.element_type() as u8).cmp(&(b.element_type() as u8))
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

/// Compares two projected sort values. A missing field sorts below every value,
/// including null.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => Comparable::from(left).sort_cmp(&Comparable::from(right)),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Evaluates a single `where` clause against the document.
    ///
    /// Unsupported operators match every document.
    pub fn evaluate(&self, field: &str, op: &WhereOp, value: &Bson) -> bool {
        match op {
            WhereOp::Eq => match lookup_field(self.document, field) {
                Some(field_value) => Comparable::from(field_value) == Comparable::from(value),
                None => false,
            },
            WhereOp::ArrayContains => match lookup_field(self.document, field) {
                Some(Bson::Array(array)) => array
                    .iter()
                    .any(|item| Comparable::from(item) == Comparable::from(value)),
                _ => false,
            },
            WhereOp::Unsupported(_) => true,
        }
    }

    /// Returns a copy of `data` holding only the documents that match the clause,
    /// in their original order.
    pub fn filter_documents(data: &Document, field: &str, op: &WhereOp, value: &Bson) -> Document {
        data.iter()
            .filter(|(_, doc)| match doc.as_document() {
                Some(document) => DocumentEvaluator::new(document).evaluate(field, op, value),
                None => false,
            })
            .map(|(key, doc)| (key.clone(), doc.clone()))
            .collect()
    }
}
