//! Declarative aggregation language the engine compiles its statistics
//! queries into. A pipeline is an optional book-id scope plus a stage list;
//! the backend interprets it against a single collection and returns plain
//! JSON rows.

use crate::model::BookId;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Pipeline {
    /// When set, only documents for these book ids enter the stage list.
    pub scope: Option<Vec<BookId>>,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Pipeline over every document in the collection.
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { scope: None, stages }
    }

    /// Pipeline restricted to the given book ids before any stage runs.
    pub fn scoped(books: Vec<BookId>, stages: Vec<Stage>) -> Self {
        Self { scope: Some(books), stages }
    }

    /// Full scan, no transformation.
    pub fn scan() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub enum Stage {
    /// Keep rows whose `field` holds a book id contained in `ids`.
    MatchIn { field: &'static str, ids: Vec<BookId> },
    /// Emit one row per element of the `field` array, the element replacing
    /// the array. Rows without an array there are dropped.
    Unwind { field: &'static str },
    /// Fold rows into groups. Emits one row per group, in first-seen order,
    /// carrying the group key under `"key"` plus one field per accumulator.
    Group {
        key: GroupKey,
        accumulators: Vec<(&'static str, Accumulator)>,
    },
    /// Replace each row with a single field holding an array's length.
    ArrayLen { field: &'static str, into: &'static str },
    /// Stable sort on a numeric field.
    Sort { field: &'static str, descending: bool },
    /// Keep the first n rows.
    Limit(usize),
}

#[derive(Debug, Clone)]
pub enum GroupKey {
    /// A single group spanning all rows.
    Whole,
    /// One group per distinct value of a (dotted) field path.
    Field(&'static str),
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    /// Number of rows in the group.
    Count,
    /// Sum of a numeric field; stays an integer when every input was one.
    Sum(&'static str),
    /// Mean of a numeric field; null over an empty group.
    Avg(&'static str),
}

/// Looks up a dotted path in a JSON row.
pub fn field<'v>(row: &'v Value, path: &str) -> Option<&'v Value> {
    let mut cur = row;
    for part in path.split('.') {
        cur = cur.get(part)?;
    }
    Some(cur)
}
