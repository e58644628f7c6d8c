use crate::error::EngineError;
use crate::model::{BookHeader, BookId};
use crate::storage::Storage;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Publication dates for the whole corpus, held both date-ordered (boundary
/// questions) and id-keyed (point lookups during filtering).
pub struct DateIndex {
    by_date: Vec<(BookId, NaiveDate)>,
    by_id: BTreeMap<BookId, NaiveDate>,
}

impl DateIndex {
    pub fn build(storage: &dyn Storage) -> Result<Self, EngineError> {
        let mut by_date: Vec<(BookId, NaiveDate)> = storage
            .list_books()?
            .into_iter()
            .map(|BookHeader { id, published }| (id, published))
            .collect();
        by_date.sort_by_key(|&(id, published)| (published, id));
        let by_id = by_date.iter().copied().collect();
        Ok(Self { by_date, by_id })
    }

    pub fn date_of(&self, id: BookId) -> Result<NaiveDate, EngineError> {
        self.by_id.get(&id).copied().ok_or(EngineError::UnknownBook(id))
    }

    /// Earliest and latest publication dates; None for an empty corpus.
    pub fn boundaries(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.by_date.first(), self.by_date.last()) {
            (Some(&(_, first)), Some(&(_, last))) => Some((first, last)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Every book id, ascending.
    pub fn all_ids(&self) -> Vec<BookId> {
        self.by_id.keys().copied().collect()
    }
}
