//! Book-set resolution: mapping the four optional filter dimensions to a
//! concrete set of book ids. Date bounds are boundary-exclusive when given
//! and unconstrained when absent; author and genre narrow by entity
//! back-references, intersected when both are present.

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::model::{BookId, SurrogateId};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

/// Optional filter dimensions, already parsed and typed by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub author: Option<SurrogateId>,
    pub genre: Option<SurrogateId>,
}

impl FilterSpec {
    pub fn is_unfiltered(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.author.is_none()
            && self.genre.is_none()
    }
}

/// Outcome of resolution; consumers branch on the tag explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No dimension set: operations run corpus-wide, unscoped.
    Corpus,
    Books(ResolvedBookSet),
    /// The filters matched nothing.
    Empty,
}

/// A non-empty filtered book set together with its observed date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBookSet {
    books: Vec<BookId>, // ascending
    first_date: NaiveDate,
    last_date: NaiveDate,
}

impl ResolvedBookSet {
    pub fn books(&self) -> &[BookId] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Earliest publication date among the surviving books.
    pub fn first_date(&self) -> NaiveDate {
        self.first_date
    }

    /// Latest publication date among the surviving books.
    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }
}

pub struct BookSetResolver {
    catalog: Arc<Catalog>,
}

impl BookSetResolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, spec: &FilterSpec) -> Result<Resolution, EngineError> {
        if spec.is_unfiltered() {
            return Ok(Resolution::Corpus);
        }

        let dates = self.catalog.dates()?;
        let candidates: Vec<BookId> = match (spec.author, spec.genre) {
            (None, None) => dates.all_ids(),
            (Some(author), None) => {
                let authors = self.catalog.authors()?;
                authors.books_for(author)?.iter().copied().collect()
            }
            (None, Some(genre)) => {
                let genres = self.catalog.genres()?;
                genres.books_for(genre)?.iter().copied().collect()
            }
            (Some(author), Some(genre)) => {
                let authors = self.catalog.authors()?;
                let genres = self.catalog.genres()?;
                authors
                    .books_for(author)?
                    .intersection(genres.books_for(genre)?)
                    .copied()
                    .collect()
            }
        };

        let mut books = Vec::new();
        let mut range: Option<(NaiveDate, NaiveDate)> = None;
        for id in candidates {
            let published = dates.date_of(id)?;
            if let Some(start) = spec.start_date {
                if published <= start {
                    continue;
                }
            }
            if let Some(end) = spec.end_date {
                if published >= end {
                    continue;
                }
            }
            books.push(id);
            range = Some(match range {
                None => (published, published),
                Some((first, last)) => (first.min(published), last.max(published)),
            });
        }

        match range {
            None => {
                debug!(?spec, "filters matched no books");
                Ok(Resolution::Empty)
            }
            Some((first_date, last_date)) => {
                Ok(Resolution::Books(ResolvedBookSet { books, first_date, last_date }))
            }
        }
    }
}
