//! Semantic-field computation. For a resolved book set, every vocabulary
//! term becomes a sparse row of TF-IDF weights over the set's books; the
//! field of a query term is the five rows nearest to its own by cosine
//! distance. The query term itself sits at distance zero, so it leads the
//! ranking.

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::filter::Resolution;
use crate::model::{BookId, GlossaryDoc};
use crate::storage::pipeline::{GroupKey, Pipeline, Stage};
use crate::storage::{Collection, Storage, StorageError};
use indexmap::IndexSet;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Number of terms returned, the query term included.
pub const FIELD_SIZE: usize = 5;

/// A vocabulary term with its cosine distance from the query term.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    pub term: String,
    pub distance: f64,
}

pub struct SemanticFieldEngine {
    storage: Arc<dyn Storage>,
    catalog: Arc<Catalog>,
}

impl SemanticFieldEngine {
    pub fn new(storage: Arc<dyn Storage>, catalog: Arc<Catalog>) -> Self {
        Self { storage, catalog }
    }

    pub fn semantic_field(
        &self,
        resolution: &Resolution,
        word: &str,
    ) -> Result<Vec<Neighbor>, EngineError> {
        let books: Vec<BookId> = match resolution {
            Resolution::Corpus => self.catalog.dates()?.all_ids(),
            Resolution::Books(set) => set.books().to_vec(),
            Resolution::Empty => return Err(EngineError::NoBooksFound),
        };
        debug!(books = books.len(), %word, "computing semantic field");

        let vocabulary = self.set_vocabulary(&books)?;
        let Some(query_row) = vocabulary.get_index_of(word) else {
            return Err(EngineError::WordNotFound(word.to_string()));
        };

        let glossaries = self.glossaries_by_book(&books)?;
        let postings = self.restricted_postings(&books)?;

        let columns: HashMap<BookId, usize> =
            books.iter().enumerate().map(|(col, &id)| (id, col)).collect();
        let mut matrix = TermBookMatrix::new(vocabulary.len());
        for (row, term) in vocabulary.iter().enumerate() {
            let Some(posting) = postings.get(term.as_str()) else { continue };
            if posting.is_empty() {
                continue;
            }
            let idf = books.len() as f64 / posting.len() as f64;
            for id in posting {
                let Some(glossary) = glossaries.get(id) else { continue };
                let Some(&occ) = glossary.get(term.as_str()) else { continue };
                matrix.push(row, columns[id], tf_idf(occ, idf));
            }
        }
        matrix.seal();

        let mut ranked: Vec<(usize, f64)> = (0..vocabulary.len())
            .map(|row| (row, matrix.distance(query_row, row)))
            .collect();
        // stable sort: equal distances keep vocabulary enumeration order
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(ranked
            .into_iter()
            .take(FIELD_SIZE)
            .filter_map(|(row, distance)| {
                vocabulary
                    .get_index(row)
                    .map(|term| Neighbor { term: term.clone(), distance })
            })
            .collect())
    }

    /// Distinct terms over the set's glossaries, in first-seen order. This
    /// enumeration defines the matrix rows.
    fn set_vocabulary(&self, books: &[BookId]) -> Result<IndexSet<String>, EngineError> {
        let pipeline = Pipeline::scoped(
            books.to_vec(),
            vec![
                Stage::Unwind { field: "glossary" },
                Stage::Group { key: GroupKey::Field("glossary.word"), accumulators: vec![] },
            ],
        );
        let rows = self.storage.aggregate(Collection::Glossaries, &pipeline)?;
        Ok(rows
            .iter()
            .filter_map(|row| row["key"].as_str().map(str::to_string))
            .collect())
    }

    fn glossaries_by_book(
        &self,
        books: &[BookId],
    ) -> Result<HashMap<BookId, HashMap<String, u64>>, EngineError> {
        let rows = self.storage.find_many(Collection::Glossaries, books)?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let doc: GlossaryDoc =
                serde_json::from_value(row).map_err(|e| StorageError::Corrupt(e.to_string()))?;
            out.insert(
                doc.book,
                doc.glossary.into_iter().map(|entry| (entry.word, entry.occ)).collect(),
            );
        }
        Ok(out)
    }

    /// The inverted index with every posting cut down to the resolved set.
    /// Posting lengths after the cut are the IDF denominators.
    fn restricted_postings(
        &self,
        books: &[BookId],
    ) -> Result<HashMap<String, Vec<BookId>>, EngineError> {
        let table = self.storage.find_one(Collection::Idf, "global")?;
        let mut postings: HashMap<String, Vec<BookId>> =
            serde_json::from_value(table).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let keep: HashSet<BookId> = books.iter().copied().collect();
        for posting in postings.values_mut() {
            posting.retain(|id| keep.contains(id));
        }
        Ok(postings)
    }
}

/// Log-scaled term frequency times set-relative rarity.
fn tf_idf(occ: u64, idf: f64) -> f64 {
    (1.0 + (occ as f64).ln()) * idf
}

/// Sparse term/book matrix: one row per vocabulary term, entries sorted by
/// book column after `seal`.
struct TermBookMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    norms: Vec<f64>,
}

impl TermBookMatrix {
    fn new(rows: usize) -> Self {
        Self { rows: vec![Vec::new(); rows], norms: Vec::new() }
    }

    fn push(&mut self, row: usize, col: usize, weight: f64) {
        self.rows[row].push((col, weight));
    }

    fn seal(&mut self) {
        for row in &mut self.rows {
            row.sort_by_key(|&(col, _)| col);
        }
        self.norms = self
            .rows
            .iter()
            .map(|row| row.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt())
            .collect();
    }

    fn dot(&self, a: usize, b: usize) -> f64 {
        let (ra, rb) = (&self.rows[a], &self.rows[b]);
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < ra.len() && j < rb.len() {
            match ra[i].0.cmp(&rb[j].0) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    sum += ra[i].1 * rb[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Cosine distance between two rows. A row is at distance zero from
    /// itself; rows without any weight are infinitely far from everything.
    fn distance(&self, a: usize, b: usize) -> f64 {
        if a == b {
            return 0.0;
        }
        let (na, nb) = (self.norms[a], self.norms[b]);
        if na == 0.0 || nb == 0.0 {
            return f64::INFINITY;
        }
        let cos = self.dot(a, b) / (na * nb);
        (1.0 - cos).max(0.0)
    }
}
