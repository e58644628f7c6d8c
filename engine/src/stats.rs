//! Aggregation statistics over a resolved book set: the dashboard record,
//! the advanced word/sentence figures and the word cloud. Every number is
//! produced by a pipeline against the storage backend; an empty resolution
//! short-circuits to the canonical empty record instead of failing.

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::filter::{FilterSpec, Resolution};
use crate::model::BookId;
use crate::storage::pipeline::{Accumulator, GroupKey, Pipeline, Stage};
use crate::storage::{Collection, Storage};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const WORD_CLOUD_SIZE: usize = 20;

/// Aggregated word totals render as a plain integer below 100 000 and as a
/// thousands-truncated "NK" string from there up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WordTotal {
    Exact(u64),
    Thousands(String),
}

impl WordTotal {
    const K_THRESHOLD: u64 = 100_000;

    pub fn from_raw(total: u64) -> Self {
        if total < Self::K_THRESHOLD {
            WordTotal::Exact(total)
        } else {
            WordTotal::Thousands(format!("{}K", total / 1000))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub books: u64,
    pub authors: u64,
    pub genres: u64,
    pub vocabulary: u64,
    pub words: WordTotal,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl DashboardStats {
    pub fn empty() -> Self {
        Self {
            books: 0,
            authors: 0,
            genres: 0,
            vocabulary: 0,
            words: WordTotal::Exact(0),
            first_date: None,
            last_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordFigures {
    pub total: u64,
    pub avg_per_book: u64,
    pub avg_per_sentence: u64,
    pub avg_vocabulary: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentenceFigures {
    pub total: u64,
    pub avg_per_book: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvancedStats {
    pub words: WordFigures,
    pub sentences: SentenceFigures,
}

impl AdvancedStats {
    pub fn empty() -> Self {
        Self {
            words: WordFigures { total: 0, avg_per_book: 0, avg_per_sentence: 0, avg_vocabulary: 0 },
            sentences: SentenceFigures { total: 0, avg_per_book: 0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudTerm {
    pub term: String,
    pub count: u64,
}

pub struct StatsAggregator {
    storage: Arc<dyn Storage>,
    catalog: Arc<Catalog>,
}

impl StatsAggregator {
    pub fn new(storage: Arc<dyn Storage>, catalog: Arc<Catalog>) -> Self {
        Self { storage, catalog }
    }

    /// Dashboard record for a resolution. The active filters are needed too:
    /// a pinned author or genre counts as exactly one without another
    /// aggregation round-trip.
    pub fn dashboard(
        &self,
        spec: &FilterSpec,
        resolution: &Resolution,
    ) -> Result<DashboardStats, EngineError> {
        let scope: Option<Vec<BookId>>;
        let mut out = DashboardStats::empty();
        match resolution {
            Resolution::Empty => return Ok(out),
            Resolution::Corpus => {
                let dates = self.catalog.dates()?;
                scope = None;
                out.books = dates.len() as u64;
                out.authors = self.catalog.authors()?.len() as u64;
                out.genres = self.catalog.genres()?.len() as u64;
                if let Some((first, last)) = dates.boundaries() {
                    out.first_date = Some(first);
                    out.last_date = Some(last);
                }
            }
            Resolution::Books(set) => {
                scope = Some(set.books().to_vec());
                out.books = set.len() as u64;
                out.authors = if spec.author.is_some() {
                    1
                } else {
                    self.distinct_entities(Collection::Authors, set.books())?
                };
                out.genres = if spec.genre.is_some() {
                    1
                } else {
                    self.distinct_entities(Collection::Genres, set.books())?
                };
                out.first_date = Some(set.first_date());
                out.last_date = Some(set.last_date());
            }
        }

        out.vocabulary = self.vocabulary_size(scope.clone())?;
        out.words = WordTotal::from_raw(self.word_total(scope)?);
        Ok(out)
    }

    pub fn advanced(&self, resolution: &Resolution) -> Result<AdvancedStats, EngineError> {
        let scope = match resolution {
            Resolution::Empty => return Ok(AdvancedStats::empty()),
            Resolution::Corpus => None,
            Resolution::Books(set) => Some(set.books().to_vec()),
        };

        let counts = Pipeline {
            scope: scope.clone(),
            stages: vec![Stage::Group {
                key: GroupKey::Whole,
                accumulators: vec![
                    ("words_total", Accumulator::Sum("stats.words")),
                    ("words_avg_per_book", Accumulator::Avg("stats.words")),
                    ("words_avg_per_sentence", Accumulator::Avg("stats.words_per_sentence")),
                    ("sentences_total", Accumulator::Sum("stats.sentences")),
                    ("sentences_avg_per_book", Accumulator::Avg("stats.sentences")),
                ],
            }],
        };
        let vocab = Pipeline {
            scope,
            stages: vec![
                Stage::ArrayLen { field: "glossary", into: "glossary_count" },
                Stage::Group {
                    key: GroupKey::Whole,
                    accumulators: vec![("avg_words", Accumulator::Avg("glossary_count"))],
                },
            ],
        };

        let count_rows = self.storage.aggregate(Collection::BookStats, &counts)?;
        let vocab_rows = self.storage.aggregate(Collection::Glossaries, &vocab)?;

        Ok(AdvancedStats {
            words: WordFigures {
                total: first_u64(&count_rows, "words_total"),
                avg_per_book: first_avg(&count_rows, "words_avg_per_book"),
                avg_per_sentence: first_avg(&count_rows, "words_avg_per_sentence"),
                avg_vocabulary: first_avg(&vocab_rows, "avg_words"),
            },
            sentences: SentenceFigures {
                total: first_u64(&count_rows, "sentences_total"),
                avg_per_book: first_avg(&count_rows, "sentences_avg_per_book"),
            },
        })
    }

    /// Top terms by summed occurrences, descending; ties keep first-seen
    /// vocabulary order.
    pub fn word_cloud(&self, resolution: &Resolution) -> Result<Vec<CloudTerm>, EngineError> {
        let scope = match resolution {
            Resolution::Empty => return Ok(Vec::new()),
            Resolution::Corpus => None,
            Resolution::Books(set) => Some(set.books().to_vec()),
        };
        let pipeline = Pipeline {
            scope,
            stages: vec![
                Stage::Unwind { field: "glossary" },
                Stage::Group {
                    key: GroupKey::Field("glossary.word"),
                    accumulators: vec![("occ", Accumulator::Sum("glossary.occ"))],
                },
                Stage::Sort { field: "occ", descending: true },
                Stage::Limit(WORD_CLOUD_SIZE),
            ],
        };
        let rows = self.storage.aggregate(Collection::Glossaries, &pipeline)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let term = row["key"].as_str()?.to_string();
                let count = row["occ"].as_u64()?;
                Some(CloudTerm { term, count })
            })
            .collect())
    }

    fn vocabulary_size(&self, scope: Option<Vec<BookId>>) -> Result<u64, EngineError> {
        let pipeline = Pipeline {
            scope,
            stages: vec![
                Stage::Unwind { field: "glossary" },
                Stage::Group { key: GroupKey::Field("glossary.word"), accumulators: vec![] },
                Stage::Group {
                    key: GroupKey::Whole,
                    accumulators: vec![("vocab_total", Accumulator::Count)],
                },
            ],
        };
        let rows = self.storage.aggregate(Collection::Glossaries, &pipeline)?;
        Ok(first_u64(&rows, "vocab_total"))
    }

    fn word_total(&self, scope: Option<Vec<BookId>>) -> Result<u64, EngineError> {
        let pipeline = Pipeline {
            scope,
            stages: vec![
                Stage::Unwind { field: "glossary" },
                Stage::Group {
                    key: GroupKey::Whole,
                    accumulators: vec![("words_total", Accumulator::Sum("glossary.occ"))],
                },
            ],
        };
        let rows = self.storage.aggregate(Collection::Glossaries, &pipeline)?;
        Ok(first_u64(&rows, "words_total"))
    }

    /// Distinct authors or genres referenced by a book set, via the entity
    /// collection's back-references.
    fn distinct_entities(&self, collection: Collection, books: &[BookId]) -> Result<u64, EngineError> {
        let pipeline = Pipeline::new(vec![
            Stage::Unwind { field: "books" },
            Stage::MatchIn { field: "books", ids: books.to_vec() },
            Stage::Group { key: GroupKey::Field("id"), accumulators: vec![] },
            Stage::Group { key: GroupKey::Whole, accumulators: vec![("count", Accumulator::Count)] },
        ]);
        let rows = self.storage.aggregate(collection, &pipeline)?;
        Ok(first_u64(&rows, "count"))
    }
}

/// A missing row reads as zero: aggregating nothing is not an error.
fn first_u64(rows: &[Value], field: &str) -> u64 {
    rows.first().and_then(|row| row[field].as_u64()).unwrap_or(0)
}

/// Averages truncate toward zero.
fn first_avg(rows: &[Value], field: &str) -> u64 {
    rows.first().and_then(|row| row[field].as_f64()).map_or(0, |v| v as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BookSetResolver;
    use crate::storage::memory::MemoryStore;
    use crate::testutil::{date, tiny_corpus};
    use std::time::Duration;

    fn setup() -> (StatsAggregator, BookSetResolver) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new(tiny_corpus()));
        let catalog = Arc::new(Catalog::new(storage.clone(), Duration::from_secs(300)));
        (StatsAggregator::new(storage, catalog.clone()), BookSetResolver::new(catalog))
    }

    #[test]
    fn word_totals_format_with_k_notation() {
        assert_eq!(WordTotal::from_raw(99_999), WordTotal::Exact(99_999));
        assert_eq!(WordTotal::from_raw(100_000), WordTotal::Thousands("100K".into()));
        assert_eq!(WordTotal::from_raw(104_500_000), WordTotal::Thousands("104500K".into()));
    }

    #[test]
    fn word_total_serializes_untagged() {
        let exact = serde_json::to_value(WordTotal::from_raw(99_999)).unwrap();
        assert_eq!(exact, serde_json::json!(99_999));
        let shortened = serde_json::to_value(WordTotal::from_raw(104_500_000)).unwrap();
        assert_eq!(shortened, serde_json::json!("104500K"));
    }

    #[test]
    fn corpus_wide_dashboard() {
        let (stats, resolver) = setup();
        let resolution = resolver.resolve(&FilterSpec::default()).unwrap();
        let out = stats.dashboard(&FilterSpec::default(), &resolution).unwrap();
        assert_eq!(out.books, 3);
        assert_eq!(out.authors, 2);
        assert_eq!(out.genres, 1);
        assert_eq!(out.vocabulary, 11);
        assert_eq!(out.words, WordTotal::Exact(28));
        assert_eq!(out.first_date, Some(date(2000, 1, 1)));
        assert_eq!(out.last_date, Some(date(2010, 12, 31)));
    }

    #[test]
    fn filtered_dashboard_pins_the_active_dimension() {
        let (stats, resolver) = setup();
        let spec = FilterSpec { author: Some(0), ..FilterSpec::default() };
        let resolution = resolver.resolve(&spec).unwrap();
        let out = stats.dashboard(&spec, &resolution).unwrap();
        assert_eq!(out.books, 2);
        assert_eq!(out.authors, 1);
        assert_eq!(out.genres, 1); // only book 1 carries a genre
        assert_eq!(out.vocabulary, 7);
        assert_eq!(out.words, WordTotal::Exact(16));
        assert_eq!(out.first_date, Some(date(2000, 1, 1)));
        assert_eq!(out.last_date, Some(date(2005, 6, 15)));
    }

    #[test]
    fn empty_resolution_yields_canonical_empty_dashboard() {
        let (stats, resolver) = setup();
        let spec = FilterSpec { start_date: Some(date(2020, 1, 1)), ..FilterSpec::default() };
        let resolution = resolver.resolve(&spec).unwrap();
        assert_eq!(resolution, Resolution::Empty);
        assert_eq!(stats.dashboard(&spec, &resolution).unwrap(), DashboardStats::empty());
    }

    #[test]
    fn corpus_wide_advanced_stats_truncate_averages() {
        let (stats, resolver) = setup();
        let resolution = resolver.resolve(&FilterSpec::default()).unwrap();
        let out = stats.advanced(&resolution).unwrap();
        assert_eq!(out.words.total, 7500);
        assert_eq!(out.words.avg_per_book, 2500);
        assert_eq!(out.words.avg_per_sentence, 12); // (10 + 12.5 + 16) / 3, truncated
        assert_eq!(out.words.avg_vocabulary, 4); // (5 + 4 + 5) / 3, truncated
        assert_eq!(out.sentences.total, 550);
        assert_eq!(out.sentences.avg_per_book, 183);
    }

    #[test]
    fn word_cloud_ranks_by_total_occurrences() {
        let (stats, resolver) = setup();
        let resolution = resolver.resolve(&FilterSpec::default()).unwrap();
        let cloud = stats.word_cloud(&resolution).unwrap();
        assert_eq!(cloud.len(), 11);
        assert_eq!(cloud[0], CloudTerm { term: "harbor".into(), count: 5 });
        assert_eq!(cloud[1], CloudTerm { term: "iron".into(), count: 5 });
        assert_eq!(cloud[2], CloudTerm { term: "sea".into(), count: 4 });
    }

    #[test]
    fn word_cloud_of_empty_resolution_is_empty() {
        let (stats, _) = setup();
        assert!(stats.word_cloud(&Resolution::Empty).unwrap().is_empty());
    }

    #[test]
    fn advanced_stats_of_empty_resolution_are_zero() {
        let (stats, _) = setup();
        assert_eq!(stats.advanced(&Resolution::Empty).unwrap(), AdvancedStats::empty());
    }
}
