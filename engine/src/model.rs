use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Publication dates travel as `YYYY-M-D` strings; zero padding is optional.
pub fn parse_published(raw: &str) -> chrono::ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
}

pub type BookId = u32;
/// Position of an author or genre in its enumeration, the id handed to API
/// clients. Distinct from the canonical string id stored on the document.
pub type SurrogateId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Author,
    Genre,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Author => f.write_str("author"),
            EntityKind::Genre => f.write_str("genre"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDoc {
    pub id: BookId,
    pub title: String,
    pub published: NaiveDate,
    pub authors: Vec<String>, // canonical entity ids
    pub genres: Vec<String>,
}

/// Projection of a book used by the date index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookHeader {
    pub id: BookId,
    pub published: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub word: String,
    pub occ: u64,
}

/// Per-book vocabulary: one entry per distinct stem, in extraction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryDoc {
    pub book: BookId,
    pub glossary: Vec<GlossaryEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryStats {
    pub words: u64,
    pub sentences: u64,
    pub words_per_sentence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookStatsDoc {
    pub book: BookId,
    pub stats: SummaryStats,
}

/// An author or genre with back-references to the books carrying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDoc {
    pub id: String,
    pub name: String,
    pub books: Vec<BookId>, // ascending
}

/// Everything the storage backend serves, as written by the loader.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreData {
    pub books: BTreeMap<BookId, BookDoc>,
    pub glossaries: BTreeMap<BookId, GlossaryDoc>,
    pub book_stats: BTreeMap<BookId, BookStatsDoc>,
    pub authors: Vec<EntityDoc>,
    pub genres: Vec<EntityDoc>,
    /// Inverted index: stem -> books containing it, ascending.
    pub idf: HashMap<String, Vec<BookId>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publication_dates_accept_unpadded_fields() {
        assert_eq!(parse_published("2000-1-1").unwrap(), parse_published("2000-01-01").unwrap());
        assert_eq!(parse_published(" 1851-10-18 ").unwrap(), NaiveDate::from_ymd_opt(1851, 10, 18).unwrap());
        assert!(parse_published("18th of October").is_err());
    }
}

