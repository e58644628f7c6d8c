//! Shared fixture corpus for the unit and integration suites: three books,
//! two authors, one genre, with glossaries small enough to check aggregates
//! by hand.

use crate::model::{
    BookDoc, BookId, BookStatsDoc, EntityDoc, GlossaryDoc, GlossaryEntry, StoreData, SummaryStats,
};
use chrono::NaiveDate;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("fixture dates are valid")
}

fn glossary(book: BookId, entries: &[(&str, u64)]) -> GlossaryDoc {
    GlossaryDoc {
        book,
        glossary: entries
            .iter()
            .map(|(word, occ)| GlossaryEntry { word: (*word).to_string(), occ: *occ })
            .collect(),
    }
}

/// Three books:
///   0 "The Sea Tower"  2000-01-01  Ada Auster
///   1 "Glass Harbor"   2005-06-15  Ada Auster, fantasy
///   2 "Iron Meridian"  2010-12-31  Basil Marsh, fantasy
pub fn tiny_corpus() -> StoreData {
    let mut data = StoreData::default();

    let books = [
        (0, "The Sea Tower", date(2000, 1, 1), vec!["ada-auster"], vec![]),
        (1, "Glass Harbor", date(2005, 6, 15), vec!["ada-auster"], vec!["fantasy"]),
        (2, "Iron Meridian", date(2010, 12, 31), vec!["basil-marsh"], vec!["fantasy"]),
    ];
    for (id, title, published, authors, genres) in books {
        data.books.insert(
            id,
            BookDoc {
                id,
                title: title.to_string(),
                published,
                authors: authors.into_iter().map(str::to_string).collect(),
                genres: genres.into_iter().map(str::to_string).collect(),
            },
        );
    }

    data.glossaries.insert(
        0,
        glossary(0, &[("sea", 3), ("tower", 1), ("wind", 2), ("stone", 1), ("gull", 1)]),
    );
    data.glossaries.insert(
        1,
        glossary(1, &[("sea", 1), ("harbor", 4), ("glass", 2), ("wind", 1)]),
    );
    data.glossaries.insert(
        2,
        glossary(2, &[("iron", 5), ("meridian", 2), ("harbor", 1), ("storm", 3), ("anchor", 1)]),
    );

    let stats = [
        (0, 1000, 100, 10.0),
        (1, 2500, 200, 12.5),
        (2, 4000, 250, 16.0),
    ];
    for (id, words, sentences, words_per_sentence) in stats {
        data.book_stats.insert(
            id,
            BookStatsDoc { book: id, stats: SummaryStats { words, sentences, words_per_sentence } },
        );
    }

    data.authors = vec![
        EntityDoc { id: "ada-auster".into(), name: "Ada Auster".into(), books: vec![0, 1] },
        EntityDoc { id: "basil-marsh".into(), name: "Basil Marsh".into(), books: vec![2] },
    ];
    data.genres = vec![EntityDoc { id: "fantasy".into(), name: "Fantasy".into(), books: vec![1, 2] }];

    for (book, doc) in &data.glossaries {
        for entry in &doc.glossary {
            data.idf.entry(entry.word.clone()).or_default().push(*book);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Book membership is stored twice, as entity back-refs and as idf
    /// postings. The two encodings must agree.
    #[test]
    fn redundant_encodings_agree() {
        let data = tiny_corpus();

        for entity in data.authors.iter().chain(&data.genres) {
            for id in &entity.books {
                let doc = &data.books[id];
                assert!(
                    doc.authors.contains(&entity.id) || doc.genres.contains(&entity.id),
                    "book {id} does not carry {}",
                    entity.id
                );
            }
        }

        for (book, doc) in &data.glossaries {
            for entry in &doc.glossary {
                assert!(data.idf[&entry.word].contains(book), "{} missing book {book}", entry.word);
            }
        }
    }
}
