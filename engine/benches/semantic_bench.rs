use chrono::{Days, NaiveDate};
use criterion::{criterion_group, criterion_main, Criterion};
use engine::model::{
    BookDoc, BookStatsDoc, EntityDoc, GlossaryDoc, GlossaryEntry, StoreData, SummaryStats,
};
use engine::storage::memory::MemoryStore;
use engine::{Engine, FilterSpec};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Deterministic corpus: `count` books drawing ~40 terms each from a pool of
/// 300, with "harbor" present in every glossary.
fn synthetic_corpus(count: u32) -> StoreData {
    let mut data = StoreData::default();
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
    let mut seed: u64 = 0x9e3779b97f4a7c15;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as u32
    };

    for id in 0..count {
        data.books.insert(
            id,
            BookDoc {
                id,
                title: format!("book-{id}"),
                published: epoch + Days::new(u64::from(id) * 37),
                authors: vec![format!("author-{}", id % 12)],
                genres: vec![format!("genre-{}", id % 5)],
            },
        );

        let mut terms: BTreeMap<String, u64> = BTreeMap::new();
        terms.insert("harbor".into(), u64::from(next() % 9 + 1));
        for _ in 0..40 {
            *terms.entry(format!("w{:03}", next() % 300)).or_insert(0) += u64::from(next() % 9 + 1);
        }
        let glossary = terms.into_iter().map(|(word, occ)| GlossaryEntry { word, occ }).collect();
        data.glossaries.insert(id, GlossaryDoc { book: id, glossary });

        data.book_stats.insert(
            id,
            BookStatsDoc {
                book: id,
                stats: SummaryStats {
                    words: 1000 + u64::from(next() % 4000),
                    sentences: 100 + u64::from(next() % 300),
                    words_per_sentence: 12.0,
                },
            },
        );
    }

    for a in 0..12u32 {
        let id = format!("author-{a}");
        let books = (0..count).filter(|b| b % 12 == a).collect();
        data.authors.push(EntityDoc { id: id.clone(), name: id, books });
    }
    for g in 0..5u32 {
        let id = format!("genre-{g}");
        let books = (0..count).filter(|b| b % 5 == g).collect();
        data.genres.push(EntityDoc { id: id.clone(), name: id, books });
    }

    for (id, doc) in &data.glossaries {
        for entry in &doc.glossary {
            data.idf.entry(entry.word.clone()).or_default().push(*id);
        }
    }

    data
}

fn bench_semantic_field(c: &mut Criterion) {
    let engine = Engine::new(Arc::new(MemoryStore::new(synthetic_corpus(120))));
    let spec = FilterSpec::default();
    c.bench_function("semantic_field_120_books", |b| {
        b.iter(|| engine.semantic_field(&spec, "harbor").unwrap())
    });
}

fn bench_dashboard_stats(c: &mut Criterion) {
    let engine = Engine::new(Arc::new(MemoryStore::new(synthetic_corpus(120))));
    let spec = FilterSpec::default();
    c.bench_function("dashboard_stats_120_books", |b| {
        b.iter(|| engine.dashboard_stats(&spec).unwrap())
    });
}

criterion_group!(benches, bench_semantic_field, bench_dashboard_stats);
criterion_main!(benches);
