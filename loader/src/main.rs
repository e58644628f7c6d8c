use anyhow::Result;
use clap::{Parser, Subcommand};
use engine::model::{
    parse_published, BookDoc, BookId, BookStatsDoc, EntityDoc, GlossaryDoc, GlossaryEntry,
    StoreData, SummaryStats,
};
use engine::storage::snapshot::{save_meta, save_store, MetaFile, StorePaths, SNAPSHOT_VERSION};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

mod tokenizer;
use tokenizer::{Language, Tokenizer};

/// One book as it arrives from the ingest pipeline. Raw records carry
/// `text`; pre-extracted exports carry `glossary` and `stats` instead.
#[derive(Debug, Deserialize)]
struct BookRecord {
    id: String,
    title: String,
    published: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    glossary: Option<IndexMap<String, u64>>,
    #[serde(default)]
    stats: Option<RecordStats>,
}

#[derive(Debug, Deserialize)]
struct RecordStats {
    words: u64,
    sentences: u64,
    #[serde(default)]
    words_per_sentence: Option<f64>,
}

#[derive(Parser)]
#[command(name = "loader")]
#[command(about = "Build the library analytics snapshot from book records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the snapshot from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output snapshot directory
        #[arg(long)]
        output: String,
        /// Tokenizer language for records carrying raw text
        #[arg(long, value_enum, default_value_t = Language::English)]
        language: Language,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, language } => build_snapshot(&input, &output, language),
    }
}

fn build_snapshot(input: &str, output: &str, language: Language) -> Result<()> {
    let mut builder = SnapshotBuilder::new(language);
    builder.ingest_path(Path::new(input))?;
    let skipped = builder.skipped;
    let data = builder.finish();

    let num_books = data.books.len() as u32;
    tracing::info!(
        num_books,
        num_terms = data.idf.len(),
        num_authors = data.authors.len(),
        num_genres = data.genres.len(),
        skipped,
        "ingested book records"
    );

    let paths = StorePaths::new(output);
    save_store(&paths, &data)?;
    let meta = MetaFile {
        num_books,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: SNAPSHOT_VERSION,
    };
    save_meta(&paths, &meta)?;

    tracing::info!(output, "snapshot build complete");
    Ok(())
}

struct EntityAccum {
    name: String,
    books: Vec<BookId>,
}

struct SnapshotBuilder {
    tokenizer: Tokenizer,
    data: StoreData,
    authors: IndexMap<String, EntityAccum>,
    genres: IndexMap<String, EntityAccum>,
    next_id: BookId,
    skipped: u64,
}

impl SnapshotBuilder {
    fn new(language: Language) -> Self {
        Self {
            tokenizer: Tokenizer::new(language),
            data: StoreData::default(),
            authors: IndexMap::new(),
            genres: IndexMap::new(),
            next_id: 0,
            skipped: 0,
        }
    }

    fn ingest_path(&mut self, input: &Path) -> Result<()> {
        let mut files: Vec<PathBuf> = Vec::new();
        if input.is_dir() {
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() {
                    if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                        if matches!(ext, "json" | "jsonl") {
                            files.push(p.to_path_buf());
                        }
                    }
                }
            }
            // walk order is filesystem-dependent; ids are assigned in path order
            files.sort();
        } else if input.is_file() {
            files.push(input.to_path_buf());
        }

        for file in files {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                self.ingest_jsonl(&file)?;
            } else {
                self.ingest_json(&file)?;
            }
        }
        Ok(())
    }

    fn ingest_jsonl(&mut self, file: &Path) -> Result<()> {
        let f = File::open(file)?;
        let reader = BufReader::new(f);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let record: BookRecord = serde_json::from_str(&line)?;
            self.ingest_record(record);
        }
        Ok(())
    }

    fn ingest_json(&mut self, file: &Path) -> Result<()> {
        let f = File::open(file)?;
        let reader = BufReader::new(f);
        let json: serde_json::Value = serde_json::from_reader(reader)?;
        match json {
            serde_json::Value::Array(arr) => {
                for v in arr {
                    let record: BookRecord = serde_json::from_value(v)?;
                    self.ingest_record(record);
                }
            }
            serde_json::Value::Object(_) => {
                let record: BookRecord = serde_json::from_value(json)?;
                self.ingest_record(record);
            }
            _ => {}
        }
        Ok(())
    }

    fn ingest_record(&mut self, record: BookRecord) {
        let published = match parse_published(&record.published) {
            Ok(date) => date,
            Err(err) => {
                tracing::warn!(book = %record.id, %err, "skipping record with unreadable publication date");
                self.skipped += 1;
                return;
            }
        };

        let id = self.next_id;
        self.next_id += 1;

        let needs_text = record.glossary.is_none() || record.stats.is_none();
        let mut analysis = match record.text.as_deref() {
            Some(text) if needs_text => Some(self.tokenizer.analyze(text)),
            _ => None,
        };

        let glossary = match record.glossary {
            Some(prebuilt) => Some(prebuilt),
            None => analysis.as_mut().map(|a| std::mem::take(&mut a.glossary)),
        };
        if let Some(glossary) = glossary {
            if !glossary.is_empty() {
                for stem in glossary.keys() {
                    self.data.idf.entry(stem.clone()).or_default().push(id);
                }
                let entries = glossary
                    .into_iter()
                    .map(|(word, occ)| GlossaryEntry { word, occ })
                    .collect();
                self.data.glossaries.insert(id, GlossaryDoc { book: id, glossary: entries });
            }
        }

        let stats = match record.stats {
            Some(given) => Some(SummaryStats {
                words: given.words,
                sentences: given.sentences,
                words_per_sentence: given
                    .words_per_sentence
                    .unwrap_or_else(|| ratio(given.words, given.sentences)),
            }),
            None => analysis.as_ref().map(|a| SummaryStats {
                words: a.words,
                sentences: a.sentences,
                words_per_sentence: ratio(a.words, a.sentences),
            }),
        };
        if let Some(stats) = stats {
            self.data.book_stats.insert(id, BookStatsDoc { book: id, stats });
        }

        let authors = note_entities(&mut self.authors, record.authors, id);
        let genres = note_entities(&mut self.genres, record.genres, id);
        self.data.books.insert(id, BookDoc { id, title: record.title, published, authors, genres });
    }

    fn finish(mut self) -> StoreData {
        self.data.authors = self
            .authors
            .into_iter()
            .map(|(id, e)| EntityDoc { id, name: e.name, books: e.books })
            .collect();
        self.data.genres = self
            .genres
            .into_iter()
            .map(|(id, e)| EntityDoc { id, name: e.name, books: e.books })
            .collect();
        self.data
    }
}

/// Record a book against each named entity, creating entities on first
/// sight. Returns the canonical ids the book references.
fn note_entities(
    map: &mut IndexMap<String, EntityAccum>,
    names: Vec<String>,
    book: BookId,
) -> Vec<String> {
    let mut refs: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let key = slug(&name);
        if key.is_empty() || refs.contains(&key) {
            continue;
        }
        map.entry(key.clone())
            .or_insert_with(|| EntityAccum { name, books: Vec::new() })
            .books
            .push(book);
        refs.push(key);
    }
    refs
}

/// Canonical entity id: lowercase alphanumeric runs joined by single dashes.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

fn ratio(words: u64, sentences: u64) -> f64 {
    if sentences == 0 { 0.0 } else { words as f64 / sentences as f64 }
}
