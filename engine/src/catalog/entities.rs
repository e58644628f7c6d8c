use crate::error::EngineError;
use crate::model::{BookId, EntityDoc, EntityKind, SurrogateId};
use crate::storage::pipeline::Pipeline;
use crate::storage::{Collection, Storage, StorageError};
use std::collections::BTreeSet;

/// One author or genre enumeration. Surrogate ids are positions in scan
/// order and stay stable for the lifetime of a built index generation.
pub struct EntityIndex {
    kind: EntityKind,
    entries: Vec<EntityEntry>,
}

struct EntityEntry {
    name: String,
    books: BTreeSet<BookId>,
}

impl EntityIndex {
    pub fn build(storage: &dyn Storage, kind: EntityKind) -> Result<Self, EngineError> {
        let collection = match kind {
            EntityKind::Author => Collection::Authors,
            EntityKind::Genre => Collection::Genres,
        };
        let rows = storage.aggregate(collection, &Pipeline::scan())?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let doc: EntityDoc =
                serde_json::from_value(row).map_err(|e| StorageError::Corrupt(e.to_string()))?;
            entries.push(EntityEntry {
                name: doc.name,
                books: doc.books.into_iter().collect(),
            });
        }
        Ok(Self { kind, entries })
    }

    /// Books carrying the entity behind this surrogate id.
    pub fn books_for(&self, id: SurrogateId) -> Result<&BTreeSet<BookId>, EngineError> {
        self.entries
            .get(id as usize)
            .map(|entry| &entry.books)
            .ok_or(EngineError::UnknownEntity { kind: self.kind, id })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The enumeration as (surrogate id, display name) pairs.
    pub fn listing(&self) -> Vec<(SurrogateId, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i as SurrogateId, entry.name.as_str()))
            .collect()
    }

    /// Entries whose display name contains `query`, case-insensitively.
    /// The query is matched literally, not as a pattern.
    pub fn search(&self, query: &str) -> Vec<(SurrogateId, &str)> {
        let pattern = regex::RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .expect("escaped literal is a valid pattern");
        self.listing()
            .into_iter()
            .filter(|(_, name)| pattern.is_match(name))
            .collect()
    }
}
