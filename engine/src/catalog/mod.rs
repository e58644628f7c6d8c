//! Corpus-derived indices behind TTL caches. One catalog per engine; reads
//! hand out `Arc` snapshots, so a rebuild never invalidates data a caller is
//! still holding.

pub mod dates;
pub mod entities;
pub mod vocabulary;

use crate::cache::TtlCell;
use crate::error::EngineError;
use crate::model::EntityKind;
use crate::storage::Storage;
use dates::DateIndex;
use entities::EntityIndex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vocabulary::VocabularyIndex;

pub struct Catalog {
    storage: Arc<dyn Storage>,
    dates: TtlCell<DateIndex>,
    authors: TtlCell<EntityIndex>,
    genres: TtlCell<EntityIndex>,
    vocabulary: TtlCell<VocabularyIndex>,
}

impl Catalog {
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self {
            storage,
            dates: TtlCell::new(ttl),
            authors: TtlCell::new(ttl),
            genres: TtlCell::new(ttl),
            vocabulary: TtlCell::new(ttl),
        }
    }

    pub fn dates(&self) -> Result<Arc<DateIndex>, EngineError> {
        self.dates.get_or_build(|| {
            debug!("building date index");
            DateIndex::build(self.storage.as_ref())
        })
    }

    pub fn authors(&self) -> Result<Arc<EntityIndex>, EngineError> {
        self.authors.get_or_build(|| {
            debug!("building author enumeration");
            EntityIndex::build(self.storage.as_ref(), EntityKind::Author)
        })
    }

    pub fn genres(&self) -> Result<Arc<EntityIndex>, EngineError> {
        self.genres.get_or_build(|| {
            debug!("building genre enumeration");
            EntityIndex::build(self.storage.as_ref(), EntityKind::Genre)
        })
    }

    pub fn vocabulary(&self) -> Result<Arc<VocabularyIndex>, EngineError> {
        self.vocabulary.get_or_build(|| {
            debug!("building vocabulary index");
            VocabularyIndex::build(self.storage.as_ref())
        })
    }

    /// Drop every cached index; the next reads rebuild from storage.
    pub fn refresh(&self) {
        self.dates.invalidate();
        self.authors.invalidate();
        self.genres.invalidate();
        self.vocabulary.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookHeader, BookId};
    use crate::storage::memory::MemoryStore;
    use crate::storage::pipeline::Pipeline;
    use crate::storage::{Collection, StorageError};
    use crate::testutil::tiny_corpus;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingStore {
        inner: MemoryStore,
        scans: AtomicU32,
    }

    impl Storage for CountingStore {
        fn list_books(&self) -> Result<Vec<BookHeader>, StorageError> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.inner.list_books()
        }
        fn aggregate(&self, c: Collection, p: &Pipeline) -> Result<Vec<Value>, StorageError> {
            self.inner.aggregate(c, p)
        }
        fn find_one(&self, c: Collection, k: &str) -> Result<Value, StorageError> {
            self.inner.find_one(c, k)
        }
        fn find_many(&self, c: Collection, ids: &[BookId]) -> Result<Vec<Value>, StorageError> {
            self.inner.find_many(c, ids)
        }
    }

    #[test]
    fn date_index_is_cached_until_refresh() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(tiny_corpus()),
            scans: AtomicU32::new(0),
        });
        let catalog = Catalog::new(store.clone(), Duration::from_secs(300));

        catalog.dates().unwrap();
        catalog.dates().unwrap();
        assert_eq!(store.scans.load(Ordering::SeqCst), 1);

        catalog.refresh();
        catalog.dates().unwrap();
        assert_eq!(store.scans.load(Ordering::SeqCst), 2);
    }
}
