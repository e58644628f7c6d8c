pub mod memory;
pub mod pipeline;
pub mod snapshot;

use crate::model::{BookHeader, BookId};
use pipeline::Pipeline;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Books,
    Glossaries,
    BookStats,
    Authors,
    Genres,
    Idf,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Books => "books",
            Collection::Glossaries => "glossaries",
            Collection::BookStats => "book_stats",
            Collection::Authors => "authors",
            Collection::Genres => "genres",
            Collection::Idf => "idf",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt document: {0}")]
    Corrupt(String),
    #[error("document not found: {0}")]
    Missing(String),
    #[error("bad query: {0}")]
    Query(String),
}

impl StorageError {
    /// Connectivity-class failures are worth one retry; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Read-side contract the analytics engine runs against. A backend answers
/// header scans, keyed lookups and aggregation pipelines over the corpus
/// collections.
pub trait Storage: Send + Sync {
    /// Id and publication date for every book in the corpus.
    fn list_books(&self) -> Result<Vec<BookHeader>, StorageError>;
    /// Run an aggregation pipeline against one collection.
    fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Value>, StorageError>;
    /// Fetch a single keyed document.
    fn find_one(&self, collection: Collection, key: &str) -> Result<Value, StorageError>;
    /// Fetch the documents for a set of book ids; absent ids are skipped.
    fn find_many(&self, collection: Collection, ids: &[BookId]) -> Result<Vec<Value>, StorageError>;
}

/// Decorator that retries a transient failure once after a short pause, then
/// surfaces whatever the second attempt returned.
pub struct RetryingStore {
    inner: Arc<dyn Storage>,
    backoff: Duration,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn Storage>, backoff: Duration) -> Self {
        Self { inner, backoff }
    }

    fn with_retry<T>(
        &self,
        what: &'static str,
        op: impl Fn() -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        match op() {
            Err(e) if e.is_transient() => {
                warn!(error = %e, what, "storage call failed, retrying once");
                std::thread::sleep(self.backoff);
                op()
            }
            other => other,
        }
    }
}

impl Storage for RetryingStore {
    fn list_books(&self) -> Result<Vec<BookHeader>, StorageError> {
        self.with_retry("list_books", || self.inner.list_books())
    }

    fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Value>, StorageError> {
        self.with_retry("aggregate", || self.inner.aggregate(collection, pipeline))
    }

    fn find_one(&self, collection: Collection, key: &str) -> Result<Value, StorageError> {
        self.with_retry("find_one", || self.inner.find_one(collection, key))
    }

    fn find_many(&self, collection: Collection, ids: &[BookId]) -> Result<Vec<Value>, StorageError> {
        self.with_retry("find_many", || self.inner.find_many(collection, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyStore {
        calls: AtomicU32,
        fail_with: fn() -> StorageError,
    }

    impl Storage for FlakyStore {
        fn list_books(&self) -> Result<Vec<BookHeader>, StorageError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err((self.fail_with)())
            } else {
                Ok(Vec::new())
            }
        }

        fn aggregate(&self, _: Collection, _: &Pipeline) -> Result<Vec<Value>, StorageError> {
            self.list_books().map(|_| Vec::new())
        }

        fn find_one(&self, _: Collection, _: &str) -> Result<Value, StorageError> {
            self.list_books().map(|_| Value::Null)
        }

        fn find_many(&self, _: Collection, _: &[BookId]) -> Result<Vec<Value>, StorageError> {
            self.list_books().map(|_| Vec::new())
        }
    }

    #[test]
    fn transient_failure_is_retried_once() {
        let flaky = Arc::new(FlakyStore {
            calls: AtomicU32::new(0),
            fail_with: || StorageError::Unavailable("connection reset".into()),
        });
        let store = RetryingStore::new(flaky.clone(), Duration::ZERO);
        assert!(store.list_books().is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn persistent_failure_surfaces_after_second_attempt() {
        struct DownStore;
        impl Storage for DownStore {
            fn list_books(&self) -> Result<Vec<BookHeader>, StorageError> {
                Err(StorageError::Unavailable("still down".into()))
            }
            fn aggregate(&self, _: Collection, _: &Pipeline) -> Result<Vec<Value>, StorageError> {
                self.list_books().map(|_| Vec::new())
            }
            fn find_one(&self, _: Collection, _: &str) -> Result<Value, StorageError> {
                self.list_books().map(|_| Value::Null)
            }
            fn find_many(&self, _: Collection, _: &[BookId]) -> Result<Vec<Value>, StorageError> {
                self.list_books().map(|_| Vec::new())
            }
        }
        let store = RetryingStore::new(Arc::new(DownStore), Duration::ZERO);
        assert!(matches!(store.list_books(), Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn non_transient_failure_is_not_retried() {
        let flaky = Arc::new(FlakyStore {
            calls: AtomicU32::new(0),
            fail_with: || StorageError::Corrupt("bad document".into()),
        });
        let store = RetryingStore::new(flaky.clone(), Duration::ZERO);
        assert!(matches!(store.list_books(), Err(StorageError::Corrupt(_))));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
