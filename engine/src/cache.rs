//! Single-slot TTL cache backing the corpus-derived indices. A value is
//! built on first access, shared via `Arc`, and rebuilt once the TTL lapses
//! or the slot is invalidated.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct TtlCell<T> {
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
}

struct Entry<T> {
    value: Arc<T>,
    built_at: Instant,
}

impl<T> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: RwLock::new(None) }
    }

    /// Returns the cached value, building it when the slot is empty or stale.
    /// The build runs under the write lock, so concurrent callers wait on one
    /// build instead of racing their own.
    pub fn get_or_build<E>(&self, build: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(entry) = self.slot.read().as_ref() {
            if entry.built_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }
        let mut slot = self.slot.write();
        // another caller may have rebuilt while we waited on the lock
        if let Some(entry) = slot.as_ref() {
            if entry.built_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }
        let value = Arc::new(build()?);
        *slot = Some(Entry { value: value.clone(), built_at: Instant::now() });
        Ok(value)
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}
