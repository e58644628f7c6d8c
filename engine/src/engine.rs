use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::filter::{BookSetResolver, FilterSpec, Resolution};
use crate::model::SurrogateId;
use crate::semantic::{Neighbor, SemanticFieldEngine};
use crate::stats::{AdvancedStats, CloudTerm, DashboardStats, StatsAggregator};
use crate::storage::{RetryingStore, Storage};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Index cache lifetime and the pause before retrying a transient storage
/// failure.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub cache_ttl: Duration,
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { cache_ttl: Duration::from_secs(300), retry_backoff: Duration::from_millis(250) }
    }
}

/// An author or genre as listed to clients: surrogate id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityListing {
    pub id: SurrogateId,
    pub name: String,
}

/// Facade over the analytics core: book-set resolution, corpus statistics,
/// vocabulary lookups and semantic fields, all against one storage backend.
pub struct Engine {
    catalog: Arc<Catalog>,
    resolver: BookSetResolver,
    stats: StatsAggregator,
    semantic: SemanticFieldEngine,
}

impl Engine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    pub fn with_config(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        let storage: Arc<dyn Storage> =
            Arc::new(RetryingStore::new(storage, config.retry_backoff));
        let catalog = Arc::new(Catalog::new(storage.clone(), config.cache_ttl));
        Self {
            resolver: BookSetResolver::new(catalog.clone()),
            stats: StatsAggregator::new(storage.clone(), catalog.clone()),
            semantic: SemanticFieldEngine::new(storage, catalog.clone()),
            catalog,
        }
    }

    pub fn resolve(&self, spec: &FilterSpec) -> Result<Resolution, EngineError> {
        self.resolver.resolve(spec)
    }

    /// Outer publication dates of the whole corpus.
    pub fn date_brackets(&self) -> Result<Option<(NaiveDate, NaiveDate)>, EngineError> {
        Ok(self.catalog.dates()?.boundaries())
    }

    /// Author enumeration, optionally narrowed to names containing `query`
    /// (case-insensitive).
    pub fn authors(&self, query: Option<&str>) -> Result<Vec<EntityListing>, EngineError> {
        let authors = self.catalog.authors()?;
        let listing = match query {
            Some(q) => authors.search(q),
            None => authors.listing(),
        };
        Ok(to_listings(listing))
    }

    pub fn genres(&self) -> Result<Vec<EntityListing>, EngineError> {
        Ok(to_listings(self.catalog.genres()?.listing()))
    }

    pub fn dashboard_stats(&self, spec: &FilterSpec) -> Result<DashboardStats, EngineError> {
        let resolution = self.resolver.resolve(spec)?;
        self.stats.dashboard(spec, &resolution)
    }

    pub fn advanced_stats(&self, spec: &FilterSpec) -> Result<AdvancedStats, EngineError> {
        let resolution = self.resolver.resolve(spec)?;
        self.stats.advanced(&resolution)
    }

    pub fn word_cloud(&self, spec: &FilterSpec) -> Result<Vec<CloudTerm>, EngineError> {
        let resolution = self.resolver.resolve(spec)?;
        self.stats.word_cloud(&resolution)
    }

    /// Whether the word occurs anywhere in the corpus vocabulary.
    pub fn word_exists(&self, word: &str) -> Result<bool, EngineError> {
        Ok(self.catalog.vocabulary()?.exists(word))
    }

    /// Corpus vocabulary entries containing `query` as a case-sensitive
    /// substring, sorted. Length gating is the caller's business.
    pub fn matching_words(&self, query: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.catalog.vocabulary()?.matching(query))
    }

    pub fn semantic_field(&self, spec: &FilterSpec, word: &str) -> Result<Vec<Neighbor>, EngineError> {
        let resolution = self.resolver.resolve(spec)?;
        self.semantic.semantic_field(&resolution, word)
    }

    /// Drop all cached indices; subsequent reads rebuild from storage.
    pub fn refresh(&self) {
        self.catalog.refresh();
    }
}

fn to_listings(entries: Vec<(SurrogateId, &str)>) -> Vec<EntityListing> {
    entries
        .into_iter()
        .map(|(id, name)| EntityListing { id, name: name.to_string() })
        .collect()
}
