use crate::error::EngineError;
use crate::storage::{Collection, Storage, StorageError};
use serde_json::Value;

/// Corpus-wide vocabulary, sorted for deterministic listings. Built from the
/// keys of the inverted-index document.
pub struct VocabularyIndex {
    words: Vec<String>,
}

impl VocabularyIndex {
    pub fn build(storage: &dyn Storage) -> Result<Self, EngineError> {
        let table = storage.find_one(Collection::Idf, "global")?;
        let Value::Object(map) = table else {
            return Err(StorageError::Corrupt("inverted index is not an object".into()).into());
        };
        let mut words: Vec<String> = map.into_iter().map(|(word, _)| word).collect();
        words.sort();
        Ok(Self { words })
    }

    /// Exact, case-sensitive membership.
    pub fn exists(&self, word: &str) -> bool {
        self.words.binary_search_by(|w| w.as_str().cmp(word)).is_ok()
    }

    /// Words containing `query` as a case-sensitive substring, sorted.
    pub fn matching(&self, query: &str) -> Vec<String> {
        self.words.iter().filter(|w| w.contains(query)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
