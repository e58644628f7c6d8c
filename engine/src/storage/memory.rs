//! In-memory storage backend over a loaded corpus snapshot. The only backend
//! shipped; pipelines are interpreted eagerly over JSON rows.

use super::pipeline::{field, Accumulator, GroupKey, Pipeline, Stage};
use super::{Collection, Storage, StorageError};
use crate::model::{BookHeader, BookId, StoreData};
use indexmap::IndexMap;
use serde_json::{json, Map, Number, Value};
use std::collections::{BTreeMap, HashSet};

pub struct MemoryStore {
    data: StoreData,
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        Self { data }
    }

    fn rows(&self, collection: Collection, scope: Option<&[BookId]>) -> Result<Vec<Value>, StorageError> {
        match collection {
            Collection::Books => keyed_rows(&self.data.books, scope),
            Collection::Glossaries => keyed_rows(&self.data.glossaries, scope),
            Collection::BookStats => keyed_rows(&self.data.book_stats, scope),
            Collection::Authors | Collection::Genres => {
                if scope.is_some() {
                    return Err(StorageError::Query(format!(
                        "{collection} documents are not keyed by book id"
                    )));
                }
                let docs = match collection {
                    Collection::Authors => &self.data.authors,
                    _ => &self.data.genres,
                };
                docs.iter().map(to_row).collect()
            }
            Collection::Idf => Err(StorageError::Query(
                "the idf table does not support pipelines".into(),
            )),
        }
    }
}

fn to_row<T: serde::Serialize>(doc: T) -> Result<Value, StorageError> {
    serde_json::to_value(doc).map_err(|e| StorageError::Corrupt(e.to_string()))
}

fn keyed_rows<T: serde::Serialize>(
    map: &BTreeMap<BookId, T>,
    scope: Option<&[BookId]>,
) -> Result<Vec<Value>, StorageError> {
    match scope {
        Some(ids) => ids.iter().filter_map(|id| map.get(id)).map(to_row).collect(),
        None => map.values().map(to_row).collect(),
    }
}

impl Storage for MemoryStore {
    fn list_books(&self) -> Result<Vec<BookHeader>, StorageError> {
        Ok(self
            .data
            .books
            .values()
            .map(|b| BookHeader { id: b.id, published: b.published })
            .collect())
    }

    fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Value>, StorageError> {
        let mut rows = self.rows(collection, pipeline.scope.as_deref())?;
        for stage in &pipeline.stages {
            rows = apply_stage(rows, stage)?;
        }
        Ok(rows)
    }

    fn find_one(&self, collection: Collection, _key: &str) -> Result<Value, StorageError> {
        match collection {
            // The inverted index is a singleton document; the key is ignored.
            Collection::Idf => to_row(&self.data.idf),
            other => Err(StorageError::Query(format!("find_one is not supported for {other}"))),
        }
    }

    fn find_many(&self, collection: Collection, ids: &[BookId]) -> Result<Vec<Value>, StorageError> {
        self.rows(collection, Some(ids))
    }
}

fn apply_stage(rows: Vec<Value>, stage: &Stage) -> Result<Vec<Value>, StorageError> {
    match stage {
        Stage::MatchIn { field: f, ids } => {
            let keep: HashSet<u64> = ids.iter().map(|id| u64::from(*id)).collect();
            Ok(rows
                .into_iter()
                .filter(|row| {
                    field(row, f)
                        .and_then(Value::as_u64)
                        .map_or(false, |v| keep.contains(&v))
                })
                .collect())
        }
        Stage::Unwind { field: f } => {
            let mut out = Vec::new();
            for row in rows {
                let Value::Object(mut obj) = row else {
                    return Err(StorageError::Query("unwind expects object rows".into()));
                };
                let Some(Value::Array(elems)) = obj.remove(*f) else { continue };
                for elem in elems {
                    let mut copy = obj.clone();
                    copy.insert((*f).to_string(), elem);
                    out.push(Value::Object(copy));
                }
            }
            Ok(out)
        }
        Stage::Group { key, accumulators } => Ok(group_rows(rows, key, accumulators)),
        Stage::ArrayLen { field: f, into } => Ok(rows
            .iter()
            .map(|row| {
                let len = field(row, f).and_then(Value::as_array).map_or(0, Vec::len);
                json!({ *into: len })
            })
            .collect()),
        Stage::Sort { field: f, descending } => {
            let mut rows = rows;
            rows.sort_by(|a, b| {
                let fa = field(a, f).and_then(Value::as_f64).unwrap_or(0.0);
                let fb = field(b, f).and_then(Value::as_f64).unwrap_or(0.0);
                let ord = fa.total_cmp(&fb);
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
            Ok(rows)
        }
        Stage::Limit(n) => {
            let mut rows = rows;
            rows.truncate(*n);
            Ok(rows)
        }
    }
}

fn group_rows(rows: Vec<Value>, key: &GroupKey, accumulators: &[(&'static str, Accumulator)]) -> Vec<Value> {
    struct Slot {
        key: Value,
        states: Vec<AccState>,
    }

    let mut groups: IndexMap<String, Slot> = IndexMap::new();
    for row in &rows {
        let key_value = match key {
            GroupKey::Whole => Value::from(1),
            GroupKey::Field(path) => field(row, path).cloned().unwrap_or(Value::Null),
        };
        let slot = groups.entry(key_value.to_string()).or_insert_with(|| Slot {
            key: key_value,
            states: accumulators.iter().map(|(_, acc)| AccState::new(acc)).collect(),
        });
        for state in &mut slot.states {
            state.feed(row);
        }
    }

    groups
        .into_values()
        .map(|slot| {
            let mut obj = Map::new();
            obj.insert("key".into(), slot.key);
            for ((name, _), state) in accumulators.iter().zip(slot.states) {
                obj.insert((*name).to_string(), state.finish());
            }
            Value::Object(obj)
        })
        .collect()
}

enum AccState {
    Count(u64),
    Sum { path: &'static str, total: f64, integral: bool },
    Avg { path: &'static str, total: f64, n: u64 },
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Count => AccState::Count(0),
            Accumulator::Sum(path) => AccState::Sum { path, total: 0.0, integral: true },
            Accumulator::Avg(path) => AccState::Avg { path, total: 0.0, n: 0 },
        }
    }

    fn feed(&mut self, row: &Value) {
        match self {
            AccState::Count(n) => *n += 1,
            AccState::Sum { path, total, integral } => {
                if let Some(v) = field(row, path) {
                    if let Some(x) = v.as_f64() {
                        *total += x;
                        *integral &= v.is_u64() || v.is_i64();
                    }
                }
            }
            AccState::Avg { path, total, n } => {
                if let Some(x) = field(row, path).and_then(Value::as_f64) {
                    *total += x;
                    *n += 1;
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            AccState::Count(n) => Value::from(n),
            AccState::Sum { total, integral, .. } => {
                if integral && total.fract() == 0.0 && total.abs() <= i64::MAX as f64 {
                    Value::from(total as i64)
                } else {
                    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
                }
            }
            AccState::Avg { total, n, .. } => {
                if n == 0 {
                    Value::Null
                } else {
                    Number::from_f64(total / n as f64).map(Value::Number).unwrap_or(Value::Null)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlossaryDoc, GlossaryEntry};

    fn glossary(book: BookId, entries: &[(&str, u64)]) -> GlossaryDoc {
        GlossaryDoc {
            book,
            glossary: entries
                .iter()
                .map(|(word, occ)| GlossaryEntry { word: (*word).to_string(), occ: *occ })
                .collect(),
        }
    }

    fn store_with_glossaries() -> MemoryStore {
        let mut data = StoreData::default();
        data.glossaries.insert(0, glossary(0, &[("sea", 3), ("ship", 1)]));
        data.glossaries.insert(1, glossary(1, &[("ship", 4), ("storm", 2)]));
        MemoryStore::new(data)
    }

    #[test]
    fn unwind_then_group_counts_distinct_words() {
        let store = store_with_glossaries();
        let p = Pipeline::new(vec![
            Stage::Unwind { field: "glossary" },
            Stage::Group { key: GroupKey::Field("glossary.word"), accumulators: vec![] },
            Stage::Group {
                key: GroupKey::Whole,
                accumulators: vec![("vocab_total", Accumulator::Count)],
            },
        ]);
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["vocab_total"].as_u64(), Some(3));
    }

    #[test]
    fn group_emits_first_seen_order() {
        let store = store_with_glossaries();
        let p = Pipeline::new(vec![
            Stage::Unwind { field: "glossary" },
            Stage::Group { key: GroupKey::Field("glossary.word"), accumulators: vec![] },
        ]);
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        let words: Vec<&str> = rows.iter().map(|r| r["key"].as_str().unwrap()).collect();
        assert_eq!(words, vec!["sea", "ship", "storm"]);
    }

    #[test]
    fn scope_restricts_before_stages() {
        let store = store_with_glossaries();
        let p = Pipeline::scoped(
            vec![1],
            vec![
                Stage::Unwind { field: "glossary" },
                Stage::Group {
                    key: GroupKey::Whole,
                    accumulators: vec![("words_total", Accumulator::Sum("glossary.occ"))],
                },
            ],
        );
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        assert_eq!(rows[0]["words_total"].as_u64(), Some(6));
    }

    #[test]
    fn sum_of_integers_stays_integral() {
        let store = store_with_glossaries();
        let p = Pipeline::new(vec![
            Stage::Unwind { field: "glossary" },
            Stage::Group {
                key: GroupKey::Whole,
                accumulators: vec![("total", Accumulator::Sum("glossary.occ"))],
            },
        ]);
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        assert!(rows[0]["total"].is_u64() || rows[0]["total"].is_i64());
        assert_eq!(rows[0]["total"].as_u64(), Some(10));
    }

    #[test]
    fn sort_desc_and_limit() {
        let store = store_with_glossaries();
        let p = Pipeline::new(vec![
            Stage::Unwind { field: "glossary" },
            Stage::Group {
                key: GroupKey::Field("glossary.word"),
                accumulators: vec![("occ", Accumulator::Sum("glossary.occ"))],
            },
            Stage::Sort { field: "occ", descending: true },
            Stage::Limit(2),
        ]);
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["key"].as_str(), Some("ship"));
        assert_eq!(rows[0]["occ"].as_u64(), Some(5));
        assert_eq!(rows[1]["key"].as_str(), Some("sea"));
    }

    #[test]
    fn array_len_then_avg() {
        let store = store_with_glossaries();
        let p = Pipeline::new(vec![
            Stage::ArrayLen { field: "glossary", into: "glossary_count" },
            Stage::Group {
                key: GroupKey::Whole,
                accumulators: vec![("avg_words", Accumulator::Avg("glossary_count"))],
            },
        ]);
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        assert_eq!(rows[0]["avg_words"].as_f64(), Some(2.0));
    }

    #[test]
    fn aggregation_over_empty_scope_yields_no_rows() {
        let store = store_with_glossaries();
        let p = Pipeline::scoped(
            vec![99],
            vec![
                Stage::Unwind { field: "glossary" },
                Stage::Group {
                    key: GroupKey::Whole,
                    accumulators: vec![("total", Accumulator::Sum("glossary.occ"))],
                },
            ],
        );
        let rows = store.aggregate(Collection::Glossaries, &p).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn entity_collections_reject_book_scope() {
        let store = MemoryStore::new(StoreData::default());
        let p = Pipeline::scoped(vec![0], vec![]);
        assert!(matches!(
            store.aggregate(Collection::Authors, &p),
            Err(StorageError::Query(_))
        ));
    }

    #[test]
    fn find_many_skips_absent_ids() {
        let store = store_with_glossaries();
        let rows = store.find_many(Collection::Glossaries, &[0, 7]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["book"].as_u64(), Some(0));
    }
}
