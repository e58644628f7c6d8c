//! Corpus snapshot persistence: one bincode store file plus a small JSON
//! meta header. The loader writes these, the server reads them at startup.

use crate::model::StoreData;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_books: u32,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] bincode::Error),
    #[error(transparent)]
    Meta(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

pub struct StorePaths {
    pub root: PathBuf,
}

impl StorePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn store(&self) -> PathBuf {
        self.root.join("store.bin")
    }
    fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }
}

pub fn save_store(paths: &StorePaths, data: &StoreData) -> Result<(), SnapshotError> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.store())?;
    let bytes = bincode::serialize(&(SNAPSHOT_VERSION, data))?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_store(paths: &StorePaths) -> Result<StoreData, SnapshotError> {
    let mut f = File::open(paths.store())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let (version, data): (u32, StoreData) = bincode::deserialize(&buf)?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version(version));
    }
    Ok(data)
}

pub fn save_meta(paths: &StorePaths, meta: &MetaFile) -> Result<(), SnapshotError> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &StorePaths) -> Result<MetaFile, SnapshotError> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookDoc, BookId};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn tiny_data() -> StoreData {
        let mut books: BTreeMap<BookId, BookDoc> = BTreeMap::new();
        books.insert(
            0,
            BookDoc {
                id: 0,
                title: "Moby-Dick".into(),
                published: NaiveDate::from_ymd_opt(1851, 10, 18).unwrap(),
                authors: vec!["herman-melville".into()],
                genres: vec!["adventure".into()],
            },
        );
        StoreData { books, ..StoreData::default() }
    }

    #[test]
    fn store_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        save_store(&paths, &tiny_data()).unwrap();
        let loaded = load_store(&paths).unwrap();
        assert_eq!(loaded.books.len(), 1);
        assert_eq!(loaded.books[&0].title, "Moby-Dick");
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        let bytes = bincode::serialize(&(99u32, tiny_data())).unwrap();
        std::fs::write(dir.path().join("store.bin"), bytes).unwrap();
        assert!(matches!(load_store(&paths), Err(SnapshotError::Version(99))));
    }

    #[test]
    fn meta_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        let meta = MetaFile { num_books: 1, created_at: "2024-01-01T00:00:00Z".into(), version: 1 };
        save_meta(&paths, &meta).unwrap();
        let loaded = load_meta(&paths).unwrap();
        assert_eq!(loaded.num_books, 1);
    }
}
