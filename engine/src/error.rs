use crate::model::{BookId, EntityKind, SurrogateId};
use crate::storage::StorageError;
use thiserror::Error;

/// Failure taxonomy for the analytics core. `NoBooksFound` and `WordNotFound`
/// are recoverable; callers pick their own empty-result shape for them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown book id {0}")]
    UnknownBook(BookId),
    #[error("unknown {kind} id {id}")]
    UnknownEntity { kind: EntityKind, id: SurrogateId },
    #[error("no books match the requested filters")]
    NoBooksFound,
    #[error("word {0:?} is not in the selected vocabulary")]
    WordNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
