//! Analytics core for a digital-library corpus: filtered book-set
//! resolution, dashboard and per-book statistics, word clouds, vocabulary
//! lookups and semantic fields over a TF-IDF term/book matrix.

pub mod cache;
pub mod catalog;
mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod semantic;
pub mod stats;
pub mod storage;

#[doc(hidden)]
pub mod testutil;

pub use engine::{Engine, EngineConfig, EntityListing};
pub use error::EngineError;
pub use filter::{FilterSpec, Resolution, ResolvedBookSet};
pub use model::{BookId, SurrogateId};
