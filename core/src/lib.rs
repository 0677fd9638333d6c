pub mod corpus;
pub mod error;
pub mod index;
pub mod query;
pub mod tokenizer;
pub mod weighting;

pub use corpus::{CorpusLayout, CorpusSource, ReadStats, Record, RecordError};
pub use error::{Error, Result};
pub use index::{Index, IndexBuilder, TermProfile};
pub use weighting::IdfMode;

use serde::{Deserialize, Serialize};

pub type DocId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f64, // raw count, then log tf, then unit-normalized tf
}

/// A document paired with its similarity to one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f64,
}
