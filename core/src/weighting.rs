//! Turns raw term counts into unit-length tf-idf document vectors.
//!
//! The work happens in three stages, each consuming the previous one:
//!
//! 1. [`RawCounts::assign_idf`] reads document frequencies while postings
//!    still hold raw counts.
//! 2. [`IdfAssigned::rescale_tf`] replaces each count `c` with `1 + log10(c)`.
//! 3. [`TfRescaled::normalize`] divides every posting by the Euclidean length
//!    of its document's vector.

use crate::index::{Index, Postings, TermProfile};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdfMode {
    /// `log10(N / df)`; zero for terms found in every document.
    Plain,
    /// `log10(1 + N / df)`; always positive.
    #[default]
    Smooth,
}

impl IdfMode {
    pub fn idf(self, corpus_cardinality: usize, document_frequency: usize) -> f64 {
        let ratio = corpus_cardinality as f64 / document_frequency as f64;
        match self {
            IdfMode::Plain => ratio.log10(),
            IdfMode::Smooth => (1.0 + ratio).log10(),
        }
    }
}

impl fmt::Display for IdfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdfMode::Plain => "plain",
            IdfMode::Smooth => "smooth",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown idf mode {0:?}, expected \"plain\" or \"smooth\"")]
pub struct ParseIdfModeError(String);

impl FromStr for IdfMode {
    type Err = ParseIdfModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(IdfMode::Plain),
            "smooth" => Ok(IdfMode::Smooth),
            _ => Err(ParseIdfModeError(s.to_string())),
        }
    }
}

pub(crate) struct RawCounts {
    terms: HashMap<String, Postings>,
    documents: Vec<DocId>,
}

pub(crate) struct IdfAssigned {
    terms: HashMap<String, (f64, Postings)>,
    documents: Vec<DocId>,
    mode: IdfMode,
}

pub(crate) struct TfRescaled {
    terms: HashMap<String, (f64, Postings)>,
    documents: Vec<DocId>,
    mode: IdfMode,
}

impl RawCounts {
    pub(crate) fn new(terms: HashMap<String, Postings>, documents: Vec<DocId>) -> Self {
        Self { terms, documents }
    }

    pub(crate) fn assign_idf(self, mode: IdfMode) -> IdfAssigned {
        let n = self.documents.len();
        let terms = self
            .terms
            .into_iter()
            .map(|(term, postings)| {
                let idf = mode.idf(n, postings.len());
                (term, (idf, postings))
            })
            .collect();
        IdfAssigned { terms, documents: self.documents, mode }
    }
}

impl IdfAssigned {
    pub(crate) fn rescale_tf(mut self) -> TfRescaled {
        for (_, postings) in self.terms.values_mut() {
            for posting in postings.iter_mut() {
                // raw count is at least 1, so the result is at least 1
                posting.weight = 1.0 + posting.weight.log10();
            }
        }
        TfRescaled { terms: self.terms, documents: self.documents, mode: self.mode }
    }
}

impl TfRescaled {
    pub(crate) fn normalize(mut self) -> Index {
        let mut norms: HashMap<DocId, f64> = HashMap::with_capacity(self.documents.len());
        // sum in term order so rebuilding the same corpus gives bit-identical weights
        let mut keys: Vec<&String> = self.terms.keys().collect();
        keys.sort_unstable();
        for key in keys {
            let (_, postings) = &self.terms[key];
            for p in postings.as_slice() {
                *norms.entry(p.doc_id).or_insert(0.0) += p.weight * p.weight;
            }
        }
        for norm in norms.values_mut() {
            *norm = norm.sqrt();
        }
        for (_, postings) in self.terms.values_mut() {
            for p in postings.iter_mut() {
                // every posting's document contributed to `norms` above
                if let Some(norm) = norms.get(&p.doc_id) {
                    p.weight /= norm;
                }
            }
        }
        let terms = self
            .terms
            .into_iter()
            .map(|(term, (idf, postings))| (term, TermProfile::new(idf, postings)))
            .collect();
        Index::from_parts(terms, self.documents, self.mode)
    }
}
