//! Term profile store and the single-pass indexer.
//!
//! [`IndexBuilder`] collects raw term counts; [`IndexBuilder::build`] runs the
//! weighting stages and hands back an immutable [`Index`].

use crate::corpus::{CorpusSource, ReadStats, Record};
use crate::error::Result;
use crate::tokenizer::tokenize;
use crate::weighting::{IdfMode, RawCounts};
use crate::{DocId, Posting};
use std::collections::{HashMap, HashSet};

/// Postings keyed by document id, kept in first-seen order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Postings {
    entries: Vec<Posting>,
    slots: HashMap<DocId, usize>,
}

impl Postings {
    pub(crate) fn increment(&mut self, doc_id: DocId) {
        match self.slots.get(&doc_id) {
            Some(&slot) => self.entries[slot].weight += 1.0,
            None => {
                self.slots.insert(doc_id, self.entries.len());
                self.entries.push(Posting { doc_id, weight: 1.0 });
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, doc_id: DocId) -> Option<f64> {
        self.slots.get(&doc_id).map(|&slot| self.entries[slot].weight)
    }

    pub(crate) fn as_slice(&self) -> &[Posting] {
        &self.entries
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Posting> {
        self.entries.iter_mut()
    }
}

/// Everything the index knows about one term.
#[derive(Debug, Clone)]
pub struct TermProfile {
    idf: f64,
    postings: Postings,
}

impl TermProfile {
    pub(crate) fn new(idf: f64, postings: Postings) -> Self {
        Self { idf, postings }
    }

    pub fn idf(&self) -> f64 {
        self.idf
    }

    /// Number of documents containing the term.
    pub fn document_frequency(&self) -> usize {
        self.postings.len()
    }

    /// Postings in the order documents were first seen.
    pub fn postings(&self) -> &[Posting] {
        self.postings.as_slice()
    }

    /// Normalized tf of the term in `doc_id`, if the document contains it.
    pub fn weight(&self, doc_id: DocId) -> Option<f64> {
        self.postings.get(doc_id)
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        self.postings.slots.contains_key(&doc_id)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.entries.iter().map(|p| p.doc_id)
    }
}

/// An index that is still accepting documents.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    terms: HashMap<String, Postings>,
    documents: Vec<DocId>,
    seen: HashSet<DocId>,
    skipped_empty: usize,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the tokens of one document. Returns `false` when the content
    /// normalizes to nothing, in which case the document is not indexed.
    ///
    /// An id that was already indexed has its counts merged into the
    /// existing postings.
    pub fn add_document(&mut self, doc_id: DocId, content: &str) -> bool {
        let tokens = tokenize(content);
        if tokens.is_empty() {
            self.skipped_empty += 1;
            tracing::debug!(doc_id, "skipping document with empty content");
            return false;
        }
        if self.seen.insert(doc_id) {
            self.documents.push(doc_id);
        }
        for token in tokens {
            self.terms.entry(token).or_default().increment(doc_id);
        }
        true
    }

    pub fn add_record(&mut self, record: &Record) -> bool {
        self.add_document(record.doc_id, &record.content)
    }

    /// Number of distinct documents indexed so far.
    pub fn corpus_cardinality(&self) -> usize {
        self.documents.len()
    }

    pub fn skipped_empty(&self) -> usize {
        self.skipped_empty
    }

    pub fn build(self, mode: IdfMode) -> Index {
        tracing::info!(
            num_docs = self.documents.len(),
            num_terms = self.terms.len(),
            skipped_empty = self.skipped_empty,
            "ingested documents"
        );
        let index = RawCounts::new(self.terms, self.documents).assign_idf(mode).rescale_tf().normalize();
        tracing::info!(idf = %mode, "index weighting complete");
        index
    }
}

impl<'a> Extend<&'a Record> for IndexBuilder {
    fn extend<I: IntoIterator<Item = &'a Record>>(&mut self, iter: I) {
        for record in iter {
            self.add_record(record);
        }
    }
}

impl Extend<(DocId, String)> for IndexBuilder {
    fn extend<I: IntoIterator<Item = (DocId, String)>>(&mut self, iter: I) {
        for (doc_id, content) in iter {
            self.add_document(doc_id, &content);
        }
    }
}

/// A fully weighted, read-only index.
#[derive(Debug, Clone)]
pub struct Index {
    terms: HashMap<String, TermProfile>,
    documents: Vec<DocId>,
    idf_mode: IdfMode,
}

impl Index {
    pub(crate) fn from_parts(terms: HashMap<String, TermProfile>, documents: Vec<DocId>, idf_mode: IdfMode) -> Self {
        Self { terms, documents, idf_mode }
    }

    /// Build from `(doc_id, content)` pairs.
    pub fn build<I, S>(records: I, mode: IdfMode) -> Self
    where
        I: IntoIterator<Item = (DocId, S)>,
        S: AsRef<str>,
    {
        let mut builder = IndexBuilder::new();
        for (doc_id, content) in records {
            builder.add_document(doc_id, content.as_ref());
        }
        builder.build(mode)
    }

    /// Read a corpus source in one pass and build from it. Fails only when the
    /// source itself cannot be read.
    pub fn from_source(source: &CorpusSource, mode: IdfMode) -> Result<(Self, ReadStats)> {
        let mut builder = IndexBuilder::new();
        let stats = source.for_each_record(|record| {
            builder.add_record(&record);
        })?;
        tracing::info!(
            source = %source.root().display(),
            lines = stats.lines,
            records = stats.records,
            skipped = stats.skipped,
            "read corpus"
        );
        Ok((builder.build(mode), stats))
    }

    /// Number of distinct documents with non-empty content.
    pub fn corpus_cardinality(&self) -> usize {
        self.documents.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.terms.len()
    }

    pub fn idf_mode(&self) -> IdfMode {
        self.idf_mode
    }

    /// Look up an already-normalized term.
    pub fn profile(&self, term: &str) -> Option<&TermProfile> {
        self.terms.get(term)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.profile(term).map(TermProfile::idf)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &TermProfile)> + '_ {
        self.terms.iter().map(|(t, p)| (t.as_str(), p))
    }

    /// Document ids in the order they were first indexed.
    pub fn documents(&self) -> &[DocId] {
        &self.documents
    }

    /// Euclidean length of a document's weight vector; 1.0 for every indexed
    /// document, `None` for unknown ids.
    pub fn document_norm(&self, doc_id: DocId) -> Option<f64> {
        let mut sum = 0.0;
        let mut found = false;
        for profile in self.terms.values() {
            if let Some(w) = profile.weight(doc_id) {
                sum += w * w;
                found = true;
            }
        }
        found.then(|| sum.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_documents_do_not_count() {
        let mut b = IndexBuilder::new();
        assert!(b.add_document(1, "Hello world"));
        assert!(!b.add_document(2, "  ?!  "));
        assert!(!b.add_document(3, ""));
        assert_eq!(b.corpus_cardinality(), 1);
        assert_eq!(b.skipped_empty(), 2);
        let index = b.build(IdfMode::Smooth);
        assert_eq!(index.corpus_cardinality(), 1);
        assert_eq!(index.documents(), &[1]);
    }

    #[test]
    fn postings_keep_first_seen_order() {
        let index = Index::build([(30, "b a"), (10, "a"), (20, "a b")], IdfMode::Plain);
        let a: Vec<DocId> = index.profile("a").unwrap().doc_ids().collect();
        let b: Vec<DocId> = index.profile("b").unwrap().doc_ids().collect();
        assert_eq!(a, vec![30, 10, 20]);
        assert_eq!(b, vec![30, 20]);

        let b = index.profile("b").unwrap();
        let order: Vec<DocId> = b.postings().iter().map(|p| p.doc_id).collect();
        assert_eq!(order, vec![30, 20]);
        assert!(b.contains(20));
        assert!(!b.contains(10));
        assert_eq!(b.weight(10), None);
    }

    #[test]
    fn extend_with_owned_pairs() {
        let mut builder = IndexBuilder::new();
        builder.extend(vec![(1, "red apple".to_string()), (2, String::new()), (-3, "green apple".to_string())]);
        assert_eq!(builder.corpus_cardinality(), 2);
        assert_eq!(builder.skipped_empty(), 1);
        let index = builder.build(IdfMode::Plain);
        assert_eq!(index.documents(), &[1, -3]);
        assert_eq!(index.profile("apple").unwrap().document_frequency(), 2);
    }

    #[test]
    fn repeated_id_merges_counts() {
        let index = Index::build([(1, "x y"), (2, "y"), (1, "x")], IdfMode::Plain);
        assert_eq!(index.corpus_cardinality(), 2);
        let x = index.profile("x").unwrap();
        assert_eq!(x.document_frequency(), 1);
        // doc 1 holds x twice and y once: tf' = (1 + log10 2, 1)
        let tf_x = 1.0 + 2f64.log10();
        let norm = (tf_x * tf_x + 1.0).sqrt();
        assert!((x.weight(1).unwrap() - tf_x / norm).abs() < 1e-12);
    }

    #[test]
    fn unknown_document_has_no_norm() {
        let index = Index::build([(1, "x")], IdfMode::Smooth);
        assert_eq!(index.document_norm(1), Some(1.0));
        assert_eq!(index.document_norm(2), None);
    }
}
