//! Ranked retrieval over a built [`Index`].
//!
//! A query is a list of raw terms. Each term is normalized exactly like
//! indexed content; terms that normalize to nothing or are not in the
//! vocabulary are dropped. Surviving terms are weighted `1 + log10(count)`
//! and scored against the unit-length document vectors:
//!
//! `score(d) = sum_t qw(t) * idf(t) * tf(t, d)`
//!
//! Candidates are every document containing at least one surviving term.

use crate::index::{Index, TermProfile};
use crate::tokenizer::tokenize;
use crate::{DocId, ScoredDocument};
use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

struct QueryVector<'a> {
    // first-seen order, so scores are summed in a fixed order
    terms: Vec<(&'a TermProfile, f64)>,
}

impl<'a> QueryVector<'a> {
    fn new<S: AsRef<str>>(index: &'a Index, raw_terms: &[S]) -> Self {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(&'a TermProfile, u32)> = Vec::new();
        for raw in raw_terms {
            for token in tokenize(raw.as_ref()) {
                let Some(profile) = index.profile(&token) else {
                    continue;
                };
                match slots.get(&token) {
                    Some(&slot) => counts[slot].1 += 1,
                    None => {
                        slots.insert(token, counts.len());
                        counts.push((profile, 1));
                    }
                }
            }
        }
        let terms = counts
            .into_iter()
            .map(|(profile, count)| (profile, 1.0 + f64::from(count).log10()))
            .collect();
        Self { terms }
    }

    fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn score(&self, doc_id: DocId) -> f64 {
        self.terms
            .iter()
            .map(|(profile, qw)| qw * profile.idf() * profile.weight(doc_id).unwrap_or(0.0))
            .sum()
    }
}

/// Higher score first, then lower id.
fn rank_order(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    OrderedFloat(b.score).cmp(&OrderedFloat(a.score)).then(a.doc_id.cmp(&b.doc_id))
}

impl Index {
    /// Documents containing at least one of the query terms (boolean OR).
    pub fn potential_docs<S: AsRef<str>>(&self, terms: &[S]) -> HashSet<DocId> {
        let query = QueryVector::new(self, terms);
        query.terms.iter().flat_map(|(profile, _)| profile.doc_ids()).collect()
    }

    /// Score the given documents against the query and rank them. Ids are
    /// scored once even if repeated; documents sharing no term score 0.
    pub fn score<I, S>(&self, doc_ids: I, terms: &[S]) -> Vec<ScoredDocument>
    where
        I: IntoIterator<Item = DocId>,
        S: AsRef<str>,
    {
        let query = QueryVector::new(self, terms);
        let unique: HashSet<DocId> = doc_ids.into_iter().collect();
        let mut ranked: Vec<ScoredDocument> = unique
            .into_iter()
            .map(|doc_id| ScoredDocument { doc_id, score: query.score(doc_id) })
            .collect();
        ranked.sort_by(rank_order);
        ranked
    }

    /// Rank every candidate document for the query.
    pub fn query<S: AsRef<str>>(&self, terms: &[S]) -> Vec<ScoredDocument> {
        self.score(self.potential_docs(terms), terms)
    }

    /// Like [`Index::query`], keeping only the best `k` results.
    pub fn query_top_k<S: AsRef<str>>(&self, terms: &[S], k: usize) -> Vec<ScoredDocument> {
        let query = QueryVector::new(self, terms);
        if k == 0 || query.is_empty() {
            return Vec::new();
        }
        let candidates: HashSet<DocId> = query.terms.iter().flat_map(|(profile, _)| profile.doc_ids()).collect();

        // min-heap on (score, Reverse(id)): the root is the weakest kept result
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f64>, Reverse<DocId>)>> = BinaryHeap::with_capacity(k + 1);
        for doc_id in candidates {
            heap.push(Reverse((OrderedFloat(query.score(doc_id)), Reverse(doc_id))));
            if heap.len() > k {
                heap.pop();
            }
        }
        let mut results: Vec<ScoredDocument> = heap
            .into_iter()
            .map(|Reverse((score, Reverse(doc_id)))| ScoredDocument { doc_id, score: score.0 })
            .collect();
        results.sort_by(rank_order);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdfMode;

    fn tiny() -> Index {
        Index::build([(1, "the cat sat"), (2, "the dog sat"), (3, "the cat ran")], IdfMode::Smooth)
    }

    #[test]
    fn repeated_query_terms_are_log_scaled() {
        let index = tiny();
        let once = index.query(&["cat"]);
        let twice = index.query(&["cat", "Cat!"]);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.doc_id, b.doc_id);
            assert!((b.score - a.score * (1.0 + 2f64.log10())).abs() < 1e-12);
        }
    }

    #[test]
    fn score_includes_non_matching_ids_with_zero() {
        let index = tiny();
        let ranked = index.score([2, 1, 1, 99], &["cat"]);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![1, 2, 99]);
        assert_eq!(ranked[1].score, 0.0);
        assert_eq!(ranked[2].score, 0.0);
    }

    #[test]
    fn ties_break_on_lower_id() {
        let index = Index::build([(9, "same words"), (4, "same words"), (7, "other")], IdfMode::Smooth);
        let ranked = index.query(&["same"]);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![4, 9]);
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn top_k_matches_full_ranking_prefix() {
        let index = Index::build(
            (0..50i64).map(|i| (i, format!("alpha {}", "beta ".repeat((i % 7) as usize)))),
            IdfMode::Smooth,
        );
        let full = index.query(&["beta", "alpha"]);
        for k in [0, 1, 5, 50, 80] {
            let top = index.query_top_k(&["beta", "alpha"], k);
            assert_eq!(top, full[..k.min(full.len())].to_vec());
        }
    }

    #[test]
    fn empty_query_yields_nothing() {
        let index = tiny();
        let none: [&str; 0] = [];
        assert!(index.query(&none).is_empty());
        assert!(index.query(&["", "?!"]).is_empty());
        assert!(index.query_top_k(&["zebra"], 10).is_empty());
    }
}
