use std::cmp::Ordering;
use std::collections::HashSet;

use crate::index::{idf, Index};
use crate::store::{Document, DocumentStore};
use crate::tokenizer::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument<'a> {
    pub document: &'a Document,
    pub score: f64,
}

/// Scores every document in a store against a query and keeps the best `top_n`.
///
/// Implementations must be deterministic: output is sorted by descending
/// score, ties keep store insertion order, and zero-score documents are used to
/// fill the result when fewer than `top_n` documents match.
pub trait Ranker: Send + Sync {
    fn rank<'s>(&self, store: &'s DocumentStore, query: &str, top_n: usize) -> Vec<ScoredDocument<'s>>;
}

/// TF-IDF scoring: `sum(tf(t, d) * idf(t))` over the distinct query terms.
pub struct TfIdfRanker<'i> {
    index: &'i Index,
}

impl<'i> TfIdfRanker<'i> {
    pub fn new(index: &'i Index) -> Self { Self { index } }
}

impl Ranker for TfIdfRanker<'_> {
    fn rank<'s>(&self, store: &'s DocumentStore, query: &str, top_n: usize) -> Vec<ScoredDocument<'s>> {
        let mut scores = vec![0.0f64; store.len()];
        for term in distinct_terms(&self.index.analyzer, query) {
            let Some(tid) = self.index.term_id(&term) else { continue };
            let df_t = self.index.df.get(tid as usize).copied().unwrap_or(0);
            let w = idf(self.index.num_docs, df_t);
            if w == 0.0 { continue; }
            for p in self.index.postings_for(tid) {
                if let Some(s) = scores.get_mut(p.doc_id as usize) {
                    *s += p.tf as f64 * w;
                }
            }
        }
        top_scored(store, &scores, top_n)
    }
}

/// Degraded ranker for when no index is available: a document scores 1 when
/// any query term appears verbatim inside its lower-cased text.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringRanker {
    analyzer: Analyzer,
}

impl SubstringRanker {
    pub fn new() -> Self { Self::default() }
}

impl Ranker for SubstringRanker {
    fn rank<'s>(&self, store: &'s DocumentStore, query: &str, top_n: usize) -> Vec<ScoredDocument<'s>> {
        let terms = distinct_terms(&self.analyzer, query);
        let scores: Vec<f64> = store
            .all()
            .iter()
            .map(|doc| {
                if terms.is_empty() { return 0.0; }
                let text = self.analyzer.normalize(&doc.text);
                if terms.iter().any(|t| text.contains(t.as_str())) { 1.0 } else { 0.0 }
            })
            .collect();
        top_scored(store, &scores, top_n)
    }
}

/// Rank `store` against `query` with TF-IDF weighting from `index`.
pub fn rank<'s>(index: &Index, store: &'s DocumentStore, query: &str, top_n: usize) -> Vec<ScoredDocument<'s>> {
    TfIdfRanker::new(index).rank(store, query, top_n)
}

fn distinct_terms(analyzer: &Analyzer, query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    analyzer
        .tokenize(query)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn top_scored<'s>(store: &'s DocumentStore, scores: &[f64], top_n: usize) -> Vec<ScoredDocument<'s>> {
    if top_n == 0 { return Vec::new(); }
    let mut scored: Vec<ScoredDocument<'s>> = store
        .all()
        .iter()
        .zip(scores.iter())
        .map(|(document, &score)| ScoredDocument { document, score })
        .collect();
    // sort_by is stable: equal scores keep insertion order
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Origin, SourceCollection};
    use serde_json::json;

    fn store(texts: &[&str]) -> DocumentStore {
        let records: Vec<_> = texts.iter().map(|t| json!({ "content": t })).collect();
        DocumentStore::load(&[SourceCollection::new("t", Origin::Forum, json!(records))]).unwrap()
    }

    #[test]
    fn empty_query_falls_back_to_store_order() {
        let s = store(&["a b", "c d", "e f"]);
        let index = Index::build(&s);
        let out = rank(&index, &s, "   ", 2);
        let ids: Vec<_> = out.iter().map(|d| d.document.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(out.iter().all(|d| d.score == 0.0));
    }

    #[test]
    fn empty_store_and_zero_top_n() {
        let s = DocumentStore::default();
        let index = Index::build(&s);
        assert!(rank(&index, &s, "anything", 5).is_empty());
        let s = store(&["x"]);
        let index = Index::build(&s);
        assert!(rank(&index, &s, "x", 0).is_empty());
    }

    #[test]
    fn substring_ranker_matches_inside_words() {
        let s = store(&["nothing here", "Tokenization basics", "more tokens"]);
        let out = SubstringRanker::new().rank(&s, "token", 3);
        let ids: Vec<_> = out.iter().map(|d| d.document.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(out[0].score, 1.0);
        assert_eq!(out[2].score, 0.0);
    }
}
