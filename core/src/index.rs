use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::store::DocumentStore;
use crate::tokenizer::Analyzer;

pub type TermId = u32;
pub type DocId = u32;

/// Raw term counts for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermStats {
    pub counts: HashMap<TermId, u32>,
    /// Total number of tokens in the document.
    pub length: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Term-frequency index over a [`DocumentStore`].
///
/// Built in a single pass and never mutated afterwards; to pick up new data,
/// build a fresh index and publish it through [`crate::SnapshotHandle`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Index {
    pub analyzer: Analyzer,
    pub dictionary: HashMap<String, TermId>,
    pub df: Vec<u32>,
    pub postings: HashMap<TermId, Vec<Posting>>, // postings sorted by doc_id
    pub stats: Vec<TermStats>,
    pub num_docs: u32,
}

impl Index {
    pub fn build(store: &DocumentStore) -> Self {
        Self::build_with(store, Analyzer::default())
    }

    pub fn build_with(store: &DocumentStore, analyzer: Analyzer) -> Self {
        let mut dictionary: HashMap<String, TermId> = HashMap::new();
        let mut df: Vec<u32> = Vec::new();
        let mut postings: HashMap<TermId, Vec<Posting>> = HashMap::new();
        let mut stats: Vec<TermStats> = Vec::with_capacity(store.len());

        for doc in store.all() {
            let tokens = analyzer.tokenize(&doc.text);
            let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
            for term in &tokens {
                let tid = match dictionary.get(term) {
                    Some(&tid) => tid,
                    None => {
                        let id = df.len() as TermId;
                        dictionary.insert(term.clone(), id);
                        df.push(0);
                        id
                    }
                };
                *tf_counts.entry(tid).or_insert(0) += 1;
            }
            // df counts documents, so each distinct term bumps it once
            for (&tid, &tf) in tf_counts.iter() {
                df[tid as usize] += 1;
                postings.entry(tid).or_default().push(Posting { doc_id: doc.id, tf });
            }
            stats.push(TermStats { counts: tf_counts, length: tokens.len() as u32 });
        }
        // docs are visited in id order, so each list is already sorted

        let index = Self { analyzer, dictionary, df, postings, stats, num_docs: store.len() as u32 };
        tracing::info!(num_docs = index.num_docs, num_terms = index.dictionary.len(), "built term-frequency index");
        index
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.term_id(term).and_then(|tid| self.df.get(tid as usize).copied()).unwrap_or(0)
    }

    /// Add-one smoothed inverse document frequency, floored at zero so that a
    /// term present in every document never penalizes a match.
    pub fn idf(&self, term: &str) -> f64 {
        idf(self.num_docs, self.doc_freq(term))
    }

    pub fn term_count(&self, doc_id: DocId, term: &str) -> u32 {
        let Some(tid) = self.term_id(term) else { return 0 };
        self.stats
            .get(doc_id as usize)
            .and_then(|s| s.counts.get(&tid).copied())
            .unwrap_or(0)
    }

    pub fn postings_for(&self, tid: TermId) -> &[Posting] {
        self.postings.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub(crate) fn idf(num_docs: u32, df: u32) -> f64 {
    if num_docs == 0 { return 0.0; }
    ((num_docs as f64) / (1.0 + df as f64)).ln().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Origin, SourceCollection};
    use serde_json::json;

    fn store() -> DocumentStore {
        DocumentStore::load(&[SourceCollection::new(
            "t",
            Origin::Course,
            json!([
                {"content": "tokens tokens cost money"},
                {"content": "cost of tokens"},
                {"content": "unrelated text"}
            ]),
        )])
        .unwrap()
    }

    #[test]
    fn counts_documents_not_occurrences() {
        let index = Index::build(&store());
        assert_eq!(index.num_docs, 3);
        assert_eq!(index.doc_freq("tokens"), 2);
        assert_eq!(index.doc_freq("money"), 1);
        assert_eq!(index.doc_freq("absent"), 0);
        assert_eq!(index.term_count(0, "tokens"), 2);
        assert_eq!(index.stats[0].length, 4);
        assert!(index.df.iter().all(|&d| d <= index.num_docs));
    }

    #[test]
    fn postings_are_sorted_by_doc() {
        let index = Index::build(&store());
        let tid = index.term_id("cost").unwrap();
        let ids: Vec<DocId> = index.postings_for(tid).iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn idf_is_floored_for_ubiquitous_terms() {
        assert_eq!(idf(3, 3), 0.0);
        assert!(idf(10, 1) > idf(10, 4));
        assert_eq!(idf(0, 0), 0.0);
    }
}
