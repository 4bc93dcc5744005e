use parking_lot::RwLock;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::index::Index;
use crate::rank::{Ranker, ScoredDocument, SubstringRanker, TfIdfRanker};
use crate::store::DocumentStore;
use crate::tokenizer::Analyzer;

/// A fully built, read-only view of the corpus: documents plus (optionally)
/// their term-frequency index.
#[derive(Debug)]
pub struct Snapshot {
    pub store: DocumentStore,
    pub index: Option<Index>,
    pub built_at: OffsetDateTime,
}

impl Snapshot {
    pub fn indexed(store: DocumentStore, analyzer: Analyzer) -> Self {
        let index = Index::build_with(&store, analyzer);
        Self { store, index: Some(index), built_at: OffsetDateTime::now_utc() }
    }

    /// A snapshot without an index; ranking degrades to substring matching.
    pub fn unindexed(store: DocumentStore) -> Self {
        Self { store, index: None, built_at: OffsetDateTime::now_utc() }
    }

    pub fn rank(&self, query: &str, top_n: usize) -> Vec<ScoredDocument<'_>> {
        match &self.index {
            Some(index) => TfIdfRanker::new(index).rank(&self.store, query, top_n),
            None => SubstringRanker::new().rank(&self.store, query, top_n),
        }
    }
}

/// Shared handle to the snapshot currently in use.
///
/// Readers take a cheap `Arc` clone and keep it for the whole request;
/// [`SnapshotHandle::replace`] publishes a new snapshot in one pointer swap,
/// so nobody ever observes a half-built index.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(snapshot))) }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.inner.read().clone()
    }

    /// Publish `next`, returning the snapshot it replaced.
    pub fn replace(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        let prev = std::mem::replace(&mut *self.inner.write(), next);
        tracing::info!(num_docs = self.current().store.len(), "published new snapshot");
        prev
    }
}
