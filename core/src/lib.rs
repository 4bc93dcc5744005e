//! Retrieval core: document store, term-frequency index, rankers and the
//! atomically swappable snapshot that ties them together.

pub mod index;
pub mod persist;
pub mod rank;
pub mod snapshot;
pub mod store;
pub mod tokenizer;

pub use index::{DocId, Index, Posting, TermId, TermStats};
pub use rank::{rank, Ranker, ScoredDocument, SubstringRanker, TfIdfRanker};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use store::{Document, DocumentStore, LoadError, Origin, SourceCollection, SourcePaths};
pub use tokenizer::Analyzer;
