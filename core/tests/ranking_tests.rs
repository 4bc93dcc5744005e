use serde_json::json;
use ta_core::{rank, DocumentStore, Index, Origin, Ranker, SourceCollection, SubstringRanker};

fn forum(texts: &[&str]) -> DocumentStore {
    let records: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| json!({ "content": t, "post_url": format!("u{}", i + 1) }))
        .collect();
    DocumentStore::load(&[SourceCollection::new("forum", Origin::Forum, json!(records))]).unwrap()
}

fn urls(out: &[ta_core::ScoredDocument<'_>]) -> Vec<String> {
    out.iter().map(|d| d.document.url.clone().unwrap_or_default()).collect()
}

#[test]
fn zero_scores_fill_top_n_after_matches() {
    let store = DocumentStore::load(&[
        SourceCollection::new("course", Origin::Course, json!([{"content": "tokens tokens cost money", "url": "u1"}])),
        SourceCollection::new("forum", Origin::Forum, json!([{"content": "unrelated text", "post_url": "u2"}])),
    ])
    .unwrap();
    let index = Index::build(&store);
    let out = rank(&index, &store, "tokens cost", 2);
    assert_eq!(urls(&out), vec!["u1", "u2"]);
    assert_eq!(out[1].score, 0.0);
}

#[test]
fn returns_at_most_k_sorted_by_score() {
    let store = forum(&[
        "install python with uv",
        "python python notebooks",
        "docker compose basics",
        "python docker images",
        "markdown tables",
    ]);
    let index = Index::build(&store);
    for k in 1..=7 {
        for q in ["python", "docker python", "tables", "nothing matches", ""] {
            let out = rank(&index, &store, q, k);
            assert!(out.len() <= k);
            assert_eq!(out.len(), k.min(store.len()));
            assert!(out.windows(2).all(|w| w[0].score >= w[1].score), "query {q:?} k {k}");
        }
    }
}

#[test]
fn ranking_is_deterministic() {
    let store = forum(&["a b c", "b c d", "c d e", "a a b", "e e e"]);
    let index = Index::build(&store);
    let first = rank(&index, &store, "a c e", 5);
    for _ in 0..10 {
        let again = rank(&index, &store, "a c e", 5);
        let ids = |v: &[ta_core::ScoredDocument<'_>]| v.iter().map(|d| (d.document.id, d.score.to_bits())).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&again));
    }
}

#[test]
fn ties_keep_insertion_order() {
    let store = forum(&["shared term", "filler", "shared term", "filler two"]);
    let index = Index::build(&store);
    let out = rank(&index, &store, "shared", 4);
    let ids: Vec<_> = out.iter().map(|d| d.document.id).collect();
    assert_eq!(ids, vec![0, 2, 1, 3]);
    assert_eq!(out[0].score, out[1].score);
}

#[test]
fn more_occurrences_never_score_lower() {
    let store = forum(&["rust", "rust rust rust", "python", "java"]);
    let index = Index::build(&store);
    let out = rank(&index, &store, "rust", 4);
    assert_eq!(out[0].document.id, 1);
    assert_eq!(out[1].document.id, 0);
    assert!(out[0].score > out[1].score);
}

#[test]
fn ubiquitous_terms_do_not_contribute() {
    let store = forum(&["common alpha", "common beta", "common gamma"]);
    let index = Index::build(&store);
    assert!(index.idf("common").abs() < 1e-9);
    let only_common = rank(&index, &store, "common", 3);
    assert!(only_common.iter().all(|d| d.score.abs() < 1e-9));
    let out = rank(&index, &store, "common beta", 3);
    assert_eq!(out[0].document.id, 1);
    assert!((out[0].score - index.idf("beta")).abs() < 1e-9);
}

#[test]
fn repeated_query_terms_count_once() {
    let store = forum(&["alpha", "beta", "gamma"]);
    let index = Index::build(&store);
    let once = rank(&index, &store, "alpha", 1);
    let twice = rank(&index, &store, "alpha alpha ALPHA", 1);
    assert_eq!(once[0].score, twice[0].score);
}

#[test]
fn substring_ranker_honours_the_same_contract() {
    let store = forum(&["first", "a token here", "second", "tokens again"]);
    let out = SubstringRanker::new().rank(&store, "Token", 3);
    let ids: Vec<_> = out.iter().map(|d| d.document.id).collect();
    assert_eq!(ids, vec![1, 3, 0]);
    assert!(SubstringRanker::new().rank(&DocumentStore::default(), "token", 3).is_empty());
}

#[test]
fn substring_ranker_folds_document_text_like_the_query() {
    let store = forum(&["unrelated", "ＧＰＴ pricing"]);
    let out = SubstringRanker::new().rank(&store, "gpt", 1);
    assert_eq!(out[0].document.id, 1);
    assert_eq!(out[0].score, 1.0);
}
