use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use ta_core::tokenizer::tokenize;
use ta_core::{rank, DocumentStore, Index, Origin, SourceCollection};

const WORDS: &[&str] = &[
    "tokens", "cost", "model", "python", "docker", "notebook", "assignment", "deadline",
    "grading", "bonus", "scraping", "markdown", "pandas", "regression", "proxy", "api",
];

fn corpus(n: usize) -> DocumentStore {
    let records: Vec<_> = (0..n)
        .map(|i| {
            let text: Vec<&str> = (0..40).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
            json!({ "content": text.join(" "), "post_url": format!("https://forum.example/t/{i}") })
        })
        .collect();
    DocumentStore::load(&[SourceCollection::new("bench", Origin::Forum, json!(records))]).expect("valid corpus")
}

fn bench_tokenize(c: &mut Criterion) {
    let text = WORDS.join(" ").repeat(50);
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tokenize(&text)));
}

fn bench_rank(c: &mut Criterion) {
    let store = corpus(2_000);
    let index = Index::build(&store);
    c.bench_function("rank_top3_2k_docs", |b| b.iter(|| rank(&index, &store, "how much do tokens cost on the proxy api", 3)));
}

criterion_group!(benches, bench_tokenize, bench_rank);
criterion_main!(benches);
