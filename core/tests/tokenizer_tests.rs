use ta_core::tokenizer::{tokenize, Analyzer};

#[test]
fn it_normalizes_case_and_unicode() {
    let words = tokenize("ＧＰＴ Café's MENU");
    // NFKC folds full-width letters
    assert!(words.contains(&"gpt".to_string()));
    assert!(words.contains(&"café".to_string()));
    assert!(words.contains(&"menu".to_string()));
}

#[test]
fn it_splits_on_non_alphanumeric_boundaries() {
    assert_eq!(tokenize("foo_bar-baz/qux.42"), vec!["foo", "bar", "baz", "qux", "42"]);
    assert!(tokenize("  ... !!! ").is_empty());
}

#[test]
fn it_filters_stopwords_when_enabled() {
    let analyzer = Analyzer::new(true, false);
    let words = analyzer.tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"fox".to_string()));
    // default analyzer keeps them
    assert!(tokenize("the fox").contains(&"the".to_string()));
}
