use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Text normalization shared by indexing and querying.
///
/// The default analyzer only folds case (after NFKC) and splits on
/// non-alphanumeric boundaries. Stop-word removal and English stemming are
/// opt-in; an [`crate::Index`] remembers the analyzer it was built with so that
/// queries go through the same pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyzer {
    pub remove_stopwords: bool,
    pub stem: bool,
}

impl Analyzer {
    pub fn new(remove_stopwords: bool, stem: bool) -> Self {
        Self { remove_stopwords, stem }
    }

    /// NFKC then lowercase; the text every term is cut from.
    pub fn normalize(&self, text: &str) -> String {
        text.nfkc().collect::<String>().to_lowercase()
    }

    /// Tokenize text into normalized terms, in order of appearance.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = self.normalize(text);
        let mut tokens = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            if self.remove_stopwords && is_stopword(token) { continue; }
            if self.stem {
                tokens.push(STEMMER.stem(token).to_string());
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }
}

/// Tokenize with the default analyzer: NFKC, lowercase, alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    Analyzer::default().tokenize(text)
}
