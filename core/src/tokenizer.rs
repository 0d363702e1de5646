use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","an","and","are","as","at","be","by","for","from","in","into","is","it","its",
            "of","on","or","that","the","to","was","with",
        ];
        words.iter().copied().collect()
    };
}

/// Keyword terms of `text`: NFKC normalized, lowercased, stopwords removed, stemmed.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|token| !STOPWORDS.contains(token))
        .map(|token| STEMMER.stem(token).to_string())
        .collect()
}

/// Matches documents against the terms of a keyword query.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    terms: Vec<String>,
    match_any: bool,
}

impl KeywordMatcher {
    pub fn new(keywords: &str, match_any: bool) -> Self {
        let mut terms = tokenize(keywords);
        terms.dedup();
        Self { terms, match_any }
    }

    pub fn matches<'a, I: IntoIterator<Item = &'a str>>(&self, fields: I) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let document: HashSet<String> = fields.into_iter().flat_map(tokenize).collect();
        if self.match_any {
            self.terms.iter().any(|t| document.contains(t))
        } else {
            self.terms.iter().all(|t| document.contains(t))
        }
    }
}
