//! Text normalization: lowercasing, alphanumeric scrub, stopword
//! removal and Porter stemming.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

use crate::error::{Error, Result};

lazy_static! {
    static ref SCRUB: Regex = Regex::new(r"[^a-z0-9\s]").expect("valid regex");
}

/// Stopword-filtering, stemming tokenizer shared by the indexer and the
/// retriever. Constructed once and threaded through; the stopword set and
/// stemmer are read-only after construction.
pub struct TextPipeline {
    stopwords: HashSet<String>,
    stemmer: Stemmer,
}

impl std::fmt::Debug for TextPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPipeline")
            .field("stopwords", &self.stopwords)
            .finish()
    }
}

impl TextPipeline {
    /// Load the stopword list from `path`, one lowercase token per line.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| Error::StopwordsMissing {
            path: path.display().to_string(),
            source,
        })?;
        let stopwords = raw
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Ok(Self::with_stopwords(stopwords))
    }

    pub fn with_stopwords(stopwords: HashSet<String>) -> Self {
        Self {
            stopwords,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Lowercase, replace every character outside `[a-z0-9\s]` with a
    /// space, split on whitespace, drop stopwords, then stem. Token order
    /// is preserved.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let lowercased = text.to_lowercase();
        let scrubbed = SCRUB.replace_all(&lowercased, " ");
        scrubbed
            .split_whitespace()
            .filter(|word| !self.stopwords.contains(*word))
            .map(|word| self.stemmer.stem(word).to_string())
            .collect()
    }

    /// Per-term normalized frequencies for a query: each term's count
    /// divided by the total retained token count, duplicates included.
    /// The values sum to 1 whenever at least one token survives.
    pub fn clean_query(&self, query: &str) -> HashMap<String, f64> {
        let tokens = self.normalize(query);
        let total = tokens.len() as f64;
        let mut frequencies: HashMap<String, f64> = HashMap::new();
        for token in tokens {
            *frequencies.entry(token).or_insert(0.0) += 1.0;
        }
        for frequency in frequencies.values_mut() {
            *frequency /= total;
        }
        frequencies
    }
}
