//! Folds a fetched page into the store: per-page frequency map with
//! title boost, one document record, and a merge into the inverted
//! index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pipeline::TextPipeline;
use crate::store::{DocRecord, Store};

/// Tokens longer than this never enter a frequency map.
pub const MAX_TERM_LEN: usize = 30;

/// Body maximum recorded for pages whose body yields no tokens. Such
/// pages are still stored, and their title terms index with this
/// sentinel as their weight.
pub const EMPTY_BODY_MAX_FREQ: f64 = i32::MIN as f64;

pub struct Indexer {
    store: Arc<Store>,
    pipeline: Arc<TextPipeline>,
}

impl Indexer {
    pub fn new(store: Arc<Store>, pipeline: Arc<TextPipeline>) -> Self {
        Self { store, pipeline }
    }

    /// Record one fetched page: insert its document record and fold its
    /// term frequencies into the inverted index. Write failures
    /// (including duplicate keys) are logged and dropped so a single bad
    /// page cannot stop a crawl; read failures propagate.
    pub fn index_page(&self, doc_id: &str, url: &str, title: &str, body: &str) -> Result<()> {
        let title_tokens = self.pipeline.normalize(title);
        let body_tokens = self.pipeline.normalize(body);

        let mut frequencies: HashMap<String, f64> = HashMap::new();
        for token in body_tokens {
            if token.len() <= MAX_TERM_LEN {
                *frequencies.entry(token).or_insert(0.0) += 1.0;
            }
        }

        let max_freq = frequencies
            .values()
            .copied()
            .fold(EMPTY_BODY_MAX_FREQ, f64::max);

        // Title boost: every title occurrence carries a body-maximum's
        // worth of weight.
        for token in title_tokens {
            if token.len() <= MAX_TERM_LEN {
                *frequencies.entry(token).or_insert(0.0) += max_freq;
            }
        }

        let record = DocRecord {
            id: doc_id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            max_frequency: max_freq,
        };
        if let Err(err) = self.store.insert_doc(&record) {
            if matches!(err, Error::StoreRead { .. }) {
                return Err(err);
            }
            tracing::warn!(%url, %err, "dropping document record write");
        }

        for (term, freq) in &frequencies {
            if let Err(err) = self.apply_term(term, doc_id, *freq) {
                if matches!(err, Error::StoreRead { .. }) {
                    return Err(err);
                }
                tracing::warn!(%term, %err, "dropping inverted-index update");
            }
        }
        Ok(())
    }

    fn apply_term(&self, term: &str, doc_id: &str, freq: f64) -> Result<()> {
        match self.store.find_term(term)? {
            Some(mut postings) => {
                postings.insert(doc_id.to_string(), freq);
                self.store.update_term_index(term, &postings)
            }
            None => {
                let postings = HashMap::from([(doc_id.to_string(), freq)]);
                self.store.insert_term(term, &postings)
            }
        }
    }
}
