//! Ranked retrieval: TF-IDF weighting and cosine similarity over the
//! inverted index, top-25 selection.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::TextPipeline;
use crate::store::Store;

/// Upper bound on returned hits.
pub const MAX_RESULTS: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub score: f64,
}

/// Answers free-text queries over a crawled corpus. `index_size` (the
/// number of distinct indexed terms) is snapshotted at construction and
/// used as the corpus-size constant in IDF.
pub struct Retriever {
    store: Arc<Store>,
    pipeline: Arc<TextPipeline>,
    index_size: u64,
}

impl Retriever {
    pub fn open(store: Arc<Store>, pipeline: Arc<TextPipeline>) -> Result<Self> {
        let index_size = store.count_terms()?;
        Ok(Self {
            store,
            pipeline,
            index_size,
        })
    }

    /// Top-scoring pages for `query`, best first, at most
    /// [`MAX_RESULTS`]. An empty or fully-unknown query yields an empty
    /// list.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let mut query_words = self.pipeline.clean_query(query);
        let known = self.store.distinct_terms()?;
        query_words.retain(|term, _| known.contains(term));
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        // Cosine numerator and squared document norm, accumulated in
        // first-encounter order so score ties keep earlier documents
        // first after the stable sort.
        let mut idf: HashMap<String, f64> = HashMap::new();
        let mut weights: HashMap<String, (f64, f64)> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (term, query_tf) in &query_words {
            let Some(postings) = self.store.find_term(term)? else {
                continue;
            };
            let term_idf = (self.index_size as f64 / postings.len() as f64).log10();
            idf.insert(term.clone(), term_idf);
            let query_weight = query_tf * term_idf;

            for (doc_id, raw_freq) in &postings {
                let Some(doc) = self.store.find_doc(doc_id)? else {
                    continue;
                };
                let tf = raw_freq / doc.max_frequency;
                let doc_weight = tf * term_idf;
                let entry = weights.entry(doc_id.clone()).or_insert_with(|| {
                    order.push(doc_id.clone());
                    (0.0, 0.0)
                });
                entry.0 += doc_weight * query_weight;
                entry.1 += doc_weight * doc_weight;
            }
        }

        let mut query_norm_sq = 0.0;
        for (term, query_tf) in &query_words {
            let weight = query_tf * idf.get(term).copied().unwrap_or(0.0);
            query_norm_sq += weight * weight;
        }
        let query_norm = query_norm_sq.sqrt();

        let mut scored: Vec<(String, f64)> = Vec::new();
        for doc_id in order {
            let Some(&(numerator, doc_norm_sq)) = weights.get(&doc_id) else {
                continue;
            };
            let denominator = doc_norm_sq.sqrt() * query_norm;
            if denominator != 0.0 {
                scored.push((doc_id, numerator / denominator));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(MAX_RESULTS);

        let mut hits: Vec<SearchHit> = Vec::with_capacity(scored.len());
        for (doc_id, score) in scored {
            let Some(doc) = self.store.find_doc(&doc_id)? else {
                continue;
            };
            // Ordered-map insert: a URL seen again keeps its original
            // rank position but takes the later title.
            match hits.iter_mut().find(|hit| hit.url == doc.url) {
                Some(hit) => hit.title = doc.title,
                None => hits.push(SearchHit {
                    url: doc.url,
                    title: doc.title,
                    score,
                }),
            }
        }
        Ok(hits)
    }
}
