use std::collections::HashSet;
use std::sync::Arc;

use bergsearch_core::rank::MAX_RESULTS;
use bergsearch_core::{Indexer, Retriever, Store, TextPipeline};
use tempfile::tempdir;

struct Fixture {
    _dir: tempfile::TempDir,
    store: Arc<Store>,
    pipeline: Arc<TextPipeline>,
    indexer: Indexer,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let store = Store::connect(dir.path().to_str().unwrap(), "campus").unwrap();
    store.create_collections().unwrap();
    let store = Arc::new(store);
    let pipeline = Arc::new(TextPipeline::with_stopwords(HashSet::new()));
    let indexer = Indexer::new(store.clone(), pipeline.clone());
    Fixture {
        _dir: dir,
        store,
        pipeline,
        indexer,
    }
}

impl Fixture {
    fn retriever(&self) -> Retriever {
        Retriever::open(self.store.clone(), self.pipeline.clone()).unwrap()
    }
}

#[test]
fn empty_corpus_yields_no_results() {
    let fixture = fixture();
    let hits = fixture.retriever().search("anything at all").unwrap();
    assert!(hits.is_empty());
}

#[test]
fn single_document_scores_perfect_cosine() {
    let fixture = fixture();
    fixture
        .indexer
        .index_page("1", "https://www.muhlenberg.edu/", "Hello World", "hello hello world")
        .unwrap();

    let hits = fixture.retriever().search("world").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "https://www.muhlenberg.edu/");
    assert_eq!(hits[0].title, "Hello World");
    assert!((hits[0].score - 1.0).abs() < 1e-9);
}

#[test]
fn unknown_terms_contribute_nothing() {
    let fixture = fixture();
    fixture
        .indexer
        .index_page("1", "https://www.muhlenberg.edu/", "Hello World", "hello hello world")
        .unwrap();

    let hits = fixture.retriever().search("zebra quux").unwrap();
    assert!(hits.is_empty());
}

#[test]
fn ranks_aligned_documents_first() {
    let fixture = fixture();
    // Doc 1 mirrors the query's term proportions exactly; doc 2 matches
    // on one term only, so its vector points away from the query.
    fixture
        .indexer
        .index_page(
            "1",
            "https://www.muhlenberg.edu/campus",
            "",
            "campus tour campus tour",
        )
        .unwrap();
    fixture
        .indexer
        .index_page("2", "https://www.muhlenberg.edu/library", "", "campus hours")
        .unwrap();

    let hits = fixture.retriever().search("campus tour").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://www.muhlenberg.edu/campus");
    assert!((hits[0].score - 1.0).abs() < 1e-9);
    assert!(hits[1].score < hits[0].score);
    for hit in &hits {
        assert!(hit.score >= 0.0 && hit.score <= 1.0 + 1e-9);
    }
}

#[test]
fn results_are_capped_at_twenty_five() {
    let fixture = fixture();
    for i in 1..=30 {
        fixture
            .indexer
            .index_page(
                &i.to_string(),
                &format!("https://www.muhlenberg.edu/page/{i}"),
                &format!("Page {i}"),
                "registrar calendar deadline",
            )
            .unwrap();
    }

    let hits = fixture.retriever().search("registrar").unwrap();
    assert_eq!(hits.len(), MAX_RESULTS);
    let mut last = f64::INFINITY;
    for hit in &hits {
        assert!(hit.score <= last + 1e-12);
        last = hit.score;
    }
}

#[test]
fn duplicate_urls_collapse_in_rank_order() {
    let fixture = fixture();
    fixture
        .indexer
        .index_page("1", "https://www.muhlenberg.edu/same", "Same", "athletics schedule")
        .unwrap();
    fixture
        .indexer
        .index_page("2", "https://www.muhlenberg.edu/same", "Same", "athletics roster")
        .unwrap();

    let hits = fixture.retriever().search("athletics").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "https://www.muhlenberg.edu/same");
}

#[test]
fn duplicate_urls_keep_first_rank_but_take_later_title() {
    let fixture = fixture();
    // Doc 1 mirrors the query proportions exactly and ranks first; doc 2
    // shares its URL, matches one term only, and ranks second.
    fixture
        .indexer
        .index_page(
            "1",
            "https://www.muhlenberg.edu/same",
            "Main Entry",
            "campus tour campus tour",
        )
        .unwrap();
    fixture
        .indexer
        .index_page(
            "2",
            "https://www.muhlenberg.edu/same",
            "Alternate Entry",
            "campus hours",
        )
        .unwrap();

    let hits = fixture.retriever().search("campus tour").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "https://www.muhlenberg.edu/same");
    // The lower-ranked duplicate overwrote the title but kept the
    // higher-ranked position and score.
    assert_eq!(hits[0].title, "Alternate Entry");
    assert!((hits[0].score - 1.0).abs() < 1e-9);
}
