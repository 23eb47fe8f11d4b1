use bergsearch::{fatal_message, Engine};
use tempfile::tempdir;

fn write_stopwords(dir: &std::path::Path, words: &str) -> String {
    let path = dir.join("stopwords.txt");
    std::fs::write(&path, words).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn connect_rejects_bad_database_name() {
    let dir = tempdir().unwrap();
    let stopwords = write_stopwords(dir.path(), "the\n");
    let err = Engine::connect(dir.path().to_str().unwrap(), "bad/name", &stopwords).unwrap_err();
    assert_eq!(err.fatal_status(), Some(3));
    assert!(fatal_message(3).contains("invalid"));
}

#[test]
fn connect_requires_stopwords_file() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.txt");
    let err = Engine::connect(
        dir.path().to_str().unwrap(),
        "campus",
        missing.to_str().unwrap(),
    )
    .unwrap_err();
    assert_eq!(err.fatal_status(), Some(4));
}

#[test]
fn empty_store_searches_empty() {
    let dir = tempdir().unwrap();
    let stopwords = write_stopwords(dir.path(), "the\na\n");
    let engine = Engine::connect(dir.path().to_str().unwrap(), "campus", &stopwords).unwrap();
    let hits = engine.retriever().unwrap().search("anything").unwrap();
    assert!(hits.is_empty());
}

#[test]
fn index_then_search_round_trip() {
    let dir = tempdir().unwrap();
    let stopwords = write_stopwords(dir.path(), "the\na\n");
    let engine = Engine::connect(dir.path().to_str().unwrap(), "campus", &stopwords).unwrap();

    let indexer = engine.indexer();
    indexer
        .index_page(
            "1",
            "https://www.muhlenberg.edu/registrar",
            "Registrar",
            "the registrar posts the academic calendar",
        )
        .unwrap();
    indexer
        .index_page(
            "2",
            "https://www.muhlenberg.edu/library",
            "Library",
            "a library holds books",
        )
        .unwrap();

    let retriever = engine.retriever().unwrap();
    let hits = retriever.search("library books").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "https://www.muhlenberg.edu/library");
    assert_eq!(hits[0].title, "Library");

    // Later writes are visible to a retriever opened afterwards.
    indexer
        .index_page("3", "https://www.muhlenberg.edu/arts", "Arts", "gallery hours")
        .unwrap();
    let hits = engine.retriever().unwrap().search("gallery").unwrap();
    assert_eq!(hits.len(), 1);
}
