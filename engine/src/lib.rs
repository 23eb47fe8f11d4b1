//! Lifecycle glue: store connection, collection setup, the crawl-to-
//! search handoff and fatal-status reporting.

use std::sync::Arc;

use bergsearch_core::{Indexer, Result, Retriever, Store, StoreMeta, TextPipeline};
use bergsearch_crawler::{CrawlConfig, CrawlEvent, Crawler};
use tokio::sync::{mpsc, watch};

/// Wires the store, the text pipeline, the crawler and the retriever
/// together for one program run.
#[derive(Debug)]
pub struct Engine {
    store: Arc<Store>,
    pipeline: Arc<TextPipeline>,
}

impl Engine {
    /// Connect to the store, set up both collections and load the
    /// stopword list. Any failure here is fatal to the program.
    pub fn connect(uri: &str, db: &str, stopwords: &str) -> Result<Self> {
        let store = Store::connect(uri, db)?;
        store.create_collections()?;
        let pipeline = TextPipeline::from_file(stopwords)?;
        Ok(Self {
            store: Arc::new(store),
            pipeline: Arc::new(pipeline),
        })
    }

    /// Run a crawl to completion and return the number of pages indexed.
    /// `events` reports crawl start and finish; `shutdown` drains the
    /// workers early when signalled. The store metadata is stamped
    /// best-effort afterwards.
    pub async fn run_crawl(
        &self,
        config: CrawlConfig,
        events: mpsc::UnboundedSender<CrawlEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<usize> {
        let crawler = Crawler::new(
            config,
            self.store.clone(),
            self.pipeline.clone(),
            events,
            shutdown,
        )?;
        let pages = crawler.run().await;
        if let Err(err) = self.store.write_meta(&StoreMeta::stamp(pages)) {
            tracing::warn!(%err, "could not stamp crawl metadata");
        }
        Ok(pages)
    }

    /// Indexer over this engine's store and pipeline, for feeding pages
    /// in without a crawl.
    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.store.clone(), self.pipeline.clone())
    }

    /// Retriever snapshotting the current index size.
    pub fn retriever(&self) -> Result<Retriever> {
        Retriever::open(self.store.clone(), self.pipeline.clone())
    }
}

/// User-facing message for a fatal status, numbered like the error
/// dialogs of the UI contract.
pub fn fatal_message(status: u8) -> &'static str {
    match status {
        0 => "could not connect to the document store; check the store location and database name",
        2 => "could not create the store collections; check that the store location is writable",
        3 => "invalid store location or database name; restart with a valid configuration",
        4 => "no stopwords file found; place stopwords.txt in the working directory",
        _ => "a store error occurred; check the store configuration",
    }
}
