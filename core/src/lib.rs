//! Core retrieval machinery for bergsearch: the text normalization
//! pipeline, the file-backed document store, the indexer that folds
//! crawled pages into it, and the TF-IDF retriever that ranks them.

pub mod error;
pub mod index;
pub mod pipeline;
pub mod rank;
pub mod store;

pub use error::{Error, Result};
pub use index::Indexer;
pub use pipeline::TextPipeline;
pub use rank::{Retriever, SearchHit};
pub use store::{DocRecord, PostingMap, Store, StoreMeta};
