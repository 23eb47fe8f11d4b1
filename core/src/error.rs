use std::io;
use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Errors for crawling, indexing and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Store location or database name cannot be used.
    #[error("invalid store configuration: {0}")]
    InvalidStoreConfig(String),
    /// The store's data directory could not be opened or created.
    #[error("could not open the document store: {0}")]
    StoreConnect(#[source] io::Error),
    /// A collection directory could not be created.
    #[error("could not create collection {name}: {source}")]
    CollectionCreate {
        name: String,
        #[source]
        source: io::Error,
    },
    /// The stopword list could not be read.
    #[error("could not read stopwords file {path}: {source}")]
    StopwordsMissing {
        path: String,
        #[source]
        source: io::Error,
    },
    /// An insert hit a record that already exists.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("store read failed at {path}: {source}")]
    StoreRead {
        path: String,
        #[source]
        source: Source,
    },
    #[error("store write failed at {path}: {source}")]
    StoreWrite {
        path: String,
        #[source]
        source: Source,
    },
    /// A page could not be fetched; the URL is dropped.
    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl Error {
    pub(crate) fn store_read(path: &Path, source: impl Into<Source>) -> Self {
        Error::StoreRead {
            path: path.display().to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn store_write(path: &Path, source: impl Into<Source>) -> Self {
        Error::StoreWrite {
            path: path.display().to_string(),
            source: source.into(),
        }
    }

    /// Dialog status for errors that end the program; `None` for the
    /// recoverable kinds that are reported and swallowed at their call
    /// site.
    pub fn fatal_status(&self) -> Option<u8> {
        match self {
            Error::StoreConnect(_) => Some(0),
            Error::CollectionCreate { .. } => Some(2),
            Error::InvalidStoreConfig(_) => Some(3),
            Error::StopwordsMissing { .. } => Some(4),
            _ => None,
        }
    }
}
