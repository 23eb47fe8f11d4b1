//! File-backed document store: one bincode record per crawled page and
//! one posting file per indexed term, grouped into two collection
//! directories under the database root.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};

pub const DOCS_COLLECTION: &str = "CrawlerDocs";
pub const INDEX_COLLECTION: &str = "InvertedIndex";

const DOC_SUFFIX: &str = ".doc.bin";
const POSTINGS_SUFFIX: &str = ".postings.bin";

/// One record per successfully crawled page. `max_frequency` is the
/// largest body term count, captured before the title boost is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub max_frequency: f64,
}

/// Document id -> raw (possibly title-boosted) term frequency.
pub type PostingMap = HashMap<String, f64>;

/// Summary stamped into `meta.json` when a crawl completes.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreMeta {
    pub pages_crawled: usize,
    pub created_at: String,
    pub version: u32,
}

impl StoreMeta {
    pub fn stamp(pages_crawled: usize) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            pages_crawled,
            created_at,
            version: 1,
        }
    }
}

/// Handle on one named database under a store location. All operations
/// touch a single file, so a handle can be shared across workers behind
/// an `Arc`.
#[derive(Debug)]
pub struct Store {
    db_root: PathBuf,
}

impl Store {
    /// Open (creating if needed) database `db` under the directory
    /// `uri`.
    pub fn connect(uri: &str, db: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(Error::InvalidStoreConfig("store location is empty".into()));
        }
        if db.trim().is_empty() || db.contains('/') || db.contains('\\') {
            return Err(Error::InvalidStoreConfig(format!(
                "invalid database name {db:?}"
            )));
        }
        let db_root = Path::new(uri).join(db);
        fs::create_dir_all(&db_root).map_err(Error::StoreConnect)?;
        Ok(Self { db_root })
    }

    /// Create the document and inverted-index collections.
    pub fn create_collections(&self) -> Result<()> {
        for name in [DOCS_COLLECTION, INDEX_COLLECTION] {
            fs::create_dir_all(self.db_root.join(name)).map_err(|source| {
                Error::CollectionCreate {
                    name: name.into(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.db_root
            .join(DOCS_COLLECTION)
            .join(format!("{id}{DOC_SUFFIX}"))
    }

    fn term_path(&self, term: &str) -> PathBuf {
        self.db_root
            .join(INDEX_COLLECTION)
            .join(format!("{term}{POSTINGS_SUFFIX}"))
    }

    pub fn insert_doc(&self, doc: &DocRecord) -> Result<()> {
        write_new(&self.doc_path(&doc.id), doc)
    }

    pub fn find_doc(&self, id: &str) -> Result<Option<DocRecord>> {
        read_record(&self.doc_path(id))
    }

    /// Insert the first posting map for a term not yet indexed.
    pub fn insert_term(&self, term: &str, postings: &PostingMap) -> Result<()> {
        write_new(&self.term_path(term), postings)
    }

    /// Replace the whole posting map for `term`. Concurrent writers can
    /// lose each other's postings; the later write wins.
    pub fn update_term_index(&self, term: &str, postings: &PostingMap) -> Result<()> {
        write_record(&self.term_path(term), postings)
    }

    pub fn find_term(&self, term: &str) -> Result<Option<PostingMap>> {
        read_record(&self.term_path(term))
    }

    /// Snapshot of every term currently indexed.
    pub fn distinct_terms(&self) -> Result<HashSet<String>> {
        let dir = self.db_root.join(INDEX_COLLECTION);
        let entries = fs::read_dir(&dir).map_err(|err| Error::store_read(&dir, err))?;
        let mut terms = HashSet::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::store_read(&dir, err))?;
            let name = entry.file_name();
            if let Some(term) = name.to_string_lossy().strip_suffix(POSTINGS_SUFFIX) {
                terms.insert(term.to_string());
            }
        }
        Ok(terms)
    }

    /// Number of distinct terms currently indexed.
    pub fn count_terms(&self) -> Result<u64> {
        Ok(self.distinct_terms()?.len() as u64)
    }

    /// Stamp the crawl summary into `meta.json` under the database root.
    pub fn write_meta(&self, meta: &StoreMeta) -> Result<()> {
        let path = self.db_root.join("meta.json");
        let json =
            serde_json::to_string_pretty(meta).map_err(|err| Error::store_write(&path, err))?;
        fs::write(&path, json).map_err(|err| Error::store_write(&path, err))
    }
}

fn write_new<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(Error::DuplicateKey(path.display().to_string()))
        }
        Err(err) => return Err(Error::store_write(path, err)),
    };
    let bytes = bincode::serialize(value).map_err(|err| Error::store_write(path, err))?;
    file.write_all(&bytes)
        .map_err(|err| Error::store_write(path, err))
}

fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(|err| Error::store_write(path, err))?;
    fs::write(path, bytes).map_err(|err| Error::store_write(path, err))
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::store_read(path, err)),
    };
    let value = bincode::deserialize(&bytes).map_err(|err| Error::store_read(path, err))?;
    Ok(Some(value))
}
