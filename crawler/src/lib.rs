//! Bounded concurrent crawl loop: fetches pages within one domain,
//! indexes them and follows their links until the crawl cap is reached.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bergsearch_core::{Error, Indexer, Result, Store, TextPipeline};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use reqwest::{header, Client, Url};
use scraper::{Html, Selector};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref SEL_ANCHOR: Selector = Selector::parse("a").expect("valid selector");
}

/// How long in-flight page tasks get to finish once the crawl is over.
const DRAIN_GRACE: Duration = Duration::from_secs(10);
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Crawl parameters. The defaults reproduce the campus configuration:
/// start at the muhlenberg.edu front page, stay on that domain, skip
/// keyword-search links, index at most 5000 pages with four workers.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// First URL fetched.
    pub seed: String,
    /// Links are followed only when they contain this substring.
    pub domain: String,
    /// Links containing this substring are never followed.
    pub exclude: String,
    /// Maximum number of pages indexed.
    pub limit: usize,
    /// Number of concurrently executing page tasks.
    pub workers: usize,
    /// Per-request fetch timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed: "https://www.muhlenberg.edu/".into(),
            domain: "muhlenberg.edu".into(),
            exclude: "keyword".into(),
            limit: 5000,
            workers: 4,
            timeout_secs: 10,
            user_agent: concat!("bergsearch/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Lifecycle notifications for whoever is watching the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    Started,
    Finished { pages: usize },
}

pub struct Crawler {
    config: Arc<CrawlConfig>,
    client: Client,
    indexer: Arc<Indexer>,
    visited: Arc<Mutex<HashSet<String>>>,
    crawled: Arc<AtomicUsize>,
    events: mpsc::UnboundedSender<CrawlEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Crawler {
    pub fn new(
        config: CrawlConfig,
        store: Arc<Store>,
        pipeline: Arc<TextPipeline>,
        events: mpsc::UnboundedSender<CrawlEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| Error::Fetch(err.to_string()))?;
        Ok(Self {
            config: Arc::new(config),
            client,
            indexer: Arc::new(Indexer::new(store, pipeline)),
            visited: Arc::new(Mutex::new(HashSet::new())),
            crawled: Arc::new(AtomicUsize::new(0)),
            events,
            shutdown,
        })
    }

    /// Drive the crawl to completion and return the number of pages
    /// indexed. The crawl ends when the cap is reached, the frontier
    /// drains, or shutdown is signalled; in-flight tasks always get a
    /// bounded grace period before cancellation.
    pub async fn run(mut self) -> usize {
        let _ = self.events.send(CrawlEvent::Started);
        tracing::info!(
            seed = %self.config.seed,
            limit = self.config.limit,
            workers = self.config.workers,
            "crawl starting"
        );

        let mut frontier: VecDeque<String> = VecDeque::from([self.config.seed.clone()]);
        let mut tasks: JoinSet<Vec<String>> = JoinSet::new();

        loop {
            if self.crawled.load(Ordering::SeqCst) >= self.config.limit {
                break;
            }
            while tasks.len() < self.config.workers {
                match frontier.pop_front() {
                    Some(url) => {
                        tasks.spawn(self.page_task(url));
                    }
                    None => break,
                }
            }
            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                joined = tasks.join_next() => {
                    match joined {
                        Some(Ok(links)) => frontier.extend(links),
                        Some(Err(err)) => tracing::debug!(%err, "page task aborted"),
                        None => {}
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("crawl shutdown requested");
                        break;
                    }
                }
            }
        }

        drain(tasks).await;
        let pages = self.crawled.load(Ordering::SeqCst);
        tracing::info!(pages, "crawl finished");
        let _ = self.events.send(CrawlEvent::Finished { pages });
        pages
    }

    fn page_task(&self, url: String) -> impl Future<Output = Vec<String>> + Send + 'static {
        let task = PageTask {
            client: self.client.clone(),
            config: self.config.clone(),
            indexer: self.indexer.clone(),
            visited: self.visited.clone(),
            crawled: self.crawled.clone(),
        };
        task.run(url)
    }
}

/// Let outstanding tasks finish within the grace period, then cancel
/// whatever is left.
async fn drain(mut tasks: JoinSet<Vec<String>>) {
    if tasks.is_empty() {
        return;
    }
    tracing::info!(in_flight = tasks.len(), "draining crawl workers");
    let drained = {
        let grace = async {
            while tasks.join_next().await.is_some() {}
        };
        tokio::time::timeout(DRAIN_GRACE, grace).await.is_ok()
    };
    if !drained {
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        tracing::warn!("crawl workers cancelled after grace period");
    }
}

struct PageTask {
    client: Client,
    config: Arc<CrawlConfig>,
    indexer: Arc<Indexer>,
    visited: Arc<Mutex<HashSet<String>>>,
    crawled: Arc<AtomicUsize>,
}

impl PageTask {
    /// Fetch, index and extract links from one URL. Every failure path
    /// drops the URL and returns no links.
    async fn run(self, url: String) -> Vec<String> {
        if self.crawled.load(Ordering::SeqCst) >= self.config.limit {
            return Vec::new();
        }
        if !self.visited.lock().insert(visited_key(&url).to_string()) {
            return Vec::new();
        }
        let base = match Url::parse(&url) {
            Ok(base) => base,
            Err(err) => {
                tracing::debug!(%url, %err, "skipping unparsable url");
                return Vec::new();
            }
        };
        let html = match self.fetch(&url).await {
            Ok(html) => html,
            Err(err) => {
                tracing::debug!(%url, %err, "fetch failed");
                return Vec::new();
            }
        };
        let page = extract(&base, &html, &self.config);

        // The ordinal doubles as the document id; minting refuses to
        // pass the cap, so at most `limit` documents ever exist.
        let Some(doc_id) = claim_doc_id(&self.crawled, self.config.limit) else {
            return Vec::new();
        };
        if doc_id % 100 == 0 {
            tracing::info!(pages = doc_id, "crawl progress");
        }
        if let Err(err) = self
            .indexer
            .index_page(&doc_id.to_string(), &url, &page.title, &page.text)
        {
            tracing::warn!(%url, %err, "indexing failed");
        }
        page.links
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::Fetch(err.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Fetch(format!("status {}", response.status())));
        }
        if let Some(content_type) = response.headers().get(header::CONTENT_TYPE) {
            let value = content_type.to_str().unwrap_or("");
            if !value.starts_with("text/html") {
                return Err(Error::Fetch(format!("unsupported content type {value:?}")));
            }
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| Error::Fetch(err.to_string()))?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err(Error::Fetch(format!("page too large ({} bytes)", bytes.len())));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

struct Page {
    title: String,
    text: String,
    links: Vec<String>,
}

/// Pull the title, body text and admissible outbound links from a page.
/// Links are resolved to absolute form with fragments stripped.
fn extract(base: &Url, html: &str, config: &CrawlConfig) -> Page {
    let doc = Html::parse_document(html);
    let title = doc
        .select(&SEL_TITLE)
        .next()
        .map(|node| node.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string();
    let text = doc
        .select(&SEL_BODY)
        .next()
        .map(|node| node.text().collect::<String>())
        .unwrap_or_default();

    let mut links = Vec::new();
    for anchor in doc.select(&SEL_ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = Url::parse(href).or_else(|_| base.join(href)) else {
            continue;
        };
        if !resolved.scheme().starts_with("http") {
            continue;
        }
        resolved.set_fragment(None);
        let absolute = resolved.to_string();
        if follow_link(&absolute, config) {
            links.push(absolute);
        }
    }
    Page { title, text, links }
}

/// A link is followed when it stays inside the configured domain and
/// does not carry the exclusion marker.
pub fn follow_link(link: &str, config: &CrawlConfig) -> bool {
    let lowered = link.to_lowercase();
    lowered.contains(&config.domain) && !lowered.contains(&config.exclude)
}

/// Visited-set key: the URL with its scheme and any leading `www.`
/// stripped; first matching prefix wins.
pub fn visited_key(url: &str) -> &str {
    for prefix in ["https://www.", "http://www.", "https://", "http://"] {
        if let Some(rest) = url.strip_prefix(prefix) {
            return rest;
        }
    }
    url
}

/// Mint the next document ordinal, refusing to pass the crawl cap.
fn claim_doc_id(crawled: &AtomicUsize, limit: usize) -> Option<usize> {
    crawled
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
            (count < limit).then_some(count + 1)
        })
        .ok()
        .map(|previous| previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visited_key_strips_scheme_and_www() {
        assert_eq!(
            visited_key("https://www.example.muhlenberg.edu/"),
            "example.muhlenberg.edu/"
        );
        assert_eq!(
            visited_key("http://example.muhlenberg.edu/"),
            "example.muhlenberg.edu/"
        );
        assert_eq!(visited_key("ftp://example.org/"), "ftp://example.org/");
    }

    #[test]
    fn scheme_variants_share_one_key() {
        assert_eq!(
            visited_key("https://www.example.muhlenberg.edu/page"),
            visited_key("http://example.muhlenberg.edu/page")
        );
    }

    #[test]
    fn follow_link_filters_by_domain_and_marker() {
        let config = CrawlConfig::default();
        assert!(follow_link("https://www.muhlenberg.edu/ok", &config));
        assert!(follow_link("HTTPS://WWW.MUHLENBERG.EDU/OK", &config));
        assert!(!follow_link("https://other.edu/page", &config));
        assert!(!follow_link("https://www.muhlenberg.edu/keyword/x", &config));
    }

    #[test]
    fn doc_ids_never_pass_the_cap() {
        let crawled = AtomicUsize::new(0);
        assert_eq!(claim_doc_id(&crawled, 3), Some(1));
        assert_eq!(claim_doc_id(&crawled, 3), Some(2));
        assert_eq!(claim_doc_id(&crawled, 3), Some(3));
        assert_eq!(claim_doc_id(&crawled, 3), None);
        assert_eq!(crawled.load(Ordering::SeqCst), 3);
    }
}
