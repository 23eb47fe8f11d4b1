use std::io::{self, BufRead, Write};

use anyhow::Result;
use bergsearch::{fatal_message, Engine};
use bergsearch_core::Error;
use bergsearch_crawler::{CrawlConfig, CrawlEvent};
use clap::{Args, Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "bergsearch")]
#[command(about = "Crawl a campus domain and search it with TF-IDF ranking")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    /// Store location (a data directory)
    #[arg(long)]
    store: String,
    /// Database name inside the store
    #[arg(long)]
    db: String,
    /// Stopword list, one lowercase token per line
    #[arg(long, default_value = "stopwords.txt")]
    stopwords: String,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the configured domain, then open the search prompt
    Crawl {
        #[command(flatten)]
        store: StoreArgs,
        /// First URL fetched
        #[arg(long, default_value = "https://www.muhlenberg.edu/")]
        seed: String,
        /// Follow only links containing this substring
        #[arg(long, default_value = "muhlenberg.edu")]
        domain: String,
        /// Never follow links containing this substring
        #[arg(long, default_value = "keyword")]
        exclude: String,
        /// Maximum number of pages to index
        #[arg(long, default_value_t = 5000)]
        limit: usize,
        /// Concurrent page workers
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Fetch timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
    /// Open the search prompt over an existing crawl
    Search {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Crawl {
            store,
            seed,
            domain,
            exclude,
            limit,
            workers,
            timeout,
        } => {
            let engine = connect(&store);
            let config = CrawlConfig {
                seed,
                domain,
                exclude,
                limit,
                workers,
                timeout_secs: timeout,
                ..CrawlConfig::default()
            };

            let (events_tx, mut events_rx) = mpsc::unbounded_channel();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            // The crawler reads a dropped sender as a shutdown request,
            // so this task parks forever to keep it alive.
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
                std::future::pending::<()>().await;
            });
            let waiting = tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    match event {
                        CrawlEvent::Started => {
                            println!("Please wait, crawling in progress...")
                        }
                        CrawlEvent::Finished { pages } => {
                            println!("Crawl finished: {pages} pages indexed.")
                        }
                    }
                }
            });

            if let Err(err) = engine.run_crawl(config, events_tx, shutdown_rx).await {
                report_fatal(&err);
            }
            let _ = waiting.await;
            search_prompt(&engine)?;
        }
        Command::Search { store } => {
            let engine = connect(&store);
            search_prompt(&engine)?;
        }
    }
    Ok(())
}

fn connect(args: &StoreArgs) -> Engine {
    match Engine::connect(&args.store, &args.db, &args.stopwords) {
        Ok(engine) => engine,
        Err(err) => report_fatal(&err),
    }
}

/// Print the status-numbered message for a fatal error and exit.
fn report_fatal(err: &Error) -> ! {
    let status = err.fatal_status().unwrap_or(1);
    tracing::error!(%err, status, "fatal error");
    eprintln!("error {status}: {}", fatal_message(status));
    std::process::exit(1);
}

/// Minimal stand-in for the browser view: one query per line, results
/// printed as `title: url`.
fn search_prompt(engine: &Engine) -> Result<()> {
    let retriever = match engine.retriever() {
        Ok(retriever) => retriever,
        Err(err) => report_fatal(&err),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("search> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query == "quit" {
            break;
        }
        if query.is_empty() {
            println!("Please input a search query");
            continue;
        }
        match retriever.search(query) {
            Ok(hits) if hits.is_empty() => println!("no results"),
            Ok(hits) => {
                for hit in hits {
                    println!("{}: {}", hit.title, hit.url);
                }
            }
            Err(err) => {
                tracing::error!(%err, "search failed");
                println!("error 1: {}", fatal_message(1));
            }
        }
    }
    Ok(())
}
