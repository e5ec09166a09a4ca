//! Batch crawl-and-index orchestration.
//!
//! Drives the offline flow: crawl every seed into one shared run, embed the
//! collected lines as passages, then ensure the index exists and upsert.
//! There is no transaction across embed+upsert; a failure between the two
//! loses this run's work, which is acceptable for a batch job but is logged
//! as a partial-completion condition rather than silently dropped.

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::crawl::{CrawlOutcome, Crawler};
use crate::embedding::{self, InputMode};
use crate::fetch::HttpFetcher;
use crate::index;

/// `bscout init`: idempotently create the vector index.
pub async fn run_init(config: &Config) -> Result<()> {
    let index = index::create_index(&config.index).await?;
    index.ensure_index().await?;
    println!(
        "index '{}' ready ({} provider, dimension {}, metric {})",
        config.index.name, config.index.provider, config.index.dimension, config.index.metric
    );
    Ok(())
}

/// `bscout crawl`: run the bounded crawl and report what it would index.
pub async fn run_crawl(config: &Config, url: &str) -> Result<()> {
    let fetcher = HttpFetcher::new(config.crawl.timeout_secs)?;
    let crawler = Crawler::new(&fetcher, config.crawl.max_depth, config.crawl.max_visited);
    let outcome = crawler.crawl(url).await;

    println!("crawl {}", url);
    println!("  urls visited: {}", outcome.visited.len());
    println!("  lines collected: {}", outcome.lines.len());
    for visited in &outcome.visited {
        println!("  visited: {}", visited);
    }
    Ok(())
}

/// `bscout index`: the full batch job of crawl, embed, upsert.
///
/// Seeds come from the CLI when given, otherwise from `crawl.seeds` in the
/// config. The visited set, its cap, and line deduplication are shared
/// across all seeds, so the run-wide bounds hold regardless of seed count.
pub async fn run_index(config: &Config, seed_override: &[String]) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Indexing requires embeddings. Set [embedding] provider in config.");
    }

    let seeds: &[String] = if seed_override.is_empty() {
        &config.crawl.seeds
    } else {
        seed_override
    };
    if seeds.is_empty() {
        bail!("No seed URLs. Pass them on the command line or set crawl.seeds in config.");
    }

    let fetcher = HttpFetcher::new(config.crawl.timeout_secs)?;
    let crawler = Crawler::new(&fetcher, config.crawl.max_depth, config.crawl.max_visited);

    let mut outcome = CrawlOutcome::default();
    for seed in seeds {
        crawler.crawl_into(seed, &mut outcome).await;
    }

    println!("index run");
    println!("  seeds: {}", seeds.len());
    println!("  urls visited: {}", outcome.visited.len());
    println!("  lines collected: {}", outcome.lines.len());

    if outcome.lines.is_empty() {
        println!("No data crawled.");
        return Ok(());
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let vectors = match embedding::embed_lines(
        embedder.as_ref(),
        &outcome.lines,
        InputMode::Passage,
        config.embedding.max_documents,
    )
    .await
    {
        Ok(vectors) => vectors,
        Err(e) => {
            warn!(
                lines = outcome.lines.len(),
                "crawl completed but embedding failed; this run's work is lost"
            );
            return Err(e).context("Embedding failed after crawl");
        }
    };

    let index = index::create_index(&config.index).await?;
    index.ensure_index().await?;

    if let Err(e) = index
        .upsert(&outcome.lines, &vectors, &config.index.namespace)
        .await
    {
        warn!(
            lines = outcome.lines.len(),
            "embedding completed but upsert failed; this run's work is lost"
        );
        return Err(e).context("Upsert failed after embedding");
    }

    println!(
        "  records upserted: {} (namespace '{}')",
        outcome.lines.len(),
        config.index.namespace
    );
    println!("ok");

    Ok(())
}
