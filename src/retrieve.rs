//! Query-time retrieval.
//!
//! Embeds free text in query mode and returns the top-k passages from the
//! pipeline's namespace, in the index's native descending-similarity order.
//! No re-ranking happens here.
//!
//! Failures propagate: a broken embedder or index surfaces as an error
//! rather than an empty result, so callers never build a prompt that only
//! looks grounded.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::index::{self, VectorIndex};
use crate::models::Passage;

pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    namespace: String,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        namespace: &str,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            namespace: namespace.to_string(),
            top_k,
        }
    }

    pub async fn retrieve(&self, query_text: &str) -> Result<Vec<Passage>> {
        let vector = embedding::embed_query(self.embedder, query_text)
            .await
            .context("Failed to embed query")?;

        let matches = self
            .index
            .query(&self.namespace, &vector, self.top_k)
            .await
            .context("Retrieval unavailable")?;

        Ok(matches.into_iter().map(Passage::from).collect())
    }
}

/// `bscout query`: print the top-k passages for a free-text query.
pub async fn run_query(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        anyhow::bail!("Querying requires embeddings. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let index = index::create_index(&config.index).await?;
    let retriever = Retriever::new(
        embedder.as_ref(),
        index.as_ref(),
        &config.index.namespace,
        top_k.unwrap_or(config.retrieval.top_k),
    );

    let passages = retriever.retrieve(query).await?;

    if passages.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, passage) in passages.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, passage.score, passage.text);
    }

    Ok(())
}
