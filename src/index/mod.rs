//! Vector index abstraction and backends.
//!
//! The [`VectorIndex`] trait is the seam between the pipeline and wherever
//! vectors actually live. Three backends implement it:
//! - **[`sqlite::SqliteIndex`]** — local persistent store, vectors as BLOBs,
//!   brute-force cosine ranking.
//! - **[`pinecone::PineconeIndex`]** — REST client for a managed serverless
//!   index, with a bounded readiness wait.
//! - **[`memory::MemoryIndex`]** — in-process store for tests and ephemeral
//!   runs.
//!
//! Records are keyed by a content hash of their text, so re-indexing the
//! same site upserts the same ids instead of appending duplicates run after
//! run.

pub mod memory;
pub mod pinecone;
pub mod sqlite;

use std::error::Error;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::IndexConfig;
use crate::models::Passage;

/// Failures at the index boundary. All of them are fatal to the caller.
#[derive(Debug)]
pub enum IndexError {
    /// The index never reported ready within the bounded wait.
    Unavailable(String),
    /// Transport or backend failure.
    Service(String),
    /// Configured dimension or metric conflicts with the existing index.
    Mismatch(String),
    /// The lines/vectors pairing was broken before upsert.
    Pairing { lines: usize, vectors: usize },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Unavailable(e) => write!(f, "index not ready: {}", e),
            IndexError::Service(e) => write!(f, "index service error: {}", e),
            IndexError::Mismatch(e) => write!(f, "index configuration mismatch: {}", e),
            IndexError::Pairing { lines, vectors } => write!(
                f,
                "upsert requires one vector per line, got {} lines and {} vectors",
                lines, vectors
            ),
        }
    }
}

impl Error for IndexError {}

/// A single match returned from a top-k query.
///
/// Raw vector values are never included; callers only need the text.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
}

impl From<QueryMatch> for Passage {
    fn from(m: QueryMatch) -> Self {
        Passage {
            text: m.text,
            score: m.score,
        }
    }
}

/// A persistent, namespaced nearest-neighbor store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index if it does not exist. Idempotent; safe every run.
    async fn ensure_index(&self) -> Result<(), IndexError>;

    /// Write one record per `(line, vector)` pair into `namespace`.
    ///
    /// The 1:1 pairing between `lines[i]` and `vectors[i]` is part of the
    /// contract; mismatched lengths are rejected outright.
    async fn upsert(
        &self,
        lines: &[String],
        vectors: &[Vec<f32>],
        namespace: &str,
    ) -> Result<(), IndexError>;

    /// Return the `top_k` nearest records with their text metadata.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, IndexError>;
}

/// Stable record id derived from the line text.
///
/// Identical lines collapse to the same id, which makes re-crawling
/// idempotent at the index instead of growing duplicates without bound.
pub fn record_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..32].to_string()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Create the appropriate [`VectorIndex`] based on configuration.
pub async fn create_index(config: &IndexConfig) -> Result<Box<dyn VectorIndex>> {
    match config.provider.as_str() {
        "sqlite" => Ok(Box::new(sqlite::SqliteIndex::connect(config).await?)),
        "pinecone" => Ok(Box::new(pinecone::PineconeIndex::new(config)?)),
        "memory" => Ok(Box::new(memory::MemoryIndex::new(config))),
        other => anyhow::bail!("Unknown index provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn record_ids_stable_and_distinct() {
        let a = record_id("veteran housing assistance");
        let b = record_id("veteran housing assistance");
        let c = record_id("childcare subsidies");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }
}
