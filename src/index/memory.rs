//! In-memory [`VectorIndex`] implementation for tests and ephemeral runs.
//!
//! Namespaced records behind a `std::sync::RwLock`; queries are brute-force
//! cosine similarity over everything in the namespace.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::config::IndexConfig;

use super::{cosine_similarity, record_id, IndexError, QueryMatch, VectorIndex};

struct StoredRecord {
    id: String,
    vector: Vec<f32>,
    text: String,
}

/// In-process vector index.
pub struct MemoryIndex {
    dimension: usize,
    metric: String,
    namespaces: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryIndex {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            dimension: config.dimension,
            metric: config.metric.clone(),
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        if self.metric != "cosine" {
            return Err(IndexError::Mismatch(format!(
                "memory index supports only the cosine metric, got '{}'",
                self.metric
            )));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        lines: &[String],
        vectors: &[Vec<f32>],
        namespace: &str,
    ) -> Result<(), IndexError> {
        if lines.len() != vectors.len() {
            return Err(IndexError::Pairing {
                lines: lines.len(),
                vectors: vectors.len(),
            });
        }
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(IndexError::Mismatch(format!(
                    "expected {}-dimensional vectors, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        let mut namespaces = self.namespaces.write().unwrap();
        let records = namespaces.entry(namespace.to_string()).or_default();

        for (line, vector) in lines.iter().zip(vectors.iter()) {
            let id = record_id(line);
            records.retain(|r| r.id != id);
            records.push(StoredRecord {
                id,
                vector: vector.clone(),
                text: line.clone(),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let namespaces = self.namespaces.read().unwrap();
        let records = match namespaces.get(namespace) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        let mut matches: Vec<QueryMatch> = records
            .iter()
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.vector),
                text: r.text.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        Ok(matches)
    }
}
