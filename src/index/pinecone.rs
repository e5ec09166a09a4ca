//! REST client for a Pinecone-style serverless vector index.
//!
//! Control plane: list/create/describe indexes on the API host. Data plane:
//! upsert and query against the per-index host returned by describe.
//! Requires the `PINECONE_API_KEY` environment variable.
//!
//! Creation is eventually consistent on the service side, so [`upsert`]
//! first waits for the index to report ready: a bounded poll, not a
//! forever-loop; expiry surfaces as [`IndexError::Unavailable`].

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::IndexConfig;

use super::{record_id, IndexError, QueryMatch, VectorIndex};

const DEFAULT_API_URL: &str = "https://api.pinecone.io";

/// Data-plane upsert batch ceiling of the service.
const UPSERT_BATCH: usize = 100;

struct IndexStatus {
    ready: bool,
    host: String,
    dimension: usize,
    metric: String,
}

/// Managed serverless vector index client.
pub struct PineconeIndex {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    name: String,
    dimension: usize,
    metric: String,
    ready_max_attempts: u32,
    ready_interval_secs: u64,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        if config.ready_max_attempts == 0 {
            bail!("index.ready_max_attempts must be >= 1");
        }

        Ok(Self {
            client,
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
            name: config.name.clone(),
            dimension: config.dimension,
            metric: config.metric.clone(),
            ready_max_attempts: config.ready_max_attempts,
            ready_interval_secs: config.ready_interval_secs,
        })
    }

    async fn describe(&self) -> Result<Option<IndexStatus>, IndexError> {
        let resp = self
            .client
            .get(format!("{}/indexes/{}", self.api_url, self.name))
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Service(format!(
                "describe index failed with {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        Ok(Some(IndexStatus {
            ready: json
                .pointer("/status/ready")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            host: json
                .get("host")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            dimension: json
                .get("dimension")
                .and_then(|v| v.as_u64())
                .unwrap_or_default() as usize,
            metric: json
                .get("metric")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }))
    }

    /// Poll describe until the index reports ready, bounded by configuration.
    async fn wait_ready(&self) -> Result<String, IndexError> {
        for attempt in 0..self.ready_max_attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(self.ready_interval_secs)).await;
            }
            if let Some(status) = self.describe().await? {
                if status.ready && !status.host.is_empty() {
                    return Ok(data_plane_url(&status.host));
                }
            }
        }

        Err(IndexError::Unavailable(format!(
            "index '{}' not ready after {} attempts",
            self.name, self.ready_max_attempts
        )))
    }
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn parse_query_matches(json: &serde_json::Value) -> Result<Vec<QueryMatch>, IndexError> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| IndexError::Service("query response missing matches array".to_string()))?;

    Ok(matches
        .iter()
        .map(|m| QueryMatch {
            id: m
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            score: m.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
            text: m
                .pointer("/metadata/text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
        .collect())
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        if let Some(status) = self.describe().await? {
            if status.dimension != self.dimension || status.metric != self.metric {
                return Err(IndexError::Mismatch(format!(
                    "index '{}' exists with dimension {} / metric '{}', configured {} / '{}'",
                    self.name, status.dimension, status.metric, self.dimension, self.metric
                )));
            }
            return Ok(());
        }

        let body = serde_json::json!({
            "name": self.name,
            "dimension": self.dimension,
            "metric": self.metric,
            "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } },
        });

        let resp = self
            .client
            .post(format!("{}/indexes", self.api_url))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        // 409: another run created it between describe and create.
        if resp.status().is_success() || resp.status().as_u16() == 409 {
            return Ok(());
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(IndexError::Service(format!(
            "create index failed with {}: {}",
            status, body
        )))
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

        let host = self.wait_ready().await?;

        let records: Vec<serde_json::Value> = lines
            .iter()
            .zip(vectors.iter())
            .map(|(line, vector)| {
                serde_json::json!({
                    "id": record_id(line),
                    "values": vector,
                    "metadata": { "text": line },
                })
            })
            .collect();

        for batch in records.chunks(UPSERT_BATCH) {
            let body = serde_json::json!({
                "vectors": batch,
                "namespace": namespace,
            });

            let resp = self
                .client
                .post(format!("{}/vectors/upsert", host))
                .header("Api-Key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| IndexError::Service(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(IndexError::Service(format!(
                    "upsert failed with {}: {}",
                    status, body
                )));
            }
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let status = self.describe().await?.ok_or_else(|| {
            IndexError::Unavailable(format!("index '{}' does not exist", self.name))
        })?;
        if status.host.is_empty() {
            return Err(IndexError::Unavailable(format!(
                "index '{}' has no data-plane host yet",
                self.name
            )));
        }

        let body = serde_json::json!({
            "namespace": namespace,
            "vector": vector,
            "topK": top_k,
            "includeValues": false,
            "includeMetadata": true,
        });

        let resp = self
            .client
            .post(format!("{}/query", data_plane_url(&status.host)))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Service(format!(
                "query failed with {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        parse_query_matches(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matches_parsed_with_metadata() {
        let json = serde_json::json!({
            "matches": [
                { "id": "abc", "score": 0.92, "metadata": { "text": "veteran housing assistance" } },
                { "id": "def", "score": 0.41, "metadata": { "text": "farm subsidies" } },
            ]
        });
        let matches = parse_query_matches(&json).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "abc");
        assert!((matches[0].score - 0.92).abs() < 1e-6);
        assert_eq!(matches[0].text, "veteran housing assistance");
    }

    #[test]
    fn missing_matches_is_an_error() {
        let json = serde_json::json!({ "results": [] });
        assert!(parse_query_matches(&json).is_err());
    }

    #[test]
    fn data_plane_url_gets_scheme() {
        assert_eq!(
            data_plane_url("index-abc.svc.pinecone.io"),
            "https://index-abc.svc.pinecone.io"
        );
        assert_eq!(
            data_plane_url("https://index-abc.svc.pinecone.io"),
            "https://index-abc.svc.pinecone.io"
        );
    }
}
