//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian f32 BLOBs and ranked with
//! brute-force cosine similarity in Rust. Good for a few tens of thousands
//! of records, which a crawl capped at a handful of URLs never approaches.

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::config::IndexConfig;

use super::{
    blob_to_vec, cosine_similarity, record_id, vec_to_blob, IndexError, QueryMatch, VectorIndex,
};

/// Local persistent vector index over a SQLite database.
pub struct SqliteIndex {
    pool: SqlitePool,
    name: String,
    dimension: usize,
    metric: String,
}

impl SqliteIndex {
    pub async fn connect(config: &IndexConfig) -> Result<Self> {
        let db_path = config
            .path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("index.path required for sqlite provider"))?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            name: config.name.clone(),
            dimension: config.dimension,
            metric: config.metric.clone(),
        })
    }

    /// Confirm the named index exists and matches this handle's settings.
    async fn check_ready(&self) -> Result<(), IndexError> {
        let row = sqlx::query("SELECT dimension, metric FROM indexes WHERE name = ?")
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        match row {
            Some(row) => {
                let dimension: i64 = row.get("dimension");
                let metric: String = row.get("metric");
                if dimension as usize != self.dimension || metric != self.metric {
                    return Err(IndexError::Mismatch(format!(
                        "index '{}' exists with dimension {} / metric '{}', configured {} / '{}'",
                        self.name, dimension, metric, self.dimension, self.metric
                    )));
                }
                Ok(())
            }
            None => Err(IndexError::Unavailable(format!(
                "index '{}' does not exist; run ensure_index first",
                self.name
            ))),
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        if self.metric != "cosine" {
            return Err(IndexError::Mismatch(format!(
                "sqlite index supports only the cosine metric, got '{}'",
                self.metric
            )));
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS indexes (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Service(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT NOT NULL,
                index_name TEXT NOT NULL,
                namespace TEXT NOT NULL,
                embedding BLOB NOT NULL,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (index_name, namespace, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Service(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_namespace ON records(index_name, namespace)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Service(e.to_string()))?;

        let existing = sqlx::query("SELECT dimension, metric FROM indexes WHERE name = ?")
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        match existing {
            Some(row) => {
                let dimension: i64 = row.get("dimension");
                let metric: String = row.get("metric");
                if dimension as usize != self.dimension || metric != self.metric {
                    return Err(IndexError::Mismatch(format!(
                        "index '{}' exists with dimension {} / metric '{}', configured {} / '{}'",
                        self.name, dimension, metric, self.dimension, self.metric
                    )));
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO indexes (name, dimension, metric, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&self.name)
                .bind(self.dimension as i64)
                .bind(&self.metric)
                .bind(chrono::Utc::now().timestamp())
                .execute(&self.pool)
                .await
                .map_err(|e| IndexError::Service(e.to_string()))?;
            }
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

        self.check_ready().await?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        for (line, vector) in lines.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO records (id, index_name, namespace, embedding, text, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record_id(line))
            .bind(&self.name)
            .bind(namespace)
            .bind(vec_to_blob(vector))
            .bind(line)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexError::Service(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        self.check_ready().await?;

        let rows = sqlx::query(
            "SELECT id, embedding, text FROM records WHERE index_name = ? AND namespace = ?",
        )
        .bind(&self.name)
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::Service(e.to_string()))?;

        let mut matches: Vec<QueryMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                QueryMatch {
                    id: row.get("id"),
                    score: cosine_similarity(vector, &stored),
                    text: row.get("text"),
                }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_config(dir: &Path) -> IndexConfig {
        IndexConfig {
            provider: "sqlite".to_string(),
            name: "gov-benefits".to_string(),
            namespace: "ns1".to_string(),
            dimension: 3,
            metric: "cosine".to_string(),
            path: Some(dir.join("index.sqlite")),
            api_url: None,
            ready_max_attempts: 3,
            ready_interval_secs: 1,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn ensure_index_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let index = SqliteIndex::connect(&test_config(tmp.path())).await.unwrap();
        index.ensure_index().await.unwrap();
        index.ensure_index().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_before_ensure_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let index = SqliteIndex::connect(&test_config(tmp.path())).await.unwrap();
        let err = index
            .upsert(&["a".to_string()], &[vec![1.0, 0.0, 0.0]], "ns1")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
    }

    #[tokio::test]
    async fn dimension_change_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let index = SqliteIndex::connect(&config).await.unwrap();
        index.ensure_index().await.unwrap();

        let mut reconfigured = config.clone();
        reconfigured.dimension = 8;
        let other = SqliteIndex::connect(&reconfigured).await.unwrap();
        let err = other.ensure_index().await.unwrap_err();
        assert!(matches!(err, IndexError::Mismatch(_)));
    }

    #[tokio::test]
    async fn upsert_query_roundtrip_survives_reconnect() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        {
            let index = SqliteIndex::connect(&config).await.unwrap();
            index.ensure_index().await.unwrap();
            let lines = vec![
                "veteran housing assistance".to_string(),
                "student loan relief".to_string(),
            ];
            let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
            index.upsert(&lines, &vectors, "ns1").await.unwrap();
        }

        let index = SqliteIndex::connect(&config).await.unwrap();
        let matches = index.query("ns1", &[0.9, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(matches[0].text, "veteran housing assistance");
    }

    #[tokio::test]
    async fn reupsert_replaces_instead_of_appending() {
        let tmp = tempfile::tempdir().unwrap();
        let index = SqliteIndex::connect(&test_config(tmp.path())).await.unwrap();
        index.ensure_index().await.unwrap();

        let lines = vec!["veteran housing assistance".to_string()];
        let vectors = vec![vec![1.0, 0.0, 0.0]];
        index.upsert(&lines, &vectors, "ns1").await.unwrap();
        index.upsert(&lines, &vectors, "ns1").await.unwrap();

        let matches = index.query("ns1", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(matches.len(), 1);
    }
}
