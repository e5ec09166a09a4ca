use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    /// Seed URLs crawled by `bscout index` when none are given on the CLI.
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Soft cap on distinct URLs visited per run.
    #[serde(default = "default_max_visited")]
    pub max_visited: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            max_depth: default_max_depth(),
            max_visited: default_max_visited(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_depth() -> usize {
    2
}
fn default_max_visited() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Ollama base URL; unused by other providers.
    #[serde(default)]
    pub url: Option<String>,
    /// Hard per-call batch ceiling of the embedding service.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            max_documents: default_max_documents(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_max_documents() -> usize {
    96
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    /// SQLite database path; unused by other providers.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Control-plane URL for the managed index service.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_ready_max_attempts")]
    pub ready_max_attempts: u32,
    #[serde(default = "default_ready_interval_secs")]
    pub ready_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_provider() -> String {
    "sqlite".to_string()
}
fn default_index_name() -> String {
    "gov-benefits".to_string()
}
fn default_namespace() -> String {
    "ns1".to_string()
}
fn default_dimension() -> usize {
    1024
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_ready_max_attempts() -> u32 {
    30
}
fn default_ready_interval_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate crawl
    if config.crawl.max_visited == 0 {
        anyhow::bail!("crawl.max_visited must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.max_documents == 0 {
        anyhow::bail!("embedding.max_documents must be >= 1");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate index
    match config.index.provider.as_str() {
        "sqlite" | "pinecone" | "memory" => {}
        other => anyhow::bail!(
            "Unknown index provider: '{}'. Must be sqlite, pinecone, or memory.",
            other
        ),
    }
    if config.index.provider == "sqlite" && config.index.path.is_none() {
        anyhow::bail!("index.path must be set when provider is 'sqlite'");
    }
    match config.index.metric.as_str() {
        "cosine" | "dotproduct" | "euclidean" => {}
        other => anyhow::bail!(
            "Unknown index metric: '{}'. Must be cosine, dotproduct, or euclidean.",
            other
        ),
    }
    if config.index.dimension == 0 {
        anyhow::bail!("index.dimension must be > 0");
    }
    if let Some(dims) = config.embedding.dims {
        if dims != config.index.dimension {
            anyhow::bail!(
                "embedding.dims ({}) must match index.dimension ({})",
                dims,
                config.index.dimension
            );
        }
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("bscout.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[index]
path = "data/index.sqlite"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.crawl.max_depth, 2);
        assert_eq!(config.crawl.max_visited, 5);
        assert_eq!(config.embedding.max_documents, 96);
        assert_eq!(config.index.name, "gov-benefits");
        assert_eq!(config.index.namespace, "ns1");
        assert_eq!(config.index.metric, "cosine");
        assert_eq!(config.retrieval.top_k, 3);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn dims_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[embedding]
provider = "ollama"
model = "multilingual-e5-large"
dims = 1024

[index]
path = "data/index.sqlite"
dimension = 768
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("must match index.dimension"));
    }

    #[test]
    fn unknown_index_provider_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[index]
provider = "redis"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
