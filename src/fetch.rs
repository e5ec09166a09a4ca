//! HTTP fetching with per-URL failure isolation.
//!
//! [`Fetch`] is the seam between the crawl and the network: the crawler only
//! sees [`Fetched`] content or a [`FetchError`], never a reqwest type, so
//! tests drive the traversal with canned fakes. [`HttpFetcher`] is the real
//! implementation.
//!
//! PDF targets are downloaded into a [`tempfile::NamedTempFile`] scoped to
//! the returned value; the file is removed when the value drops, on success
//! and failure alike.

use std::error::Error;
use std::fmt;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::models::PageKind;

/// Errors surfaced while fetching a single URL.
///
/// A `FetchError` never aborts a crawl; the scheduler maps it to an empty
/// contribution for that URL.
#[derive(Debug)]
pub enum FetchError {
    /// Transport failure, including timeouts.
    Http(reqwest::Error),
    /// The server answered with a non-2xx status.
    Status { url: String, status: u16 },
    /// Writing the scoped temporary file failed.
    Io(std::io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(e) => write!(f, "http error: {}", e),
            FetchError::Status { url, status } => write!(f, "HTTP {} for {}", status, url),
            FetchError::Io(e) => write!(f, "temp file error: {}", e),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchError::Http(e) => Some(e),
            FetchError::Io(e) => Some(e),
            FetchError::Status { .. } => None,
        }
    }
}

/// Content retrieved for a single URL.
pub enum Fetched {
    /// An HTML document body.
    Html(String),
    /// A PDF downloaded to a scoped temporary file, deleted on drop.
    Pdf(NamedTempFile),
}

/// Retrieves raw content for a URL.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// [`Fetch`] implementation over a shared [`reqwest::Client`].
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        // Browser-like User-Agent; several .gov sites refuse default clients.
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        match PageKind::from_url(url) {
            PageKind::Html => {
                let body = self
                    .get_checked(url)
                    .await?
                    .text()
                    .await
                    .map_err(FetchError::Http)?;
                Ok(Fetched::Html(body))
            }
            PageKind::Pdf => {
                let bytes = self
                    .get_checked(url)
                    .await?
                    .bytes()
                    .await
                    .map_err(FetchError::Http)?;

                let mut file = NamedTempFile::new().map_err(FetchError::Io)?;
                file.write_all(&bytes).map_err(FetchError::Io)?;
                file.flush().map_err(FetchError::Io)?;
                Ok(Fetched::Pdf(file))
            }
        }
    }
}
