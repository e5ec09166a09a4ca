//! Bounded, domain-scoped crawl traversal.
//!
//! The traversal is depth-first and strictly sequential: one request is in
//! flight at a time, and every piece of state is owned by the
//! [`CrawlOutcome`] threaded through the run; there is no process-wide
//! visited set.
//!
//! Guards, checked in order every time a URL is taken off the stack:
//! 1. its depth exceeds `max_depth`;
//! 2. it was already visited this run;
//! 3. the visited set has outgrown `max_visited`.
//!
//! The visited cap is a soft check, inspected rather than reserved. Under
//! this sequential traversal the set can hold at most `max_visited + 1`
//! URLs; the bound is pinned by a test below.
//!
//! Per-URL fetch and extraction failures are logged and contribute nothing;
//! a single bad page never aborts the run.

use std::collections::HashSet;

use tracing::{info, warn};
use url::Url;

use crate::extract;
use crate::fetch::{Fetch, Fetched};
use crate::links::discover_links;
use crate::normalize::normalize;

/// Accumulated state of one crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Normalized text lines in first-seen order, each kept once.
    pub lines: Vec<String>,
    /// Every URL fetched during the run.
    pub visited: HashSet<String>,
    seen_lines: HashSet<String>,
}

impl CrawlOutcome {
    fn push_line(&mut self, line: String) {
        if self.seen_lines.insert(line.clone()) {
            self.lines.push(line);
        }
    }
}

/// Depth- and quantity-bounded crawl scheduler.
pub struct Crawler<'a> {
    fetcher: &'a dyn Fetch,
    max_depth: usize,
    max_visited: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(fetcher: &'a dyn Fetch, max_depth: usize, max_visited: usize) -> Self {
        Self {
            fetcher,
            max_depth,
            max_visited,
        }
    }

    /// Run one crawl from `start_url` with fresh state.
    pub async fn crawl(&self, start_url: &str) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        self.crawl_into(start_url, &mut outcome).await;
        outcome
    }

    /// Continue an existing run from another seed.
    ///
    /// The visited set, the visited cap, and line deduplication are shared
    /// across every seed fed into the same `outcome`.
    pub async fn crawl_into(&self, start_url: &str, outcome: &mut CrawlOutcome) {
        let mut stack: Vec<(String, usize)> = vec![(start_url.to_string(), 0)];

        while let Some((url, depth)) = stack.pop() {
            if depth > self.max_depth {
                continue;
            }
            if outcome.visited.contains(&url) {
                continue;
            }
            if outcome.visited.len() > self.max_visited {
                continue;
            }

            info!(url = %url, depth, "crawling");
            outcome.visited.insert(url.clone());

            let fetched = match self.fetcher.fetch(&url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(url = %url, error = %e, "fetch failed, skipping");
                    continue;
                }
            };

            match fetched {
                Fetched::Html(body) => {
                    match extract::extract_html(&body) {
                        Ok(blocks) => {
                            for block in blocks {
                                for line in normalize(&block) {
                                    outcome.push_line(line);
                                }
                            }
                        }
                        Err(e) => {
                            warn!(url = %url, error = %e, "extraction failed, skipping content");
                        }
                    }

                    // The same body feeds link discovery; a URL is fetched
                    // at most once per run.
                    if let Ok(base) = Url::parse(&url) {
                        let children = discover_links(&base, &body);
                        for child in children.into_iter().rev() {
                            let child = child.to_string();
                            if !outcome.visited.contains(&child) {
                                stack.push((child, depth + 1));
                            }
                        }
                    }
                }
                Fetched::Pdf(file) => {
                    match extract::extract_pdf(file.path()) {
                        Ok(blocks) => {
                            for block in blocks {
                                for line in normalize(&block) {
                                    outcome.push_line(line);
                                }
                            }
                        }
                        Err(e) => {
                            warn!(url = %url, error = %e, "extraction failed, skipping content");
                        }
                    }
                    // Temp file dropped here; the download is gone either way.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned HTML bodies and counts fetches per URL.
    struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn fetch_count(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
            match self.pages.get(url) {
                Some(body) => Ok(Fetched::Html(body.clone())),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    const PAGE1: &str = "https://site.gov/page1.html";
    const PAGE2: &str = "https://site.gov/page2.html";

    fn two_page_site() -> FakeFetcher {
        FakeFetcher::new(&[
            (
                PAGE1,
                r#"<html><body><p>Housing help for veterans.</p>
                   <a href="/page2.html">More</a></body></html>"#,
            ),
            (
                PAGE2,
                r#"<html><body><p>Childcare subsidies.</p>
                   <a href="/page1.html">Back</a></body></html>"#,
            ),
        ])
    }

    #[tokio::test]
    async fn two_page_fixture_collects_both() {
        let fetcher = two_page_site();
        let crawler = Crawler::new(&fetcher, 2, 5);
        let outcome = crawler.crawl(PAGE1).await;

        assert_eq!(
            outcome.visited,
            [PAGE1, PAGE2].iter().map(|s| s.to_string()).collect()
        );
        let joined = outcome.lines.join("\n");
        assert!(joined.contains("Housing help for veterans."));
        assert!(joined.contains("Childcare subsidies."));
    }

    #[tokio::test]
    async fn depth_zero_stays_on_start_url() {
        let fetcher = two_page_site();
        let crawler = Crawler::new(&fetcher, 0, 5);
        let outcome = crawler.crawl(PAGE1).await;

        assert_eq!(
            outcome.visited,
            [PAGE1].iter().map(|s| s.to_string()).collect()
        );
        let joined = outcome.lines.join("\n");
        assert!(joined.contains("Housing help for veterans."));
        assert!(!joined.contains("Childcare subsidies."));
    }

    #[tokio::test]
    async fn cycles_never_refetch() {
        let fetcher = two_page_site();
        let crawler = Crawler::new(&fetcher, 4, 10);
        crawler.crawl(PAGE1).await;

        assert_eq!(fetcher.fetch_count(PAGE1), 1);
        assert_eq!(fetcher.fetch_count(PAGE2), 1);
    }

    #[tokio::test]
    async fn visited_cap_overshoots_by_at_most_one() {
        // A star of eight leaves off the root; cap of 2 admits the root,
        // two leaves, and the single soft-check overshoot.
        let root = "https://site.gov/";
        let leaves: Vec<String> = (0..8)
            .map(|i| format!("https://site.gov/leaf{}.html", i))
            .collect();
        let anchors: String = (0..8)
            .map(|i| format!(r#"<a href="/leaf{}.html">l</a>"#, i))
            .collect();
        let root_body = format!("<html><body><p>hub</p>{}</body></html>", anchors);

        let mut pages: Vec<(&str, &str)> = vec![(root, root_body.as_str())];
        for leaf in &leaves {
            pages.push((leaf.as_str(), "<html><body><p>leaf text</p></body></html>"));
        }
        let fetcher = FakeFetcher::new(&pages);

        let max_visited = 2;
        let crawler = Crawler::new(&fetcher, 3, max_visited);
        let outcome = crawler.crawl(root).await;

        assert_eq!(outcome.visited.len(), max_visited + 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated() {
        let fetcher = FakeFetcher::new(&[(
            PAGE1,
            r#"<html><body><p>Still standing.</p>
               <a href="/missing.html">broken</a></body></html>"#,
        )]);
        let crawler = Crawler::new(&fetcher, 2, 5);
        let outcome = crawler.crawl(PAGE1).await;

        // The broken link is marked visited but contributes nothing.
        assert!(outcome
            .visited
            .contains("https://site.gov/missing.html"));
        assert!(outcome.lines.join("\n").contains("Still standing."));
    }

    #[tokio::test]
    async fn duplicate_lines_kept_once() {
        let fetcher = FakeFetcher::new(&[
            (
                PAGE1,
                r#"<html><body><p>Shared footer line.</p>
                   <a href="/page2.html">next</a></body></html>"#,
            ),
            (
                PAGE2,
                r#"<html><body><p>Shared footer line.</p></body></html>"#,
            ),
        ]);
        let crawler = Crawler::new(&fetcher, 2, 5);
        let outcome = crawler.crawl(PAGE1).await;

        let shared: Vec<_> = outcome
            .lines
            .iter()
            .filter(|l| l.contains("Shared footer line."))
            .collect();
        assert_eq!(shared.len(), 1);
    }
}
