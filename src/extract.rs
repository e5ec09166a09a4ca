//! Text extraction for fetched documents.
//!
//! Two strategies, chosen by [`crate::models::PageKind`]: HTML is parsed with
//! `scraper` and converted to readable text with `htmd`; PDFs go through
//! `pdf-extract` from the scoped temporary file the fetcher produced.
//!
//! Extraction errors are isolated per URL: the crawler logs them and treats
//! the document as empty. No panic, no propagation past the URL boundary.

use std::error::Error;
use std::fmt;
use std::path::Path;

use scraper::{Html, Selector};

/// Extraction failure for a single document.
#[derive(Debug)]
pub enum ExtractError {
    Html(String),
    Pdf(String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Html(e) => write!(f, "HTML extraction failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl Error for ExtractError {}

/// Containers likely to hold the readable content of a page.
const MAIN_SELECTORS: &[&str] = &["main", "article", "[role='main']", "#content", "#main"];

/// Elements that carry no readable content.
const BOILERPLATE_SELECTORS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "iframe",
];

/// Extract readable text blocks from an HTML document.
///
/// Prefers a main-content container when one exists, otherwise falls back to
/// the body with boilerplate elements stripped. Returns a single block; the
/// normalizer does the line-level splitting.
pub fn extract_html(html: &str) -> Result<Vec<String>, ExtractError> {
    let document = Html::parse_document(html);
    let fragment = content_fragment(&document);

    let text = htmd::convert(&fragment).map_err(|e| ExtractError::Html(e.to_string()))?;

    if text.trim().is_empty() {
        Ok(Vec::new())
    } else {
        Ok(vec![text])
    }
}

fn content_fragment(document: &Html) -> String {
    for selector_str in MAIN_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(main) = document.select(&selector).next() {
                return main.html();
            }
        }
    }

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            return remove_boilerplate(&body.html());
        }
    }

    document.html()
}

fn remove_boilerplate(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut result = html.to_string();
    for selector_str in BOILERPLATE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                result = result.replace(&element.html(), "");
            }
        }
    }
    result
}

/// Extract text blocks from a PDF file, one block per page.
pub fn extract_pdf(path: &Path) -> Result<Vec<String>, ExtractError> {
    let text = pdf_extract::extract_text(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    // pdf-extract separates pages with form feeds.
    Ok(text
        .split('\u{c}')
        .filter(|page| !page.trim().is_empty())
        .map(|page| page.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_body_text_survives() {
        let html = r#"<html><body><h1>Housing grants</h1><p>Apply before June.</p></body></html>"#;
        let blocks = extract_html(html).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("Housing grants"));
        assert!(blocks[0].contains("Apply before June."));
    }

    #[test]
    fn html_prefers_main_content() {
        let html = r#"<html><body>
            <nav>Home | About</nav>
            <main><p>Veteran benefits overview.</p></main>
            <footer>Contact us</footer>
        </body></html>"#;
        let blocks = extract_html(html).unwrap();
        assert!(blocks[0].contains("Veteran benefits overview."));
        assert!(!blocks[0].contains("Contact us"));
    }

    #[test]
    fn html_strips_boilerplate_without_main() {
        let html = r#"<html><body>
            <header>Site header</header>
            <p>Childcare subsidy details.</p>
            <script>var x = 1;</script>
        </body></html>"#;
        let blocks = extract_html(html).unwrap();
        assert!(blocks[0].contains("Childcare subsidy details."));
        assert!(!blocks[0].contains("Site header"));
        assert!(!blocks[0].contains("var x"));
    }

    #[test]
    fn empty_document_yields_no_blocks() {
        let blocks = extract_html("<html><body></body></html>").unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a pdf").unwrap();
        let err = extract_pdf(tmp.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
