//! Same-domain link discovery.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Collect the same-domain links of an HTML page.
///
/// Anchor `href` values are resolved against `base`; fragment-only (`#...`)
/// and bare-root (`/`) hrefs are discarded, as is anything whose host does
/// not match `base`'s host exactly. Results are deduplicated in document
/// order.
pub fn discover_links(base: &Url, html: &str) -> Vec<Url> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for href in document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
    {
        if href.starts_with('#') || href == "/" {
            continue;
        }
        let resolved = match base.join(href) {
            Ok(url) => url,
            Err(_) => continue,
        };
        if resolved.host_str().is_none() || resolved.host_str() != base.host_str() {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }

    links
}
