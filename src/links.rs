//! Link discovery on a fetched HTML page.
//!
//! Every `<a href>` is resolved against the page URL and sorted into one of
//! two buckets: article links (the URL contains a configured pattern) and
//! internal links (same host as the page, candidates for further crawling).
//! Everything else is dropped; cross-domain links are never followed.
//!
//! Links come out in document order. Duplicates are kept here; the
//! frontier and the checkpoint store deduplicate.

use crate::utils::{resolve_link, same_domain};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Links found on one page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub article_links: Vec<String>,
    pub internal_links: Vec<String>,
}

/// Classify every anchor on `html`.
///
/// # Arguments
///
/// * `html` - Raw or rendered page HTML
/// * `base` - URL the page was fetched from, used to resolve relative hrefs
/// * `patterns` - Substrings that mark an absolute URL as an article
pub fn extract_links(html: &str, base: &Url, patterns: &[String]) -> PageLinks {
    let document = Html::parse_document(html);
    let mut links = PageLinks::default();

    for element in document.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_link(base, href) else {
            continue;
        };
        let absolute = resolved.to_string();
        if patterns.iter().any(|p| !p.is_empty() && absolute.contains(p.as_str())) {
            links.article_links.push(absolute);
        } else if same_domain(&resolved, base) {
            links.internal_links.push(absolute);
        }
    }

    links
}
