//! Article body extraction.
//!
//! Each configured class name is tried in order. Every class that matches
//! contributes the inner HTML of its first matching element to the body, so
//! several selectors can build one article. When none match, the whole
//! `<body>` is kept and the record is marked as a non-strict capture.

use crate::models::ExtractedArticle;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Extract title and body from a fetched page.
///
/// # Arguments
///
/// * `html` - The page HTML
/// * `class_names` - Body class names (no leading dot), in priority order
///
/// # Returns
///
/// The title (empty when the page has none), the accumulated body and
/// whether any configured class matched.
pub fn extract_article(html: &str, class_names: &[String]) -> ExtractedArticle {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    let mut body = String::new();
    let mut strict_match = false;
    for class in class_names {
        let selector = match Selector::parse(&format!(".{class}")) {
            Ok(s) => s,
            Err(e) => {
                warn!(class = %class, error = ?e, "Skipping unparseable body selector");
                continue;
            }
        };
        if let Some(element) = document.select(&selector).next() {
            body.push_str(&element.inner_html());
            strict_match = true;
        }
    }

    if !strict_match {
        body = document
            .select(&BODY)
            .next()
            .map(|b| b.inner_html())
            .unwrap_or_default();
        debug!(bytes = body.len(), "No body selector matched; using whole page body");
    }

    ExtractedArticle {
        title,
        body,
        strict_match,
    }
}
