//! HTML fragment to plain text.
//!
//! Images are removed, the remaining text nodes are concatenated in
//! document order and runs of newlines collapse to one. Running the result
//! through again yields the same text, unless the decoded text itself reads
//! as markup: an article showing `&lt;b&gt;` becomes `<b>` after one pass
//! and loses the tag on the next.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static IMAGES: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

/// Convert an extracted body fragment to plain text.
pub fn normalize(fragment: &str) -> String {
    let mut html = Html::parse_fragment(fragment);

    let images: Vec<_> = html.select(&IMAGES).map(|img| img.id()).collect();
    for id in images {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }

    let text: String = html.root_element().text().collect();
    NEWLINE_RUNS.replace_all(&text, "\n").into_owned()
}
