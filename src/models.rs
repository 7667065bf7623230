//! Data models for crawled help-center articles.
//!
//! - [`ArticleRecord`]: one article as persisted in the checkpoint and output files
//! - [`ExtractedArticle`]: the part of a record derived from the page content alone
//!
//! Field names are part of the on-disk format: `id`, `html_url`, `title`,
//! `body`, `strict_match`.

use serde::{Deserialize, Serialize};
use url::Url;

/// A single crawled article.
///
/// `html_url` is the natural key: no two records in a working set share it.
/// The `body` holds an HTML fragment until the export pass replaces it with
/// plain text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// `<domain>#<n>`. Provisional while crawling, re-sequenced on export.
    pub id: String,
    /// The URL the article was fetched from.
    pub html_url: String,
    /// Text of the page's `<title>` element.
    pub title: String,
    /// Extracted body.
    pub body: String,
    /// Whether the body came from a configured selector rather than the whole page.
    #[serde(alias = "strictMatch")]
    pub strict_match: bool,
}

impl ArticleRecord {
    /// Build a record from extracted content.
    pub fn new(id: String, html_url: String, extracted: ExtractedArticle) -> Self {
        Self {
            id,
            html_url,
            title: extracted.title,
            body: extracted.body,
            strict_match: extracted.strict_match,
        }
    }

    /// Host of `html_url`, or an empty string when it does not parse.
    pub fn domain(&self) -> String {
        Url::parse(&self.html_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Format a per-domain record ID.
pub fn record_id(domain: &str, sequence: usize) -> String {
    format!("{domain}#{sequence}")
}

/// Title, body and match quality extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub body: String,
    pub strict_match: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization_field_names() {
        let record = ArticleRecord {
            id: record_id("kb.example.com", 1),
            html_url: "https://kb.example.com/help/a".to_string(),
            title: "A".to_string(),
            body: "<p>Hi</p>".to_string(),
            strict_match: true,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "kb.example.com#1");
        assert_eq!(json["html_url"], "https://kb.example.com/help/a");
        assert_eq!(json["strict_match"], true);
        assert!(json.get("strictMatch").is_none());
    }

    #[test]
    fn test_legacy_strict_match_field_accepted() {
        let json = r#"{
            "id": "kb.example.com#4",
            "html_url": "https://kb.example.com/help/d",
            "title": "D",
            "body": "",
            "strictMatch": false
        }"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert!(!record.strict_match);
        assert_eq!(record.domain(), "kb.example.com");
    }

    #[test]
    fn test_domain_of_unparseable_url() {
        let record = ArticleRecord {
            id: String::new(),
            html_url: "not a url".to_string(),
            title: String::new(),
            body: String::new(),
            strict_match: false,
        };
        assert_eq!(record.domain(), "");
    }
}
