//! XML sitemap parsing (`urlset/url/loc` and `sitemapindex/sitemap/loc`).

use crate::error::FetchError;
use quick_xml::de::from_str;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct SitemapXml {
    #[serde(rename = "url", default)]
    urls: Vec<LocEntry>,
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<LocEntry>,
}

#[derive(Debug, Deserialize)]
struct LocEntry {
    loc: String,
}

/// Locations declared by one sitemap document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Page URLs from a `urlset`.
    pub pages: Vec<String>,
    /// Child sitemap URLs from a `sitemapindex`.
    pub sitemaps: Vec<String>,
}

/// Parse a sitemap body fetched from `source_url`.
///
/// Relative locations are resolved against `source_url`. Declaration order
/// is preserved.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the document is not well-formed sitemap XML.
pub fn parse_sitemap(source_url: &str, xml: &str) -> Result<SitemapDocument, FetchError> {
    let parsed: SitemapXml = from_str(xml).map_err(|e| FetchError::Parse {
        url: source_url.to_string(),
        message: e.to_string(),
    })?;

    let base = Url::parse(source_url).ok();
    let resolve = |entry: LocEntry| -> String {
        let loc = entry.loc.trim();
        match (Url::parse(loc), &base) {
            (Ok(absolute), _) => absolute.to_string(),
            (Err(_), Some(base)) => base
                .join(loc)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| loc.to_string()),
            (Err(_), None) => loc.to_string(),
        }
    };

    Ok(SitemapDocument {
        pages: parsed.urls.into_iter().map(resolve).collect(),
        sitemaps: parsed.sitemaps.into_iter().map(resolve).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://site/help/a</loc><lastmod>2024-01-01</lastmod></url>
              <url><loc> https://site/help/b?x=1&amp;y=2 </loc></url>
              <url><loc>/about</loc></url>
            </urlset>"#;

        let doc = parse_sitemap("https://site/sitemap.xml", xml).unwrap();
        assert_eq!(
            doc.pages,
            vec![
                "https://site/help/a".to_string(),
                "https://site/help/b?x=1&y=2".to_string(),
                "https://site/about".to_string(),
            ]
        );
        assert!(doc.sitemaps.is_empty());
    }

    #[test]
    fn test_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap><loc>https://site/sitemap-help.xml</loc></sitemap>
              <sitemap><loc>https://site/sitemap-blog.xml</loc></sitemap>
            </sitemapindex>"#;

        let doc = parse_sitemap("https://site/sitemap.xml", xml).unwrap();
        assert!(doc.pages.is_empty());
        assert_eq!(
            doc.sitemaps,
            vec![
                "https://site/sitemap-help.xml".to_string(),
                "https://site/sitemap-blog.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_sitemap("https://site/sitemap.xml", "<urlset><url><loc>x</url>").unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }
}
