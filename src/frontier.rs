//! Bounded, domain-scoped link discovery.
//!
//! The [`Frontier`] owns the process-wide visited set. A site is explored
//! from its seed URL at depth 0; every page fetched contributes its article
//! links, and its same-domain internal links are explored at `depth + 1`
//! while `depth <= max_depth`. A URL is fetched at most once per process,
//! however many pages link to it, which also breaks cycles in the link graph.
//!
//! Traversal uses an explicit stack rather than recursion. Children are
//! pushed in reverse so pages are visited in the same pre-order a recursive
//! walk would produce, and article links accumulate in discovery order.

use crate::config::{DiscoveryMode, SiteConfig};
use crate::error::FetchError;
use crate::fetcher::{Fetched, Fetcher};
use crate::links::extract_links;
use crate::utils::normalize_url;
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Crawl state shared by every site in a run.
#[derive(Debug, Default)]
pub struct Frontier {
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `url` has already been fetched (or attempted) in this process.
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&normalize_url(url))
    }

    /// Record `url` as fetched. Returns `false` if it already was.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(normalize_url(url))
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Discover the article URLs of one site.
    ///
    /// # Returns
    ///
    /// Unique article URLs in discovery order.
    ///
    /// # Errors
    ///
    /// Only a sitemap site whose root sitemap cannot be fetched or parsed
    /// fails; in crawl modes an unreachable page is logged and skipped.
    #[instrument(level = "info", skip_all, fields(site = %site.url, mode = ?site.mode))]
    pub async fn discover<F: Fetcher>(
        &mut self,
        fetcher: &F,
        site: &SiteConfig,
    ) -> Result<Vec<String>, FetchError> {
        let found = match site.mode {
            DiscoveryMode::Sitemap => self.walk_sitemaps(fetcher, site).await?,
            DiscoveryMode::Static | DiscoveryMode::Rendered => self.crawl(fetcher, site).await,
        };
        let articles: Vec<String> = found.into_iter().unique().collect();
        info!(count = articles.len(), "Discovered article links");
        debug!(urls = ?articles, "Article links");
        Ok(articles)
    }

    async fn crawl<F: Fetcher>(&mut self, fetcher: &F, site: &SiteConfig) -> Vec<String> {
        let mut articles = Vec::new();
        let mut stack = vec![(site.url.clone(), 0usize)];

        while let Some((url, depth)) = stack.pop() {
            if depth > site.max_depth || !self.mark_visited(&url) {
                continue;
            }
            let Ok(base) = Url::parse(&url) else {
                warn!(%url, "Skipping unparseable URL");
                continue;
            };

            let html = match fetcher.fetch(&url, site.mode).await {
                Ok(Fetched::Page(html)) => html,
                Ok(Fetched::Sitemap { .. }) => {
                    warn!(%url, "Expected an HTML page, got a sitemap; skipping");
                    continue;
                }
                Err(e) => {
                    warn!(%url, depth, error = %e, "Failed to fetch page; skipping");
                    continue;
                }
            };

            let links = extract_links(&html, &base, &site.link_patterns);
            debug!(
                %url,
                depth,
                articles = links.article_links.len(),
                internal = links.internal_links.len(),
                "Extracted links"
            );
            articles.extend(links.article_links);

            if depth < site.max_depth {
                for next in links.internal_links.into_iter().rev() {
                    if !self.is_visited(&next) {
                        stack.push((next, depth + 1));
                    }
                }
            }
        }

        articles
    }

    async fn walk_sitemaps<F: Fetcher>(
        &mut self,
        fetcher: &F,
        site: &SiteConfig,
    ) -> Result<Vec<String>, FetchError> {
        let mut articles = Vec::new();
        let mut stack = vec![(site.url.clone(), 0usize)];

        while let Some((url, depth)) = stack.pop() {
            if depth > site.max_depth || !self.mark_visited(&url) {
                continue;
            }

            let (pages, sitemaps) = match fetcher.fetch(&url, DiscoveryMode::Sitemap).await {
                Ok(Fetched::Sitemap { pages, sitemaps }) => (pages, sitemaps),
                Ok(Fetched::Page(_)) => (Vec::new(), Vec::new()),
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    warn!(%url, depth, error = %e, "Failed to read child sitemap; skipping");
                    continue;
                }
            };

            articles.extend(pages.into_iter().filter(|p| site.is_article_link(p)));
            if depth < site.max_depth {
                for child in sitemaps.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }

        Ok(articles)
    }
}
