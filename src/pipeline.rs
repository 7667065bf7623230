//! The crawl pipeline: discover, fetch, extract, commit.
//!
//! For each configured site the [`Frontier`] produces article URLs; every
//! URL without a committed record is fetched once, extracted and committed
//! to the [`CheckpointStore`] before the next one starts. Fetch failures are
//! logged and skipped. Checkpoint failures stop the run.

use crate::checkpoint::{CheckpointStore, FinalizeSummary};
use crate::config::SiteConfig;
use crate::error::CheckpointError;
use crate::extract::extract_article;
use crate::fetcher::{Fetched, Fetcher};
use crate::frontier::Frontier;
use crate::utils::truncate_for_log;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

/// Outcome counts for one site.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SiteStats {
    pub discovered: usize,
    pub already_known: usize,
    pub committed: usize,
    pub failed: usize,
}

impl SiteStats {
    fn add(&mut self, other: SiteStats) {
        self.discovered += other.discovered;
        self.already_known += other.already_known;
        self.committed += other.committed;
        self.failed += other.failed;
    }
}

/// Single owner of the crawl state for one process run.
#[derive(Debug)]
pub struct Pipeline<F> {
    fetcher: F,
    frontier: Frontier,
    store: CheckpointStore,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(fetcher: F, store: CheckpointStore) -> Self {
        Self {
            fetcher,
            frontier: Frontier::new(),
            store,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    #[cfg(test)]
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Crawl every site in order.
    ///
    /// # Errors
    ///
    /// Only checkpoint write failures abort; everything else is logged.
    pub async fn run(&mut self, sites: &[SiteConfig]) -> Result<SiteStats, CheckpointError> {
        let mut totals = SiteStats::default();
        for site in sites {
            totals.add(self.crawl_site(site).await?);
        }
        info!(
            discovered = totals.discovered,
            already_known = totals.already_known,
            committed = totals.committed,
            failed = totals.failed,
            visited = self.frontier.visited_count(),
            "All sites crawled"
        );
        Ok(totals)
    }

    /// Discover and commit the articles of one site.
    #[instrument(level = "info", skip_all, fields(site = %site.url))]
    pub async fn crawl_site(&mut self, site: &SiteConfig) -> Result<SiteStats, CheckpointError> {
        let mut stats = SiteStats::default();

        let links = match self.frontier.discover(&self.fetcher, site).await {
            Ok(links) => links,
            Err(e) => {
                error!(error = %e, "Link discovery failed; skipping site");
                return Ok(stats);
            }
        };
        stats.discovered = links.len();

        for url in links {
            if self.store.contains(&url) {
                stats.already_known += 1;
                continue;
            }
            if !self.frontier.mark_visited(&url) {
                debug!(%url, "Already attempted in this run");
                continue;
            }

            let html = match self.fetcher.fetch(&url, site.mode.article_mode()).await {
                Ok(Fetched::Page(html)) => html,
                Ok(Fetched::Sitemap { .. }) => {
                    warn!(%url, "Article URL returned a sitemap; skipping");
                    stats.failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%url, error = %e, "Failed to fetch article; skipping");
                    stats.failed += 1;
                    continue;
                }
            };

            let extracted = extract_article(&html, &site.body_selectors);
            let record = self.store.new_record(&url, extracted);
            info!(
                %url,
                title = %truncate_for_log(&record.title, 120),
                strict_match = record.strict_match,
                "Fetched article"
            );
            if self.store.append_and_persist(record).await? {
                stats.committed += 1;
            }
        }

        info!(
            discovered = stats.discovered,
            already_known = stats.already_known,
            committed = stats.committed,
            failed = stats.failed,
            "Site complete"
        );
        Ok(stats)
    }

    /// Write the final output and the processed corpus.
    pub async fn finalize(
        &self,
        output_path: &Path,
        processed_path: &Path,
    ) -> Result<FinalizeSummary, CheckpointError> {
        self.store.finalize(output_path, processed_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryMode;
    use crate::frontier::tests::{ScriptedFetcher, site};
    use crate::outputs::json::read_records;

    const HOME: &str = "https://kb.example.com/help";

    fn home_page() -> String {
        r#"<a href="/help/a">A</a><a href="/help/b">B</a><a href="/help/c">C</a>"#.to_string()
    }

    fn article(title: &str, body: &str) -> String {
        format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
    }

    fn fetcher() -> ScriptedFetcher {
        ScriptedFetcher::default()
            .page(HOME, &home_page())
            .page(
                "https://kb.example.com/help/a",
                &article("A", r#"<div class="article-body"><p>Hi</p><img src=x></div>"#),
            )
            .page(
                "https://kb.example.com/help/b",
                &article("B", r#"<div class="article-body"><p>Bee</p></div>"#),
            )
            .page("https://kb.example.com/help/c", &article("C", "<p>No body class</p>"))
    }

    #[tokio::test]
    async fn test_full_run_and_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("articles_temp.json");
        let store = CheckpointStore::load(&checkpoint).await.unwrap();
        let mut pipeline = Pipeline::new(fetcher(), store);

        let stats = pipeline
            .run(&[site(HOME, DiscoveryMode::Static, 0)])
            .await
            .unwrap();
        assert_eq!(stats.discovered, 3);
        assert_eq!(stats.committed, 3);

        let records = pipeline.store().records();
        assert_eq!(records[0].title, "A");
        assert!(records[0].strict_match);
        assert!(!records[2].strict_match);
        assert_eq!(records[2].body, "<p>No body class</p>");

        let output = dir.path().join("articles.json");
        let processed = dir.path().join("articles_processed.json");
        let summary = pipeline.finalize(&output, &processed).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.exported, 2);

        let exported = read_records(&processed).await.unwrap().unwrap();
        assert_eq!(exported[0].body, "Hi");
        assert_eq!(exported[0].id, "kb.example.com#1");
        assert_eq!(exported[1].body, "Bee");
        assert_eq!(exported[1].id, "kb.example.com#2");
    }

    #[tokio::test]
    async fn test_resume_fetches_only_new_urls() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("articles_temp.json");

        // First run is interrupted after A and B: simulate with a site that only links them.
        let partial = ScriptedFetcher::default()
            .page(HOME, r#"<a href="/help/a">A</a><a href="/help/b">B</a>"#)
            .page("https://kb.example.com/help/a", &article("A", "<p>a</p>"))
            .page("https://kb.example.com/help/b", &article("B", "<p>b</p>"));
        let store = CheckpointStore::load(&checkpoint).await.unwrap();
        let mut first = Pipeline::new(partial, store);
        first.run(&[site(HOME, DiscoveryMode::Static, 0)]).await.unwrap();

        // Fresh process: discovered links are {A, B, C}.
        let store = CheckpointStore::load(&checkpoint).await.unwrap();
        assert_eq!(store.len(), 2);
        let mut second = Pipeline::new(fetcher(), store);
        let stats = second
            .run(&[site(HOME, DiscoveryMode::Static, 0)])
            .await
            .unwrap();

        assert_eq!(stats.already_known, 2);
        assert_eq!(stats.committed, 1);
        assert_eq!(
            second.fetcher().requested(),
            vec![HOME.to_string(), "https://kb.example.com/help/c".to_string()]
        );
        let urls: Vec<_> = second.store().records().iter().map(|r| r.html_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://kb.example.com/help/a",
                "https://kb.example.com/help/b",
                "https://kb.example.com/help/c",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_article_skipped_and_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::load(&dir.path().join("c.json")).await.unwrap();
        let fetcher = ScriptedFetcher::default()
            .page(HOME, r#"<a href="/help/missing">M</a><a href="/help/missing">M</a>"#);
        let mut pipeline = Pipeline::new(fetcher, store);

        let stats = pipeline
            .run(&[site(HOME, DiscoveryMode::Static, 0), site(HOME, DiscoveryMode::Static, 0)])
            .await
            .unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.committed, 0);
        assert_eq!(
            pipeline.fetcher().requested(),
            vec![HOME.to_string(), "https://kb.example.com/help/missing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sitemap_site_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::load(&dir.path().join("c.json")).await.unwrap();
        let fetcher = ScriptedFetcher::default()
            .sitemap("https://site/sitemap.xml", &["https://site/help/a", "https://site/blog/x"], &[])
            .page(
                "https://site/help/a",
                &article("Sitemap article", r#"<div class="article-body">Text</div>"#),
            );
        let mut pipeline = Pipeline::new(fetcher, store);

        pipeline
            .run(&[site("https://site/sitemap.xml", DiscoveryMode::Sitemap, 3)])
            .await
            .unwrap();
        let records = pipeline.store().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].html_url, "https://site/help/a");
        assert_eq!(records[0].id, "site#1");
    }

    #[tokio::test]
    async fn test_broken_sitemap_does_not_abort_other_sites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::load(&dir.path().join("c.json")).await.unwrap();
        let mut pipeline = Pipeline::new(fetcher(), store);

        let stats = pipeline
            .run(&[
                site("https://broken.example.com/sitemap.xml", DiscoveryMode::Sitemap, 3),
                site(HOME, DiscoveryMode::Static, 0),
            ])
            .await
            .unwrap();
        assert_eq!(stats.committed, 3);
    }
}
