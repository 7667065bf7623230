//! Page retrieval behind one interface.
//!
//! The crawl logic only sees [`Fetcher`]; how the content was obtained is
//! decided by the [`DiscoveryMode`] passed with each request:
//!
//! | Mode | Module | Result |
//! |------|--------|--------|
//! | `static` | [`http`] | Raw response body |
//! | `rendered` | [`render`] | DOM serialized after the page settles |
//! | `sitemap` | [`sitemap`] | Declared `<loc>` entries |
//!
//! Every failure is a [`FetchError`]; callers decide whether it is fatal.

pub mod http;
pub mod render;
pub mod sitemap;

use crate::config::DiscoveryMode;
use crate::error::FetchError;
use self::http::HttpFetcher;
use self::render::HeadlessRenderer;
use tracing::instrument;

/// Content returned for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// An HTML document.
    Page(String),
    /// A parsed sitemap: page locations and, for sitemap indexes, child sitemaps.
    Sitemap {
        pages: Vec<String>,
        sitemaps: Vec<String>,
    },
}

/// Retrieve content for a URL in a given mode.
pub trait Fetcher {
    async fn fetch(&self, url: &str, mode: DiscoveryMode) -> Result<Fetched, FetchError>;
}

/// The production fetcher: plain HTTP plus an optional headless browser.
#[derive(Debug)]
pub struct SiteFetcher {
    http: HttpFetcher,
    renderer: Option<HeadlessRenderer>,
}

impl SiteFetcher {
    pub fn new(http: HttpFetcher, renderer: Option<HeadlessRenderer>) -> Self {
        Self { http, renderer }
    }

    /// Close the headless browser, if one was started.
    pub async fn shutdown(&self) {
        if let Some(renderer) = &self.renderer {
            renderer.shutdown().await;
        }
    }
}

impl Fetcher for SiteFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str, mode: DiscoveryMode) -> Result<Fetched, FetchError> {
        match mode {
            DiscoveryMode::Static => self.http.get_text(url).await.map(Fetched::Page),
            DiscoveryMode::Sitemap => {
                let xml = self.http.get_text(url).await?;
                let doc = sitemap::parse_sitemap(url, &xml)?;
                Ok(Fetched::Sitemap {
                    pages: doc.pages,
                    sitemaps: doc.sitemaps,
                })
            }
            DiscoveryMode::Rendered => match &self.renderer {
                Some(renderer) => renderer.render(url).await.map(Fetched::Page),
                None => Err(FetchError::Resource {
                    url: url.to_string(),
                    message: "no headless renderer configured".to_string(),
                }),
            },
        }
    }
}
