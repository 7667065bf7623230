//! Crawl configuration loaded from a YAML file.
//!
//! The file lists the help-center sites to crawl and, optionally, the HTTP
//! identity, headless renderer settings and file paths for the run. Session
//! cookies are never part of the compiled binary; they come from this file,
//! the command line or the `KB_SESSION_COOKIE` environment variable.
//!
//! ```yaml
//! checkpoint_path: articles_temp.json
//! sites:
//!   - url: https://ironvest-kb.groovehq.com/help
//!     link_patterns: ["/help/"]
//!     body_selectors: ["article-body"]
//!     mode: static
//!     max_depth: 3
//! ```

use crate::error::ConfigError;
use scraper::Selector;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};
use url::Url;

/// Default recursion bound for crawl discovery.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// How a site's article links are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Plain HTTP GET of each page.
    #[default]
    Static,
    /// Pages are loaded in a headless browser and read after the network settles.
    Rendered,
    /// The seed URL is an XML sitemap listing the article locations.
    Sitemap,
}

impl DiscoveryMode {
    /// Mode used to download the article pages themselves.
    ///
    /// Sitemap locations are ordinary HTML pages, so only rendered sites
    /// need the browser for their articles.
    pub fn article_mode(self) -> DiscoveryMode {
        match self {
            DiscoveryMode::Rendered => DiscoveryMode::Rendered,
            DiscoveryMode::Static | DiscoveryMode::Sitemap => DiscoveryMode::Static,
        }
    }
}

/// One help-center site to crawl.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Seed URL: the help-center landing page, or the sitemap in sitemap mode.
    pub url: String,
    /// A discovered URL containing any of these substrings is an article.
    pub link_patterns: Vec<String>,
    /// CSS class names (without the leading dot) of the article body, in priority order.
    pub body_selectors: Vec<String>,
    #[serde(default)]
    pub mode: DiscoveryMode,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl SiteConfig {
    /// True when `url` contains one of the configured link patterns.
    pub fn is_article_link(&self, url: &str) -> bool {
        self.link_patterns.iter().any(|p| url.contains(p.as_str()))
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Identity used for plain HTTP requests.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Optional session cookie sent as the `Cookie` header.
    #[serde(default)]
    pub cookie: Option<String>,
    /// Extra request headers, sent verbatim.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cookie: None,
            headers: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "kb_crawler/{} (+rust; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

fn default_timeout_secs() -> u64 {
    30
}

/// Headless browser settings, used only by rendered sites.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Extra quiet time after navigation before the DOM is read.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Chrome/Chromium binary; auto-detected when absent.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            timeout_secs: default_timeout_secs(),
            chrome_executable: None,
        }
    }
}

fn default_settle_ms() -> u64 {
    500
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub processed_path: Option<PathBuf>,
}

impl CrawlConfig {
    /// Read, parse and validate a YAML configuration file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config: CrawlConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(sites = config.sites.len(), "Loaded crawl configuration");
        Ok(config)
    }

    /// Reject configurations that could not produce a meaningful crawl.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::Invalid("no sites configured".into()));
        }
        for site in &self.sites {
            let seed = Url::parse(&site.url)
                .map_err(|e| ConfigError::Invalid(format!("site url {:?}: {e}", site.url)))?;
            if !matches!(seed.scheme(), "http" | "https") || seed.host_str().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "site url {:?} must be an absolute http(s) URL",
                    site.url
                )));
            }
            if site.link_patterns.iter().all(|p| p.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "site {:?} needs at least one non-empty link pattern",
                    site.url
                )));
            }
            for class in &site.body_selectors {
                if class.is_empty()
                    || class.chars().any(char::is_whitespace)
                    || Selector::parse(&format!(".{class}")).is_err()
                {
                    return Err(ConfigError::Invalid(format!(
                        "site {:?}: {class:?} is not a valid CSS class name",
                        site.url
                    )));
                }
            }
        }
        Ok(())
    }
}
