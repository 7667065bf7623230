//! Small helpers shared by the crawl modules.
//!
//! - URL normalisation and same-domain checks for the frontier
//! - String truncation for log previews
//! - Output directory preparation

use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};
use url::Url;

/// Resolve `href` against `base` and drop the fragment.
///
/// Returns `None` for hrefs that do not resolve to an http(s) URL
/// (`mailto:`, `javascript:`, malformed input).
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let mut resolved = base.join(href.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Canonical string form of a URL used as a visited/known key.
///
/// Unparseable input is returned unchanged so it still dedups against itself.
pub fn normalize_url(input: &str) -> String {
    match Url::parse(input) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => input.to_string(),
    }
}

/// True when both URLs have the same host.
pub fn same_domain(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the last character boundary before `max` bytes
/// and get `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Create the parent directory of an output file if it is missing.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
        debug!(dir = %parent.display(), "Output directory ready");
    }
    Ok(())
}
