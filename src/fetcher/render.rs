//! Headless browser rendering via `chromiumoxide`.
//!
//! The browser is launched on first use and shared across pages. Each
//! render opens its own page, waits for the main frame's `networkIdle`
//! lifecycle event plus `settle_ms`, and closes the page again on every
//! exit path, so a crawl over thousands of URLs never accumulates tabs.
//! A failed launch is reported for the current URL only; the next render
//! tries again. A browser that can no longer open pages is discarded and
//! relaunched on the next render.

use crate::config::RenderConfig;
use crate::error::FetchError;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// One browser tab, driven through a single navigation.
trait RenderPage {
    /// Apply the user agent and navigate to `url`.
    async fn open(&mut self, user_agent: &str, url: &str) -> Result<(), String>;
    /// Resolve once network activity for the navigation has gone quiet.
    async fn wait_until_idle(&mut self) -> Result<(), String>;
    async fn html(&mut self) -> Result<String, String>;
    async fn close(self) -> Result<(), String>;
}

/// A running browser that hands out pages.
trait BrowserSession: Sized {
    type Page: RenderPage;

    async fn new_page(&self) -> Result<Self::Page, String>;
    /// Tear down a browser that is no longer usable.
    async fn discard(self);
}

struct ChromePage {
    page: Page,
    lifecycle: Option<EventStream<EventLifecycleEvent>>,
    main_frame: Option<FrameId>,
}

impl RenderPage for ChromePage {
    async fn open(&mut self, user_agent: &str, url: &str) -> Result<(), String> {
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| e.to_string())?;
        self.lifecycle = Some(
            self.page
                .event_listener::<EventLifecycleEvent>()
                .await
                .map_err(|e| e.to_string())?,
        );
        self.main_frame = self.page.mainframe().await.map_err(|e| e.to_string())?;
        self.page
            .set_user_agent(user_agent)
            .await
            .map_err(|e| e.to_string())?;
        self.page.goto(url).await.map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn wait_until_idle(&mut self) -> Result<(), String> {
        let Some(events) = self.lifecycle.as_mut() else {
            return Err("page was not opened".to_string());
        };
        // Lifecycle state of the blank start page may be replayed first;
        // only events after the navigation's `init` count.
        let mut navigated = false;
        while let Some(event) = events.next().await {
            if self.main_frame.as_ref().is_some_and(|f| *f != event.frame_id) {
                continue;
            }
            match event.name.as_str() {
                "init" => navigated = true,
                "networkIdle" if navigated => return Ok(()),
                _ => {}
            }
        }
        Err("lifecycle event stream ended before network idle".to_string())
    }

    async fn html(&mut self) -> Result<String, String> {
        self.page.content().await.map_err(|e| e.to_string())
    }

    async fn close(self) -> Result<(), String> {
        self.page.close().await.map_err(|e| e.to_string())
    }
}

struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession for LaunchedBrowser {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage, String> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| e.to_string())?;
        Ok(ChromePage {
            page,
            lifecycle: None,
            main_frame: None,
        })
    }

    async fn discard(mut self) {
        self.handler.abort();
        if let Some(Err(e)) = self.browser.kill().await {
            warn!(error = %e, "Failed to kill headless browser");
        }
    }
}

/// Open a page from the browser in `slot`, launching one if the slot is empty.
///
/// When the browser cannot open a page it is discarded, leaving the slot
/// empty so the next call launches a fresh one.
async fn open_page<B, L>(slot: &mut Option<B>, launch: L) -> Result<B::Page, String>
where
    B: BrowserSession,
    L: Future<Output = Result<B, String>>,
{
    if slot.is_none() {
        *slot = Some(launch.await?);
    }
    let Some(session) = slot.as_ref() else {
        return Err("browser unavailable".to_string());
    };
    match session.new_page().await {
        Ok(page) => Ok(page),
        Err(e) => {
            warn!(error = %e, "Headless browser cannot open pages; discarding it");
            if let Some(dead) = slot.take() {
                dead.discard().await;
            }
            Err(e)
        }
    }
}

/// Drive `page` through one render under `timeout`, closing it whatever the outcome.
async fn render_page<P: RenderPage>(
    mut page: P,
    user_agent: &str,
    url: &str,
    timeout: Duration,
    settle: Duration,
) -> Result<String, FetchError> {
    let result = tokio::time::timeout(timeout, load(&mut page, user_agent, url, settle))
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::Timeout {
                url: url.to_string(),
            })
        });

    if let Err(e) = page.close().await {
        warn!(%url, error = %e, "Failed to close headless page");
    }
    result
}

async fn load<P: RenderPage>(
    page: &mut P,
    user_agent: &str,
    url: &str,
    settle: Duration,
) -> Result<String, FetchError> {
    let network = |message: String| FetchError::Network {
        url: url.to_string(),
        message,
    };

    page.open(user_agent, url).await.map_err(network)?;
    page.wait_until_idle().await.map_err(network)?;
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    let html = page.html().await.map_err(network)?;
    debug!(bytes = html.len(), "Rendered page");
    Ok(html)
}

/// Lazily-launched headless Chromium.
pub struct HeadlessRenderer {
    config: RenderConfig,
    user_agent: String,
    browser: Mutex<Option<LaunchedBrowser>>,
}

impl fmt::Debug for HeadlessRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessRenderer")
            .field("settle_ms", &self.config.settle_ms)
            .field("timeout_secs", &self.config.timeout_secs)
            .field("chrome_executable", &self.config.chrome_executable)
            .finish()
    }
}

impl HeadlessRenderer {
    pub fn new(config: RenderConfig, user_agent: String) -> Self {
        Self {
            config,
            user_agent,
            browser: Mutex::new(None),
        }
    }

    #[instrument(level = "info", skip_all)]
    async fn launch(&self) -> Result<LaunchedBrowser, String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(self.config.timeout_secs))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build()?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| e.to_string())?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!("Headless browser launched");
        Ok(LaunchedBrowser { browser, handler })
    }

    /// Navigate to `url`, wait for the network to go idle and return the page HTML.
    #[instrument(level = "info", skip(self))]
    pub async fn render(&self, url: &str) -> Result<String, FetchError> {
        let page = {
            let mut slot = self.browser.lock().await;
            open_page(&mut *slot, self.launch())
                .await
                .map_err(|message| FetchError::Resource {
                    url: url.to_string(),
                    message,
                })?
        };

        render_page(
            page,
            &self.user_agent,
            url,
            Duration::from_secs(self.config.timeout_secs),
            Duration::from_millis(self.config.settle_ms),
        )
        .await
    }

    /// Close the browser process. Safe to call when it was never launched.
    #[instrument(level = "info", skip_all)]
    pub async fn shutdown(&self) {
        let Some(mut launched) = self.browser.lock().await.take() else {
            return;
        };
        if let Err(e) = launched.browser.close().await {
            warn!(error = %e, "Failed to close headless browser");
        }
        if let Err(e) = launched.browser.wait().await {
            warn!(error = %e, "Failed waiting for headless browser to exit");
        }
        launched.handler.abort();
        info!("Headless browser closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Scripted page recording every call; `fail` errors and `hang` never returns.
    #[derive(Default)]
    struct FakePage {
        calls: Arc<StdMutex<Vec<&'static str>>>,
        fail: Option<&'static str>,
        hang: Option<&'static str>,
    }

    impl FakePage {
        async fn step(&self, name: &'static str) -> Result<(), String> {
            self.calls.lock().unwrap().push(name);
            if self.hang == Some(name) {
                std::future::pending::<()>().await;
            }
            if self.fail == Some(name) {
                return Err(format!("{name} failed"));
            }
            Ok(())
        }
    }

    impl RenderPage for FakePage {
        async fn open(&mut self, _user_agent: &str, _url: &str) -> Result<(), String> {
            self.step("open").await
        }

        async fn wait_until_idle(&mut self) -> Result<(), String> {
            self.step("idle").await
        }

        async fn html(&mut self) -> Result<String, String> {
            self.step("html").await?;
            Ok("<p>rendered</p>".to_string())
        }

        async fn close(self) -> Result<(), String> {
            self.step("close").await
        }
    }

    fn calls_of(page: &FakePage) -> Arc<StdMutex<Vec<&'static str>>> {
        Arc::clone(&page.calls)
    }

    const URL: &str = "https://spa.example.com/article/1";
    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_render_waits_for_idle_then_closes() {
        let page = FakePage::default();
        let calls = calls_of(&page);

        let html = render_page(page, "kb-test", URL, TIMEOUT, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(html, "<p>rendered</p>");
        assert_eq!(*calls.lock().unwrap(), ["open", "idle", "html", "close"]);
    }

    #[tokio::test]
    async fn test_page_closed_after_navigation_error() {
        let page = FakePage {
            fail: Some("open"),
            ..FakePage::default()
        };
        let calls = calls_of(&page);

        let err = render_page(page, "kb-test", URL, TIMEOUT, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
        assert_eq!(*calls.lock().unwrap(), ["open", "close"]);
    }

    #[tokio::test]
    async fn test_page_closed_after_timeout() {
        let page = FakePage {
            hang: Some("idle"),
            ..FakePage::default()
        };
        let calls = calls_of(&page);

        let err = render_page(page, "kb-test", URL, Duration::from_millis(50), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
        assert_eq!(*calls.lock().unwrap(), ["open", "idle", "close"]);
    }

    /// Browser whose page opening succeeds until `healthy` is cleared.
    struct FakeBrowser {
        healthy: bool,
        discarded: Arc<AtomicUsize>,
    }

    impl BrowserSession for FakeBrowser {
        type Page = FakePage;

        async fn new_page(&self) -> Result<FakePage, String> {
            if self.healthy {
                Ok(FakePage::default())
            } else {
                Err("connection closed".to_string())
            }
        }

        async fn discard(self) {
            self.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dead_browser_discarded_and_relaunched() {
        let launches = Arc::new(AtomicUsize::new(0));
        let discarded = Arc::new(AtomicUsize::new(0));
        let launch = || {
            let launches = Arc::clone(&launches);
            let discarded = Arc::clone(&discarded);
            async move {
                launches.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(FakeBrowser {
                    healthy: true,
                    discarded,
                })
            }
        };

        let mut slot = None;
        assert!(open_page(&mut slot, launch()).await.is_ok());
        assert!(open_page(&mut slot, launch()).await.is_ok());
        assert_eq!(launches.load(Ordering::SeqCst), 1);
        assert!(slot.is_some());

        // The browser dies: the page fails once and the slot is emptied.
        if let Some(browser) = slot.as_mut() {
            browser.healthy = false;
        }
        assert!(open_page(&mut slot, launch()).await.is_err());
        assert!(slot.is_none());
        assert_eq!(discarded.load(Ordering::SeqCst), 1);

        // The next page gets a fresh browser.
        assert!(open_page(&mut slot, launch()).await.is_ok());
        assert_eq!(launches.load(Ordering::SeqCst), 2);
        assert!(slot.as_ref().is_some_and(|b| b.healthy));
    }

    #[tokio::test]
    async fn test_failed_launch_leaves_slot_empty() {
        let mut slot: Option<FakeBrowser> = None;
        let err = open_page(&mut slot, async { Err("no chrome".to_string()) })
            .await
            .err();
        assert_eq!(err.as_deref(), Some("no chrome"));
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_without_launch_is_noop() {
        let renderer = HeadlessRenderer::new(RenderConfig::default(), "kb-test".to_string());
        renderer.shutdown().await;
        assert!(renderer.browser.lock().await.is_none());
    }

    #[test]
    fn test_debug_omits_browser_handle() {
        let renderer = HeadlessRenderer::new(RenderConfig::default(), "kb-test".to_string());
        let rendered = format!("{renderer:?}");
        assert!(rendered.contains("settle_ms: 500"));
    }
}
