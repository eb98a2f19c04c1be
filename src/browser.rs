//! Headless Chrome page rendering via chromiumoxide
//!
//! One `BrowserSession` per request: launched, used for a single page load,
//! and closed again whatever the outcome.

use crate::deadline::Deadline;
use crate::error::RenderError;
use crate::site::SiteProfile;
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const READY_POLL: Duration = Duration::from_millis(100);
const SETTLE_POLL: Duration = Duration::from_millis(500);
const SETTLE_SAMPLE: &str = "({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })";

/// Per-load knobs handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub headless: bool,
    /// Bound on navigation up to DOM readiness
    pub navigation: Duration,
    /// Bound on waiting for the ready selector
    pub ready: Duration,
    /// Best-effort wait for network quiescence; elapsing is not an error
    pub settle: Duration,
}

impl RenderOptions {
    /// Bound on reading the loaded document back out of the browser
    pub fn snapshot(&self) -> Duration {
        self.navigation
    }
}

/// Snapshot of a loaded page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    /// Final URL after redirects, when the browser reports one
    pub url: Option<String>,
}

/// Something that can load a URL and hand back the rendered document
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
        deadline: &Deadline,
    ) -> Result<RenderedPage, RenderError>;
}

/// Renders pages in a fresh Chrome per call
pub struct ChromeRenderer {
    ready_selector: &'static str,
}

impl ChromeRenderer {
    pub fn new(site: &SiteProfile) -> Self {
        Self {
            ready_selector: site.ready_selector,
        }
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    #[instrument(level = "info", skip_all, fields(%url, headless = options.headless))]
    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
        deadline: &Deadline,
    ) -> Result<RenderedPage, RenderError> {
        let session = BrowserSession::launch(options, deadline).await?;
        scoped(
            session,
            |session| async move {
                let outcome = session
                    .load(url, self.ready_selector, options, deadline)
                    .await;
                (session, outcome)
            },
            BrowserSession::close,
        )
        .await
    }
}

/// Run `work` with `session`, then `release` it whatever the outcome.
/// `work` hands the session back alongside its result.
async fn scoped<S, T, W, WF, R, RF>(session: S, work: W, release: R) -> Result<T, RenderError>
where
    W: FnOnce(S) -> WF,
    WF: Future<Output = (S, Result<T, RenderError>)>,
    R: FnOnce(S) -> RF,
    RF: Future<Output = ()>,
{
    let (session, outcome) = work(session).await;
    release(session).await;
    outcome
}

/// Browser and its CDP handler task, owned together
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(options: &RenderOptions, deadline: &Deadline) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .request_timeout(options.navigation);
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = deadline
            .run("launching the browser", deadline.remaining(), async {
                Browser::launch(config).await.map_err(|e| {
                    RenderError::Launch(format!(
                        "{} (is Chrome/Chromium installed?)",
                        e
                    ))
                })
            })
            .await?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        debug!(headless = options.headless, "Browser session opened");
        Ok(Self { browser, handler })
    }

    async fn open_page(
        &self,
        options: &RenderOptions,
        deadline: &Deadline,
    ) -> Result<Page, RenderError> {
        let page = deadline
            .run("opening a page", options.navigation, self.browser.new_page("about:blank"))
            .await?;

        if let Err(e) = page
            .execute(
                chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams::new(
                    USER_AGENT,
                ),
            )
            .await
        {
            warn!(error = %e, "Could not override user agent");
        }

        Ok(page)
    }

    async fn load(
        &self,
        url: &str,
        ready_selector: &str,
        options: &RenderOptions,
        deadline: &Deadline,
    ) -> Result<RenderedPage, RenderError> {
        let page = self.open_page(options, deadline).await?;

        deadline
            .run("navigating", options.navigation, async {
                page.goto(url).await.map(|_| ()).map_err(navigation_error)
            })
            .await?;

        deadline
            .run("waiting for content", options.ready, async {
                while page.find_element(ready_selector).await.is_err() {
                    tokio::time::sleep(READY_POLL).await;
                }
                Ok::<(), RenderError>(())
            })
            .await?;

        Self::settle(&page, options.settle, deadline).await;
        if deadline.is_expired() {
            return Err(RenderError::Timeout("settling".to_string()));
        }

        let rendered = deadline
            .run("reading the page", options.snapshot(), async {
                let html = page.content().await?;
                let url = page.url().await.ok().flatten();
                Ok::<_, RenderError>(RenderedPage { html, url })
            })
            .await?;

        info!(bytes = rendered.html.len(), final_url = ?rendered.url, "Page rendered");
        Ok(rendered)
    }

    /// Wait for `readyState == "complete"` and a stable resource count.
    /// Never fails; a page that keeps loading is used as is.
    async fn settle(page: &Page, budget: Duration, deadline: &Deadline) {
        let settled = deadline
            .run("settling", budget, async {
                let mut last = None;
                loop {
                    let sample: SettleSample = page
                        .evaluate(SETTLE_SAMPLE)
                        .await?
                        .into_value()
                        .map_err(|e| RenderError::Browser(e.to_string()))?;
                    if sample.ready == "complete" && last == Some(sample.resources) {
                        return Ok::<(), RenderError>(());
                    }
                    last = Some(sample.resources);
                    tokio::time::sleep(SETTLE_POLL).await;
                }
            })
            .await;

        if let Err(e) = settled {
            debug!(error = %e, "Page did not settle, continuing");
        }
    }

    /// Close the browser. Errors are logged, not returned.
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "Failed to reap browser process");
        }
        debug!("Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Also reached when the request deadline drops the session mid-load;
        // chromiumoxide kills the child process when `Browser` drops.
        self.handler.abort();
    }
}

#[derive(Debug, Deserialize)]
struct SettleSample {
    ready: String,
    resources: u64,
}

/// Classify a navigation failure by its Chrome net error
fn navigation_error(err: CdpError) -> RenderError {
    if matches!(err, CdpError::Timeout) {
        return RenderError::Timeout("navigating".to_string());
    }
    let msg = err.to_string();
    if msg.contains("ERR_TIMED_OUT") || msg.contains("ERR_CONNECTION_TIMED_OUT") {
        RenderError::Timeout(format!("navigating: {}", msg))
    } else {
        RenderError::Navigation(msg)
    }
}
