//! fetch: Render the front page, extract headlines, classify failures
//!
//! `fetch_and_extract` is the single place where raw browser failures become
//! `ClassifiedError`s. The `fetch` command runs it once and prints the result.

use crate::browser::{ChromeRenderer, PageRenderer, RenderOptions, RenderedPage};
use crate::deadline::Deadline;
use crate::error::ClassifiedError;
use crate::extract::extract_articles;
use crate::schema::{Article, NewsEnvelope};
use crate::site::SiteProfile;
use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use scraper::Html;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 20;

/// Step timeouts nested inside one overall request deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub navigation: Duration,
    pub ready: Duration,
    pub settle: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(15),
            ready: Duration::from_secs(10),
            settle: Duration::from_secs(8),
            request: Duration::from_secs(30),
        }
    }
}

/// Shared timeout flags for `serve` and `fetch`
#[derive(Args, Debug, Clone)]
pub struct TimeoutArgs {
    /// Navigation timeout in milliseconds
    #[arg(long, env = "NAVIGATION_TIMEOUT_MS", default_value = "15000")]
    pub navigation_timeout_ms: u64,

    /// Timeout waiting for initial content in milliseconds
    #[arg(long, env = "READY_TIMEOUT_MS", default_value = "10000")]
    pub ready_timeout_ms: u64,

    /// Best-effort wait for the page to settle in milliseconds
    #[arg(long, env = "SETTLE_TIMEOUT_MS", default_value = "8000")]
    pub settle_timeout_ms: u64,

    /// Overall deadline per request in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

impl From<&TimeoutArgs> for Timeouts {
    fn from(args: &TimeoutArgs) -> Self {
        Self {
            navigation: Duration::from_millis(args.navigation_timeout_ms),
            ready: Duration::from_millis(args.ready_timeout_ms),
            settle: Duration::from_millis(args.settle_timeout_ms),
            request: Duration::from_millis(args.request_timeout_ms),
        }
    }
}

/// Site and timeouts for the orchestrator
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchSettings {
    pub site: SiteProfile,
    pub timeouts: Timeouts,
}

/// Validated request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsRequest {
    /// Already checked to be within 1..=MAX_LIMIT by the caller
    pub limit: usize,
    pub headless: bool,
}

impl Default for NewsRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            headless: true,
        }
    }
}

/// Render the site's front page and extract up to `limit` articles.
///
/// Failures come back classified: a timeout of any step, or of the overall
/// deadline, is `UpstreamTimeout`; an empty extraction or any other render
/// failure is `UpstreamParseFailed`. No retries.
#[instrument(level = "info", skip_all, fields(limit = request.limit, headless = request.headless))]
pub async fn fetch_and_extract<R>(
    renderer: &R,
    request: &NewsRequest,
    settings: &FetchSettings,
) -> Result<NewsEnvelope, ClassifiedError>
where
    R: PageRenderer + ?Sized,
{
    let deadline = Deadline::after(settings.timeouts.request);

    match tokio::time::timeout_at(
        deadline.instant(),
        render_and_extract(renderer, request, settings, &deadline),
    )
    .await
    {
        Ok(Ok(items)) => Ok(NewsEnvelope::new(settings.site.source, Utc::now(), items)),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(
                budget_ms = settings.timeouts.request.as_millis() as u64,
                "Request deadline exceeded"
            );
            Err(ClassifiedError::upstream_timeout())
        }
    }
}

async fn render_and_extract<R>(
    renderer: &R,
    request: &NewsRequest,
    settings: &FetchSettings,
    deadline: &Deadline,
) -> Result<Vec<Article>, ClassifiedError>
where
    R: PageRenderer + ?Sized,
{
    let options = RenderOptions {
        headless: request.headless,
        navigation: settings.timeouts.navigation,
        ready: settings.timeouts.ready,
        settle: settings.timeouts.settle,
    };

    let page = renderer
        .render(settings.site.home_url, &options, deadline)
        .await
        .map_err(|e| {
            let classified = e.classify();
            warn!(error = %e, kind = %classified.kind(), "Rendering failed");
            classified
        })?;

    let items = extract_from_page(&page, request.limit, &settings.site);
    if items.is_empty() {
        warn!("Page rendered but no articles were extracted");
        return Err(ClassifiedError::upstream_parse_failed());
    }

    info!(count = items.len(), "Extracted articles");
    Ok(items)
}

/// Parse and extract synchronously so the document never lives across an await
fn extract_from_page(page: &RenderedPage, limit: usize, site: &SiteProfile) -> Vec<Article> {
    let Ok(home) = Url::parse(site.home_url) else {
        return Vec::new();
    };
    let page_url = page
        .url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(home);

    let doc = Html::parse_document(&page.html);
    let mut items = extract_articles(&doc, &page_url, limit, site);
    items.truncate(limit);
    items
}

#[derive(Args)]
pub struct FetchArgs {
    /// Number of articles to return (1-20)
    #[arg(long, short, default_value = "10", value_parser = clap::value_parser!(u8).range(1..=20))]
    pub limit: u8,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Output format: json (default) or yaml
    #[arg(long, short, default_value = "json")]
    pub format: String,

    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

/// Run the fetch command
pub async fn run_fetch(args: FetchArgs) -> Result<()> {
    let settings = FetchSettings {
        site: SiteProfile::ANSA,
        timeouts: Timeouts::from(&args.timeouts),
    };
    let request = NewsRequest {
        limit: usize::from(args.limit),
        headless: !args.headed,
    };
    let renderer = ChromeRenderer::new(&settings.site);

    eprintln!("Fetching {} (limit {})...", settings.site.home_url, request.limit);

    match fetch_and_extract(&renderer, &request, &settings).await {
        Ok(envelope) => {
            let output = match args.format.as_str() {
                "yaml" | "yml" => serde_yaml::to_string(&envelope)?,
                _ => serde_json::to_string_pretty(&envelope)?,
            };
            println!("{}", output);
            eprintln!("Done: {} articles", envelope.count);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string(&e.to_body())?);
            bail!("{}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RenderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Html(&'static str),
        Fail(fn() -> RenderError),
        Hang(Duration),
    }

    struct FakeRenderer {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeRenderer {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(
            &self,
            _url: &str,
            _options: &RenderOptions,
            _deadline: &Deadline,
        ) -> Result<RenderedPage, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Html(html) => Ok(RenderedPage {
                    html: html.to_string(),
                    url: Some("https://www.ansa.it/".to_string()),
                }),
                Behavior::Fail(make) => Err(make()),
                Behavior::Hang(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(RenderedPage {
                        html: FRONT_PAGE.to_string(),
                        url: None,
                    })
                }
            }
        }
    }

    const FRONT_PAGE: &str = r#"
        <html><body><main>
          <article>
            <span class="kicker">Mondo</span>
            <a href="/mondo/2024/05/01/titolo-abbastanza-lungo.html">Questo è un titolo di notizia sufficientemente lungo</a>
            <time datetime="2024-05-01T10:00:00Z"></time>
          </article>
          <article><a href="/politica/seconda.html">Seconda notizia della giornata politica</a></article>
          <article><a href="/economia/terza.html">Terza notizia della giornata economica</a></article>
        </main></body></html>
    "#;

    const BOILERPLATE_PAGE: &str = r#"
        <html><body><main>
          <a href="/cookie-policy">Informativa estesa sull'uso dei cookie</a>
          <a href="/contatti">Scrivi alla redazione di questo sito</a>
        </main></body></html>
    "#;

    #[tokio::test]
    async fn test_success_envelope() {
        let renderer = FakeRenderer::new(Behavior::Html(FRONT_PAGE));
        let envelope = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap();

        assert_eq!(envelope.source, "ansa");
        assert_eq!(envelope.count, 3);
        assert_eq!(envelope.items.len(), envelope.count);
        assert_eq!(
            envelope.items[0].url,
            "https://www.ansa.it/mondo/2024/05/01/titolo-abbastanza-lungo.html"
        );
        assert_eq!(envelope.items[0].published_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(envelope.items[0].category.as_deref(), Some("Mondo"));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let renderer = FakeRenderer::new(Behavior::Html(FRONT_PAGE));
        let request = NewsRequest {
            limit: 2,
            headless: true,
        };
        let envelope = fetch_and_extract(&renderer, &request, &FetchSettings::default())
            .await
            .unwrap();
        assert_eq!(envelope.count, 2);
        assert!(envelope.items[1].url.ends_with("/politica/seconda.html"));
    }

    #[tokio::test]
    async fn test_empty_extraction_is_parse_failure() {
        let renderer = FakeRenderer::new(Behavior::Html(BOILERPLATE_PAGE));
        let err = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamParseFailed);
        assert_eq!(err.suggested_status(), 502);
        // no internal retry
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_render_timeout_is_upstream_timeout() {
        let renderer = FakeRenderer::new(Behavior::Fail(|| {
            RenderError::Timeout("navigating".to_string())
        }));
        let err = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);
        assert_eq!(err.suggested_status(), 504);
    }

    #[tokio::test]
    async fn test_timeout_by_message_is_upstream_timeout() {
        let renderer = FakeRenderer::new(Behavior::Fail(|| {
            RenderError::Browser("Navigation Timeout Exceeded: 15000ms".to_string())
        }));
        let err = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);
    }

    #[tokio::test]
    async fn test_other_render_failure_is_parse_failure() {
        let renderer = FakeRenderer::new(Behavior::Fail(|| {
            RenderError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string())
        }));
        let err = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamParseFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_deadline_wins() {
        let renderer = FakeRenderer::new(Behavior::Hang(Duration::from_secs(60)));
        let err = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_but_within_deadline_succeeds() {
        let renderer = FakeRenderer::new(Behavior::Hang(Duration::from_secs(20)));
        let envelope = fetch_and_extract(&renderer, &NewsRequest::default(), &FetchSettings::default())
            .await
            .unwrap();
        assert_eq!(envelope.count, 3);
    }

    #[test]
    fn test_extract_from_page_falls_back_to_home_origin() {
        let page = RenderedPage {
            html: FRONT_PAGE.to_string(),
            url: Some("about:blank".to_string()),
        };
        let items = extract_from_page(&page, 10, &SiteProfile::ANSA);
        assert!(items[0].url.starts_with("https://www.ansa.it/"));
    }

    #[test]
    fn test_timeouts_from_args() {
        let args = TimeoutArgs {
            navigation_timeout_ms: 1000,
            ready_timeout_ms: 2000,
            settle_timeout_ms: 3000,
            request_timeout_ms: 4000,
        };
        let t = Timeouts::from(&args);
        assert_eq!(t.navigation, Duration::from_secs(1));
        assert_eq!(t.request, Duration::from_secs(4));
        assert_eq!(Timeouts::default().request, Duration::from_secs(30));
    }
}
