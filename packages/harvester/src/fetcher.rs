//! Page fetchers.
//!
//! [`PageFetcher`] is the boundary between the crawl logic and the network.
//! Two implementations are selected by [`FetchMode`]:
//!
//! - [`StaticFetcher`]: a plain HTTP GET.
//! - [`RenderingFallbackFetcher`]: a plain GET first, then a headless browser
//!   (`--dump-dom`) when the GET fails in transport or returns a page without
//!   any links, which is what script-rendered pages look like to a static
//!   client. A non-2xx answer is final and never rendered.
//!
//! Fetchers hold no per-crawl state; the same instance can serve every topic
//! and law of a run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::config::{FetchConfig, FetchMode, HTTP_TIMEOUT_SECS};
use crate::document::Document;
use crate::error::FetchError;
use crate::http::{create_client, download_text};
use crate::pacing::RequestPacer;

/// Fetch a URL and return the parsed document.
///
/// Any failure (network, timeout, non-2xx) is a [`FetchError`]; callers treat
/// all of them alike as "page unavailable".
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

impl<F: PageFetcher + ?Sized> PageFetcher for &F {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        (**self).fetch(url)
    }
}

impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        (**self).fetch(url)
    }
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))
}

/// Fetches pages with a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    max_retries: u32,
}

impl StaticFetcher {
    pub fn new(max_retries: u32) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_client()?,
            max_retries,
        })
    }
}

impl PageFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let parsed = parse_url(url)?;
        tracing::debug!(url, "Fetching page");
        let downloaded = download_text(&self.client, url, self.max_retries)?;
        Ok(Document::parse(parsed, downloaded.status, downloaded.body))
    }
}

/// Renders pages with a headless Chromium-compatible browser.
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    browser: PathBuf,
}

impl BrowserRenderer {
    pub fn new(browser: impl Into<PathBuf>) -> Self {
        Self {
            browser: browser.into(),
        }
    }

    /// Render `url` and return the serialized DOM.
    pub fn render(&self, url: &str) -> Result<String, FetchError> {
        let timeout = format!("--timeout={}", HTTP_TIMEOUT_SECS * 1000);
        let output = Command::new(&self.browser)
            .args([
                "--headless",
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--window-size=1920,1080",
                timeout.as_str(),
                "--dump-dom",
                url,
            ])
            .output()
            .map_err(FetchError::RendererSpawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Renderer(format!(
                "{} exited with {}: {}",
                self.browser.display(),
                output.status,
                stderr.trim()
            )));
        }

        let dom = String::from_utf8_lossy(&output.stdout).into_owned();
        if dom.trim().is_empty() {
            return Err(FetchError::Renderer(format!(
                "{} produced no output",
                self.browser.display()
            )));
        }
        Ok(dom)
    }
}

impl PageFetcher for BrowserRenderer {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let parsed = parse_url(url)?;
        tracing::debug!(url, browser = %self.browser.display(), "Rendering page");
        let dom = self.render(url)?;
        Ok(Document::parse(parsed, 200, dom))
    }
}

/// Static fetch first, browser rendering when the static result is unusable.
///
/// The browser loads the page from the origin again, so it waits for the
/// pacing delay after the static request.
#[derive(Debug)]
pub struct RenderingFallbackFetcher<S = StaticFetcher> {
    primary: S,
    renderer: BrowserRenderer,
    pacer: RefCell<RequestPacer>,
}

impl<S: PageFetcher> RenderingFallbackFetcher<S> {
    pub fn new(primary: S, renderer: BrowserRenderer, delay: Duration) -> Self {
        Self {
            primary,
            renderer,
            pacer: RefCell::new(RequestPacer::new(delay)),
        }
    }

    fn render(&self, url: &str) -> Result<Document, FetchError> {
        self.pacer.borrow_mut().wait();
        self.renderer.fetch(url)
    }
}

impl<S: PageFetcher> PageFetcher for RenderingFallbackFetcher<S> {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.pacer.borrow_mut().wait();
        match self.primary.fetch(url) {
            Ok(document) if !document.anchors().is_empty() => Ok(document),
            Ok(_) => {
                tracing::info!(url, "Static page has no links, rendering with browser");
                self.render(url)
            }
            Err(e @ (FetchError::Http(_) | FetchError::RetriesExhausted { .. })) => {
                tracing::warn!(url, error = %e, "Static fetch failed, rendering with browser");
                self.render(url)
            }
            Err(e) => Err(e),
        }
    }
}

/// Serves pages from memory and records every requested URL.
///
/// URLs without a page answer with HTTP 404. Used for offline replays and
/// tests.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, String>,
    requests: RefCell<Vec<String>>,
}

impl MemoryFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page, keyed by its exact URL.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl PageFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        let parsed = parse_url(url)?;
        let html = self
            .pages
            .get(url)
            .ok_or(FetchError::Status { status: 404 })?;
        Ok(Document::parse(parsed, 200, html.as_str()))
    }
}

/// Build the fetcher selected by configuration.
pub fn create_fetcher(config: &FetchConfig) -> Result<Box<dyn PageFetcher>, FetchError> {
    let fetcher = StaticFetcher::new(config.max_retries)?;
    Ok(match config.mode {
        FetchMode::Static => Box::new(fetcher),
        FetchMode::Render => Box::new(RenderingFallbackFetcher::new(
            fetcher,
            BrowserRenderer::new(&config.browser),
            config.request_delay,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFetcher(&'static str);

    impl PageFetcher for FixedFetcher {
        fn fetch(&self, url: &str) -> Result<Document, FetchError> {
            Ok(Document::parse(parse_url(url)?, 200, self.0))
        }
    }

    /// Static fetch that fails with the given error kind.
    enum FailingFetcher {
        Unreachable,
        NotFound,
    }

    impl PageFetcher for FailingFetcher {
        fn fetch(&self, _url: &str) -> Result<Document, FetchError> {
            Err(match self {
                Self::Unreachable => FetchError::RetriesExhausted {
                    attempts: 4,
                    message: "Server error: 503 Service Unavailable".to_string(),
                },
                Self::NotFound => FetchError::Status { status: 404 },
            })
        }
    }

    /// A shell script standing in for the browser, printing `html`.
    #[cfg(unix)]
    fn fake_browser(dir: &std::path::Path, html: &str) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-browser");
        {
            let mut file = std::fs::File::create(&script).unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            writeln!(file, "echo '{html}'").unwrap();
        }
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    const MISSING_BROWSER: &str = "/nonexistent/lagboken-test-browser";

    #[test]
    fn test_fallback_keeps_static_page_with_links() {
        let fetcher = RenderingFallbackFetcher::new(
            FixedFetcher(r#"<a href="/a/">A</a>"#),
            BrowserRenderer::new(MISSING_BROWSER),
            Duration::ZERO,
        );
        let doc = fetcher.fetch("https://www.lagboken.se/").unwrap();
        assert_eq!(doc.anchors().len(), 1);
    }

    #[test]
    fn test_fallback_renders_when_static_page_has_no_links() {
        let fetcher = RenderingFallbackFetcher::new(
            FixedFetcher("<div id=app></div>"),
            BrowserRenderer::new(MISSING_BROWSER),
            Duration::ZERO,
        );
        let err = fetcher.fetch("https://www.lagboken.se/").unwrap_err();
        assert!(matches!(err, FetchError::RendererSpawn(_)));
    }

    #[test]
    fn test_fallback_renders_when_static_fetch_fails() {
        let fetcher = RenderingFallbackFetcher::new(
            FailingFetcher::Unreachable,
            BrowserRenderer::new(MISSING_BROWSER),
            Duration::ZERO,
        );
        assert!(matches!(
            fetcher.fetch("https://www.lagboken.se/"),
            Err(FetchError::RendererSpawn(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_client_error_is_not_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let browser = fake_browser(
            dir.path(),
            "<html><body><h1>Sidan finns inte</h1><a href=\"/\">Start</a></body></html>",
        );
        let fetcher = RenderingFallbackFetcher::new(
            FailingFetcher::NotFound,
            BrowserRenderer::new(browser),
            Duration::ZERO,
        );

        assert!(matches!(
            fetcher.fetch("https://www.lagboken.se/lagboken/start/saknas-2099999/"),
            Err(FetchError::Status { status: 404 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_fallback_waits_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let browser = fake_browser(dir.path(), "<a href=\"/a/\">A</a>");
        let fetcher = RenderingFallbackFetcher::new(
            FailingFetcher::Unreachable,
            BrowserRenderer::new(browser),
            Duration::from_millis(50),
        );

        let start = std::time::Instant::now();
        let doc = fetcher.fetch("https://www.lagboken.se/").unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(doc.anchors().len(), 1);
    }

    #[test]
    fn test_memory_fetcher_records_requests() {
        let fetcher = MemoryFetcher::new().with_page("https://www.lagboken.se/a/", "<p>A</p>");

        assert_eq!(fetcher.fetch("https://www.lagboken.se/a/").unwrap().text(), "A");
        assert!(matches!(
            fetcher.fetch("https://www.lagboken.se/b/"),
            Err(FetchError::Status { status: 404 })
        ));
        assert_eq!(
            fetcher.requests(),
            vec!["https://www.lagboken.se/a/", "https://www.lagboken.se/b/"]
        );
    }

    #[test]
    fn test_invalid_url_is_fetch_error() {
        let fetcher = FixedFetcher("");
        assert!(matches!(
            fetcher.fetch("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_renderer_reads_browser_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let browser = fake_browser(
            dir.path(),
            "<html><body><a href=\"/sfs/1977:480\">Semesterlag (1977:480)</a></body></html>",
        );

        let fetcher = RenderingFallbackFetcher::new(
            FailingFetcher::Unreachable,
            BrowserRenderer::new(browser),
            Duration::ZERO,
        );
        let doc = fetcher.fetch("https://www.lagboken.se/").unwrap();

        assert_eq!(doc.anchors()[0].text, "Semesterlag (1977:480)");
    }
}
