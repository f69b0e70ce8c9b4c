//! Configuration constants and validation functions for the harvester.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{HarvesterError, Result};

/// Topic crawled when none is given on the command line.
pub const DEFAULT_TOPIC_URL: &str =
    "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/";

/// Base URL for synthesized law URLs (laws listed without a usable link).
pub const IMPORTANT_LAWS_BASE_URL: &str =
    "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/";

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Fixed delay between two consecutive requests to the origin server.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;

/// Retry attempts for transient HTTP failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound for a configured retry count.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Headless browser used by the rendering fallback.
pub const DEFAULT_BROWSER: &str = "chromium";

/// Location of the corpus store database.
pub const DEFAULT_DB_PATH: &str = "data/legal_kg.db";

/// Validate that a URL is absolute http(s).
///
/// # Examples
/// ```
/// use lagboken_harvester::config::validate_topic_url;
///
/// assert!(validate_topic_url("https://www.lagboken.se/lagboken/start/").is_ok());
/// assert!(validate_topic_url("/lagboken/start/").is_err());
/// assert!(validate_topic_url("ftp://example.com/").is_err());
/// ```
pub fn validate_topic_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|_| HarvesterError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(parsed),
        _ => Err(HarvesterError::InvalidUrl(url.to_string())),
    }
}

/// Validate an optional quota. `None` means unbounded; zero is rejected.
///
/// # Examples
/// ```
/// use lagboken_harvester::config::validate_quota;
///
/// assert!(validate_quota("max_total_laws", None).is_ok());
/// assert!(validate_quota("max_total_laws", Some(5)).is_ok());
/// assert!(validate_quota("max_total_laws", Some(0)).is_err());
/// ```
pub fn validate_quota(name: &'static str, value: Option<usize>) -> Result<()> {
    match value {
        Some(0) => Err(HarvesterError::InvalidQuota { name, value: 0 }),
        _ => Ok(()),
    }
}

/// Settings for one multi-topic crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Topic listing pages, crawled in order.
    pub topic_urls: Vec<String>,

    /// Upper bound on laws taken from a single topic.
    pub max_laws_per_topic: Option<usize>,

    /// Upper bound on laws across the whole run.
    pub max_total_laws: Option<usize>,

    /// Fetch each law page for metadata. When false, only references are emitted.
    pub scrape_individual_laws: bool,

    /// Delay between consecutive network-bound operations.
    pub request_delay: Duration,
}

impl CrawlConfig {
    pub fn new<I, S>(topic_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic_urls: topic_urls.into_iter().map(Into::into).collect(),
            max_laws_per_topic: None,
            max_total_laws: None,
            scrape_individual_laws: true,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }

    pub fn with_max_laws_per_topic(mut self, max: Option<usize>) -> Self {
        self.max_laws_per_topic = max;
        self
    }

    pub fn with_max_total_laws(mut self, max: Option<usize>) -> Self {
        self.max_total_laws = max;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Emit law references only, without fetching individual law pages.
    pub fn links_only(mut self) -> Self {
        self.scrape_individual_laws = false;
        self
    }

    /// Check the configuration before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.topic_urls.is_empty() {
            return Err(HarvesterError::Config(
                "at least one topic URL is required".to_string(),
            ));
        }
        for url in &self.topic_urls {
            validate_topic_url(url)?;
        }
        validate_quota("max_laws_per_topic", self.max_laws_per_topic)?;
        validate_quota("max_total_laws", self.max_total_laws)?;
        Ok(())
    }
}

/// How pages are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Plain HTTP GET.
    #[default]
    Static,

    /// Plain HTTP GET, falling back to a headless browser when that is insufficient.
    Render,
}

impl FetchMode {
    /// Parse from a configuration value.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "render" | "rendering" => Ok(Self::Render),
            other => Err(HarvesterError::Config(format!(
                "unknown fetch mode '{other}', expected 'static' or 'render'"
            ))),
        }
    }
}

/// Settings for the page fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub mode: FetchMode,
    pub browser: PathBuf,
    pub max_retries: u32,

    /// Pause between a static request and its browser fallback.
    pub request_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Static,
            browser: PathBuf::from(DEFAULT_BROWSER),
            max_retries: DEFAULT_MAX_RETRIES,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }
}

impl FetchConfig {
    /// Read overrides from `LAGBOKEN_FETCH_MODE`, `LAGBOKEN_BROWSER` and
    /// `LAGBOKEN_MAX_RETRIES`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var("LAGBOKEN_FETCH_MODE") {
            config.mode = FetchMode::parse(&mode)?;
        }

        if let Ok(browser) = std::env::var("LAGBOKEN_BROWSER") {
            config.browser = PathBuf::from(browser);
        }

        if let Ok(retries) = std::env::var("LAGBOKEN_MAX_RETRIES") {
            config.max_retries = parse_max_retries(&retries)?;
        }

        Ok(config)
    }

    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }
}

/// Parse a retry count, at most [`MAX_RETRIES_LIMIT`].
pub fn parse_max_retries(value: &str) -> Result<u32> {
    let retries: u32 = value.trim().parse().map_err(|_| {
        HarvesterError::Config(format!("LAGBOKEN_MAX_RETRIES is not a number: '{value}'"))
    })?;
    if retries > MAX_RETRIES_LIMIT {
        return Err(HarvesterError::Config(format!(
            "LAGBOKEN_MAX_RETRIES is {retries}, at most {MAX_RETRIES_LIMIT} is allowed"
        )));
    }
    Ok(retries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_topic_url_valid() {
        assert!(validate_topic_url(DEFAULT_TOPIC_URL).is_ok());
        assert!(validate_topic_url("http://localhost:8080/topic/").is_ok());
    }

    #[test]
    fn test_validate_topic_url_invalid() {
        assert!(validate_topic_url("").is_err());
        assert!(validate_topic_url("lagboken.se/start").is_err());
        assert!(validate_topic_url("/lagboken/start/").is_err());
        assert!(validate_topic_url("mailto:info@lagboken.se").is_err());
    }

    #[test]
    fn test_crawl_config_defaults() {
        let config = CrawlConfig::new([DEFAULT_TOPIC_URL]);
        assert_eq!(config.topic_urls.len(), 1);
        assert!(config.scrape_individual_laws);
        assert_eq!(config.max_total_laws, None);
        assert_eq!(
            config.request_delay,
            Duration::from_millis(DEFAULT_REQUEST_DELAY_MS)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_crawl_config_rejects_empty_topics() {
        let config = CrawlConfig::new(Vec::<String>::new());
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_crawl_config_rejects_zero_quota() {
        let config = CrawlConfig::new([DEFAULT_TOPIC_URL]).with_max_laws_per_topic(Some(0));
        assert!(matches!(
            config.validate(),
            Err(HarvesterError::InvalidQuota {
                name: "max_laws_per_topic",
                value: 0
            })
        ));
    }

    #[test]
    fn test_crawl_config_rejects_bad_url() {
        let config = CrawlConfig::new([DEFAULT_TOPIC_URL, "not a url"]);
        assert!(matches!(
            config.validate(),
            Err(HarvesterError::InvalidUrl(url)) if url == "not a url"
        ));
    }

    #[test]
    fn test_parse_max_retries() {
        assert_eq!(parse_max_retries("0").unwrap(), 0);
        assert_eq!(parse_max_retries(" 5 ").unwrap(), 5);
        assert!(parse_max_retries("many").unwrap_err().is_configuration());
        assert!(parse_max_retries("4294967295").unwrap_err().is_configuration());
        assert!(parse_max_retries("4294967296").is_err());
    }

    #[test]
    fn test_fetch_mode_parse() {
        assert_eq!(FetchMode::parse("static").unwrap(), FetchMode::Static);
        assert_eq!(FetchMode::parse(" Render ").unwrap(), FetchMode::Render);
        assert!(FetchMode::parse("selenium").is_err());
    }
}
