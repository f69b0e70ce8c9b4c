//! Error types for the harvester.
//!
//! Uses the dual-error pattern: `HarvesterError` for library consumers
//! with detailed error context, and `FetchError` for the page fetcher
//! boundary. Fetch errors are recovered one level up (by the pagination
//! walker or the per-law loop); configuration errors are fatal for a run.

use thiserror::Error;

/// Errors raised while fetching a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (network, timeout, body decoding).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// Transient failures persisted after all retry attempts.
    #[error("Giving up after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// The headless browser ran but did not produce a document.
    #[error("Renderer failed: {0}")]
    Renderer(String),

    /// The headless browser could not be started.
    #[error("Failed to start renderer: {0}")]
    RendererSpawn(#[source] std::io::Error),

    /// The URL could not be parsed.
    #[error("Invalid URL: '{0}'")]
    InvalidUrl(String),
}

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// A topic or page URL is not an absolute http(s) URL.
    #[error("Invalid URL: '{0}'. Expected an absolute http(s) URL (e.g., https://www.lagboken.se/lagboken/start/)")]
    InvalidUrl(String),

    /// A quota was given but is not usable.
    #[error("Invalid quota for {name}: {value}. Expected a positive number")]
    InvalidQuota { name: &'static str, value: usize },

    /// Any other configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fetching a page failed.
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The corpus store holds no HTML for a URL.
    #[error("No stored HTML for {url} in {path}")]
    NotStored { url: String, path: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Corpus store error.
    #[error("Corpus store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl HarvesterError {
    /// Wrap a fetch error with the URL it happened on.
    pub fn fetch(url: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Whether this error comes from invalid run configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_) | Self::InvalidQuota { .. } | Self::Config(_)
        )
    }
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
