//! HTTP client wrapper for downloading pages from lagboken.se.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::FetchError;

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("lagboken-harvester/", env!("CARGO_PKG_VERSION"));

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Create a configured HTTP client.
///
/// # Returns
/// A `reqwest::blocking::Client` configured with appropriate timeout and user agent.
pub fn create_client() -> Result<Client, FetchError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// A successfully downloaded page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub status: u16,
    pub body: String,
}

/// Download a page as text with retry logic.
///
/// Uses exponential backoff for transient failures (network errors, 5xx responses).
/// Client errors (4xx) are returned immediately.
///
/// # Arguments
/// * `client` - HTTP client to use
/// * `url` - URL to download from
/// * `max_retries` - Retries after the first attempt
pub fn download_text(client: &Client, url: &str, max_retries: u32) -> Result<Downloaded, FetchError> {
    let attempts = max_retries.saturating_add(1);
    let mut last_error: Option<String> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            // Exponential backoff: 500ms, 1000ms, 2000ms
            let delay = RETRY_BASE_DELAY_MS * (1 << (attempt - 1).min(6));
            tracing::debug!(attempt, delay_ms = delay, url, "Retrying after delay");
            thread::sleep(Duration::from_millis(delay));
        }

        match client.get(url).send() {
            Ok(response) => {
                let status = response.status();

                // Retry on server errors (5xx)
                if status.is_server_error() {
                    tracing::warn!(
                        status = %status,
                        attempt = attempt + 1,
                        attempts,
                        url,
                        "Server error, will retry"
                    );
                    last_error = Some(format!("Server error: {status}"));
                    continue;
                }

                // Don't retry client errors (4xx) - they won't succeed
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }

                let body = response.text()?;
                return Ok(Downloaded {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                // Retry on connection/timeout errors
                if e.is_connect() || e.is_timeout() {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        attempts,
                        url,
                        "Connection error, will retry"
                    );
                    last_error = Some(e.to_string());
                    continue;
                }
                // Other errors (like invalid URL) - don't retry
                return Err(FetchError::Http(e));
            }
        }
    }

    // All retries exhausted
    Err(FetchError::RetriesExhausted {
        attempts,
        message: last_error.unwrap_or_else(|| "Unknown error".to_string()),
    })
}
