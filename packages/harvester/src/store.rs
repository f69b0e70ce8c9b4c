//! SQLite corpus store.
//!
//! Keeps one row per fetched URL in the `crawled_pages` table. Every
//! operation opens its own connection and commits a single statement.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use url::Url;

use crate::document::{Anchor, Document};
use crate::error::{FetchError, Result};
use crate::fetcher::PageFetcher;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS crawled_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT UNIQUE NOT NULL,
    domain TEXT,
    path TEXT,
    title TEXT,
    html_content TEXT,
    text_content TEXT,
    status_code INTEGER,
    crawled_at TEXT,
    metadata TEXT
)";

const UPSERT_PAGE: &str = "INSERT INTO crawled_pages
    (url, domain, path, title, html_content, text_content, status_code, crawled_at, metadata)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(url) DO UPDATE SET
        domain = excluded.domain,
        path = excluded.path,
        title = excluded.title,
        html_content = excluded.html_content,
        text_content = excluded.text_content,
        status_code = excluded.status_code,
        crawled_at = excluded.crawled_at,
        metadata = excluded.metadata";

/// One row of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    pub url: String,
    pub domain: String,
    pub path: String,
    pub title: Option<String>,
    pub html_content: Option<String>,
    pub text_content: Option<String>,

    /// HTTP status, 0 when the fetch failed.
    pub status_code: u16,
    pub crawled_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl CrawledPage {
    /// Row for a successfully fetched page.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        let url = document.url();
        Self {
            url: url.to_string(),
            domain: url.host_str().unwrap_or_default().to_string(),
            path: url.path().to_string(),
            title: document.title(),
            html_content: Some(document.raw_html().to_string()),
            text_content: Some(document.text().to_string()),
            status_code: document.status(),
            crawled_at: Utc::now(),
            metadata: Some(json!({ "links": document.anchors().len() })),
        }
    }

    /// Row for a page that could not be fetched.
    #[must_use]
    pub fn failed(url: &str, error: &str) -> Self {
        let parsed = Url::parse(url).ok();
        Self {
            url: url.to_string(),
            domain: parsed
                .as_ref()
                .and_then(Url::host_str)
                .unwrap_or_default()
                .to_string(),
            path: parsed.as_ref().map(|u| u.path().to_string()).unwrap_or_default(),
            title: None,
            html_content: None,
            text_content: None,
            status_code: 0,
            crawled_at: Utc::now(),
            metadata: Some(json!({ "error": error })),
        }
    }
}

/// Overview of a stored page, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub status_code: u16,
    pub crawled_at: String,
    pub html_len: usize,
    pub text_len: usize,
}

/// Persistence keyed by URL.
pub trait CorpusStore {
    /// Insert or replace the row for `page.url`. Returns whether it was written.
    fn upsert(&self, page: &CrawledPage) -> bool;
}

impl<S: CorpusStore + ?Sized> CorpusStore for &S {
    fn upsert(&self, page: &CrawledPage) -> bool {
        (**self).upsert(page)
    }
}

/// Corpus store backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// Create the database file, its directory and the table if missing.
    pub fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.connect()?.execute(CREATE_TABLE, [])?;
        tracing::debug!(path = %self.path.display(), "Corpus store ready");
        Ok(())
    }

    /// Write one page, replacing any earlier row for the same URL.
    pub fn save(&self, page: &CrawledPage) -> Result<()> {
        let metadata = page
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.connect()?.execute(
            UPSERT_PAGE,
            params![
                page.url,
                page.domain,
                page.path,
                page.title,
                page.html_content,
                page.text_content,
                page.status_code,
                page.crawled_at.to_rfc3339(),
                metadata,
            ],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.connect()?
                .query_row("SELECT COUNT(*) FROM crawled_pages", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// The most recently crawled pages, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<PageSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, url, title, status_code, crawled_at,
                    LENGTH(COALESCE(html_content, '')), LENGTH(COALESCE(text_content, ''))
             FROM crawled_pages ORDER BY crawled_at DESC, id DESC LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| {
            Ok(PageSummary {
                id: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
                status_code: row.get::<_, Option<u16>>(3)?.unwrap_or_default(),
                crawled_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                html_len: row.get::<_, i64>(5)?.try_into().unwrap_or_default(),
                text_len: row.get::<_, i64>(6)?.try_into().unwrap_or_default(),
            })
        })?;

        let pages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    /// Anchors of a stored page, re-parsed from its HTML.
    ///
    /// `None` when the URL is not in the store or was stored without HTML.
    pub fn links_for(&self, url: &str) -> Result<Option<Vec<Anchor>>> {
        let Ok(base) = Url::parse(url) else {
            return Ok(None);
        };

        let html: Option<Option<String>> = self
            .connect()?
            .query_row(
                "SELECT html_content FROM crawled_pages WHERE url = ?1",
                [url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(html
            .flatten()
            .map(|html| Document::parse(base, 200, html).anchors().to_vec()))
    }
}

impl CorpusStore for SqliteStore {
    fn upsert(&self, page: &CrawledPage) -> bool {
        match self.save(page) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(url = %page.url, error = %e, "Failed to store page");
                false
            }
        }
    }
}

/// Fetcher decorator that records every fetched page in a corpus store.
pub struct RecordingFetcher<F, S> {
    inner: F,
    store: S,
}

impl<F: PageFetcher, S: CorpusStore> RecordingFetcher<F, S> {
    pub fn new(inner: F, store: S) -> Self {
        Self { inner, store }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: PageFetcher, S: CorpusStore> PageFetcher for RecordingFetcher<F, S> {
    fn fetch(&self, url: &str) -> std::result::Result<Document, FetchError> {
        let document = self.inner.fetch(url)?;
        let stored = self.store.upsert(&CrawledPage::from_document(&document));
        tracing::debug!(url, stored, "Recorded page");
        Ok(document)
    }
}
