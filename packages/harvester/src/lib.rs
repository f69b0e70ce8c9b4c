//! Lagboken Harvester - Crawl Swedish statute references from lagboken.se.
//!
//! This crate walks the paginated topic pages of lagboken.se, classifies
//! their links into statute references (`YYYY:NNN` SFS numbers), and scrapes
//! each law page for its metadata block. Results are written as JSON, and
//! fetched pages can be kept in a SQLite corpus store.
//!
//! # Example
//!
//! ```
//! use lagboken_harvester::{extract_metadata, CrawlConfig};
//!
//! let metadata = extract_metadata("SFS nr: 1977:480\nUtfärdad: 1977-06-09\n1 § Text");
//! assert_eq!(metadata["SFS nr"], "1977:480");
//!
//! let config = CrawlConfig::new(["https://www.lagboken.se/lagboken/start/"])
//!     .with_max_total_laws(Some(10));
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`config`]: Configuration constants and validation
//! - [`types`]: Core data types (LawReference, TopicPage, CrawlResult, etc.)
//! - [`error`]: Error types and Result alias
//! - [`http`]: HTTP client with retries
//! - [`document`]: Parsed page with flattened text and anchors
//! - [`fetcher`]: Static and rendering-fallback page fetchers
//! - [`classifier`]: Law link classification
//! - [`metadata`]: Law page metadata extraction
//! - [`topic`]: Topic page title and description
//! - [`law`]: Law page scraping
//! - [`pagination`]: Topic pagination walker
//! - [`pacing`]: Fixed-delay request pacing
//! - [`orchestrator`]: Multi-topic crawl with quotas
//! - [`store`]: SQLite corpus store
//! - [`output`]: JSON output files
//! - [`cli`]: Command-line interface

pub mod classifier;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod law;
pub mod metadata;
pub mod orchestrator;
pub mod output;
pub mod pacing;
pub mod pagination;
pub mod store;
pub mod topic;
pub mod types;

// Re-export commonly used items
pub use classifier::{classify_anchor, extract_law_links};
pub use config::{CrawlConfig, FetchConfig, FetchMode};
pub use document::Document;
pub use error::{FetchError, HarvesterError, Result};
pub use fetcher::{create_fetcher, PageFetcher};
pub use law::scrape_law_page;
pub use metadata::extract_metadata;
pub use orchestrator::CrawlOrchestrator;
pub use pagination::PaginationWalker;
pub use store::{CorpusStore, SqliteStore};
pub use types::{CrawlResult, LawEntry, LawMetadata, LawReference, TopicInfo, TopicPage};
