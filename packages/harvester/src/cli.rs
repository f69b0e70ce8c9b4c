//! Command-line interface for the harvester.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{
    validate_topic_url, CrawlConfig, FetchConfig, FetchMode, DEFAULT_DB_PATH,
    DEFAULT_REQUEST_DELAY_MS, DEFAULT_TOPIC_URL,
};
use crate::error::{HarvesterError, Result};
use crate::fetcher::{create_fetcher, PageFetcher};
use crate::law::scrape_law_page;
use crate::metadata::LINK_URL_FIELD;
use crate::orchestrator::{CrawlEvent, CrawlOrchestrator};
use crate::output::{
    crawl_file_name, law_file_name, resolve_output_path, save_json, topic_file_name,
};
use crate::pacing::RequestPacer;
use crate::pagination::PaginationWalker;
use crate::store::{CorpusStore, CrawledPage, RecordingFetcher, SqliteStore};
use crate::types::{CrawlResult, LawMetadata, TopicPage};

/// Laws listed per topic in the summary.
const PREVIEW_LAWS: usize = 5;

/// Width used when wrapping descriptions.
const WRAP_WIDTH: usize = 76;

/// Lagboken Harvester - Crawl Swedish statute references from lagboken.se.
#[derive(Parser)]
#[command(name = "lagboken-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl one or more topics and the laws listed on them.
    Crawl {
        /// Topic page URLs (default: the labour law topic)
        topic_urls: Vec<String>,

        /// Maximum laws taken from each topic
        #[arg(long)]
        max_laws_per_topic: Option<usize>,

        /// Maximum laws across all topics
        #[arg(long)]
        max_total_laws: Option<usize>,

        /// Only collect law links, do not fetch individual law pages
        #[arg(long)]
        links_only: bool,

        /// Delay between requests in milliseconds
        #[arg(long, default_value_t = DEFAULT_REQUEST_DELAY_MS)]
        delay_ms: u64,

        /// Fall back to a headless browser for pages without links
        #[arg(long)]
        render: bool,

        /// Record every fetched page in this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output file or directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Collect the law links of a single topic.
    Topic {
        /// Topic page URL
        url: String,

        /// Do not follow pagination
        #[arg(long)]
        single_page: bool,

        /// Output file or directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scrape the metadata of a single law page.
    Law {
        /// Law page URL
        url: String,

        /// Output file or directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch one page and save it in the corpus store.
    Fetch {
        /// Page URL
        url: String,

        /// SQLite database path
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
    },

    /// Inspect the corpus store.
    Db {
        /// SQLite database path
        #[arg(long, default_value = DEFAULT_DB_PATH, global = true)]
        db: PathBuf,

        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
pub enum DbAction {
    /// Create the database and its table.
    Init,

    /// List the most recently crawled pages.
    View {
        /// Number of pages to list
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List the links of a stored page.
    Links {
        /// Page URL as stored
        url: String,
    },
}

/// Process exit status for a failed run.
///
/// Configuration errors are rejected before any request and use the same
/// status as clap's usage errors.
#[must_use]
pub fn exit_code(error: &HarvesterError) -> i32 {
    if error.is_configuration() {
        2
    } else {
        1
    }
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            topic_urls,
            max_laws_per_topic,
            max_total_laws,
            links_only,
            delay_ms,
            render,
            db,
            output,
        } => {
            let topic_urls = if topic_urls.is_empty() {
                vec![DEFAULT_TOPIC_URL.to_string()]
            } else {
                topic_urls
            };
            let mut config = CrawlConfig::new(topic_urls)
                .with_max_laws_per_topic(max_laws_per_topic)
                .with_max_total_laws(max_total_laws)
                .with_request_delay(Duration::from_millis(delay_ms));
            if links_only {
                config = config.links_only();
            }
            crawl_command(config, render, db.as_deref(), output.as_deref())
        }
        Commands::Topic {
            url,
            single_page,
            output,
        } => topic_command(&url, single_page, output.as_deref()),
        Commands::Law { url, output } => law_command(&url, output.as_deref()),
        Commands::Fetch { url, db } => fetch_command(&url, &db),
        Commands::Db { db, action } => db_command(&db, action),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Build the configured fetcher, optionally recording pages in a store.
fn build_fetcher(render: bool, delay: Duration, db: Option<&Path>) -> Result<Box<dyn PageFetcher>> {
    let mut fetch_config = FetchConfig::from_env()?.with_request_delay(delay);
    if render {
        fetch_config = fetch_config.with_mode(FetchMode::Render);
    }

    let fetcher = create_fetcher(&fetch_config)
        .map_err(|e| HarvesterError::Config(format!("cannot create HTTP client: {e}")))?;

    match db {
        Some(path) => {
            let store = SqliteStore::open(path);
            store.init()?;
            Ok(Box::new(RecordingFetcher::new(fetcher, store)))
        }
        None => Ok(fetcher),
    }
}

fn default_delay() -> Duration {
    Duration::from_millis(DEFAULT_REQUEST_DELAY_MS)
}

fn wrapped(text: &str, indent: &str) -> String {
    let options = textwrap::Options::new(WRAP_WIDTH)
        .initial_indent(indent)
        .subsequent_indent(indent);
    textwrap::fill(text, options)
}

/// Execute the crawl command.
fn crawl_command(
    config: CrawlConfig,
    render: bool,
    db: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    // Validate inputs before making HTTP requests
    config.validate()?;
    let started = Utc::now();
    let output_path = resolve_output_path(
        output,
        &crawl_file_name(config.scrape_individual_laws, started),
    )?;

    println!(
        "{} {} topic(s){}",
        style("Crawling").bold(),
        style(config.topic_urls.len()).cyan(),
        if config.scrape_individual_laws {
            ""
        } else {
            " (links only)"
        }
    );
    println!();

    let fetcher = build_fetcher(render, config.request_delay, db)?;
    let pb = spinner();
    let progress = pb.clone();
    let mut orchestrator = CrawlOrchestrator::new(fetcher, config)?.on_progress(move |event| {
        match event {
            CrawlEvent::TopicStarted { index, total, url } => {
                progress.set_message(format!("Topic {index}/{total}: {url}"));
            }
            CrawlEvent::TopicSkipped { url } => {
                progress.println(format!("  {} {url}", style("Skipped").yellow()));
            }
            CrawlEvent::LawStarted { index, title, .. } => {
                progress.set_message(format!("Law {index}: {title}"));
            }
        }
    });

    let result = orchestrator.run();
    pb.finish_and_clear();

    print_crawl_summary(&result);

    save_json(&result, &output_path)?;
    println!();
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output_path.display()
    );

    Ok(())
}

fn print_crawl_summary(result: &CrawlResult) {
    for topic in &result.topic_pages {
        print_topic(topic);
    }

    let detailed = result.all_laws.iter().filter(|law| law.is_detailed()).count();
    println!(
        "{} {} topic(s), {} law(s), {} with metadata",
        style("Done:").bold(),
        result.total_topics_scraped,
        result.total_laws_scraped,
        detailed
    );
    let fallback = result.total_laws_scraped - detailed;
    if fallback > 0 && detailed > 0 {
        println!("  Without metadata: {}", style(fallback).yellow().bold());
    }
}

fn print_topic(topic: &TopicPage) {
    println!("  Topic: {}", style(topic.topic_info.display_title()).green());
    println!("  URL: {}", topic.url);
    if let Some(description) = &topic.topic_info.description {
        println!("{}", wrapped(description, "    "));
    }
    println!("  Laws found: {}", topic.total_laws_found);
    for law in topic.laws.iter().take(PREVIEW_LAWS) {
        println!("    - {} ({})", law.title, style(&law.reference).cyan());
    }
    if topic.laws.len() > PREVIEW_LAWS {
        println!("    ... and {} more", topic.laws.len() - PREVIEW_LAWS);
    }
    println!();
}

/// Execute the topic command.
fn topic_command(url: &str, single_page: bool, output: Option<&Path>) -> Result<()> {
    validate_topic_url(url)?;
    if let Some(output) = output {
        resolve_output_path(Some(output), "topic.json")?;
    }

    println!("{} {}", style("Scraping topic").bold(), style(url).cyan());
    println!();

    let fetcher = build_fetcher(false, default_delay(), None)?;
    let mut pacer = RequestPacer::new(default_delay());
    let pb = spinner();
    pb.set_message("Collecting law links...");

    let mut walker = PaginationWalker::new(&*fetcher, &mut pacer);
    if single_page {
        walker = walker.single_page();
    }
    let topic = match walker.walk(url) {
        Ok(topic) => topic,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    print_topic(&topic);

    let name = topic_file_name(topic.topic_info.display_title(), topic.scraped_at);
    let output_path = resolve_output_path(output, &name)?;
    save_json(&topic, &output_path)?;
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output_path.display()
    );

    Ok(())
}

fn print_law(law: &LawMetadata) {
    println!("  Title: {}", style(&law.title).green());
    if !law.description.is_empty() {
        println!("{}", wrapped(&law.description, "    "));
    }
    for (label, value) in &law.metadata {
        if label != LINK_URL_FIELD {
            println!("  {label}: {value}");
        }
    }
    if let Some(link) = law.metadata.get(LINK_URL_FIELD) {
        println!("  {LINK_URL_FIELD}: {}", style(link).underlined());
    }
    if !law.important_laws.is_empty() {
        println!("  Important laws: {}", law.important_laws.len());
        let synthesized = law.important_laws.iter().filter(|l| l.url_synthesized).count();
        if synthesized > 0 {
            println!("  Unconfirmed URLs: {}", style(synthesized).yellow().bold());
        }
    }
}

/// Execute the law command.
fn law_command(url: &str, output: Option<&Path>) -> Result<()> {
    validate_topic_url(url)?;
    if let Some(output) = output {
        resolve_output_path(Some(output), "law.json")?;
    }

    println!("{} {}", style("Scraping law").bold(), style(url).cyan());
    println!();

    let fetcher = build_fetcher(false, default_delay(), None)?;
    let pb = spinner();
    pb.set_message("Fetching law page...");

    let law = match scrape_law_page(&*fetcher, url) {
        Ok(law) => law,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    print_law(&law);

    let reference = law.metadata.get("SFS nr").map(String::as_str);
    let output_path = resolve_output_path(output, &law_file_name(reference, law.scraped_at))?;
    save_json(&law, &output_path)?;
    println!();
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output_path.display()
    );

    Ok(())
}

/// Execute the fetch command.
fn fetch_command(url: &str, db: &Path) -> Result<()> {
    validate_topic_url(url)?;
    let store = SqliteStore::open(db);
    store.init()?;
    let fetcher = build_fetcher(false, default_delay(), None)?;

    let pb = spinner();
    pb.set_message(format!("Fetching {url}..."));
    let fetched = fetcher.fetch(url);
    pb.finish_and_clear();

    match fetched {
        Ok(document) => {
            let page = CrawledPage::from_document(&document);
            store.save(&page)?;
            println!(
                "{} {} ({}, {} links)",
                style("Saved").green().bold(),
                url,
                document.status(),
                document.anchors().len()
            );
            Ok(())
        }
        Err(e) => {
            store.upsert(&CrawledPage::failed(url, &e.to_string()));
            println!("{} {url}", style("Recorded failure for").yellow().bold());
            Err(HarvesterError::fetch(url, e))
        }
    }
}

/// Execute a db subcommand.
fn db_command(db: &Path, action: DbAction) -> Result<()> {
    let store = SqliteStore::open(db);

    match action {
        DbAction::Init => {
            store.init()?;
            println!(
                "{} {}",
                style("Initialized").green().bold(),
                store.path().display()
            );
        }
        DbAction::View { limit } => {
            println!(
                "{} {} page(s) in {}",
                style("Store:").bold(),
                store.count()?,
                store.path().display()
            );
            for page in store.recent(limit)? {
                println!();
                println!("  [{}] {}", page.id, style(&page.url).cyan());
                println!("    Title: {}", page.title.as_deref().unwrap_or("-"));
                println!("    Status: {}", page.status_code);
                println!("    Crawled: {}", page.crawled_at);
                println!("    HTML: {} chars, text: {} chars", page.html_len, page.text_len);
            }
        }
        DbAction::Links { url } => match store.links_for(&url)? {
            Some(links) => {
                println!("{} {} link(s)", style("Found").bold(), links.len());
                for link in links {
                    println!("  {} {}", link.href, style(&link.text).dim());
                }
            }
            None => {
                return Err(HarvesterError::NotStored {
                    url,
                    path: store.path().display().to_string(),
                });
            }
        },
    }

    Ok(())
}
