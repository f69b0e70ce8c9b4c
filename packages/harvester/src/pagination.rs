//! Topic pagination.
//!
//! A topic on lagboken.se is a sequence of listing pages. [`PaginationWalker`]
//! fetches the seed page, classifies its anchors, decides on a next page and
//! repeats until no next page is found or the next page was already visited.
//!
//! The walk is an explicit state machine:
//!
//! ```text
//! Fetching(url) -> Classifying(doc) -> DecideNext(doc) -> Fetching(next) | Done
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::classifier::{extract_law_links, resolve_href};
use crate::config::validate_topic_url;
use crate::document::{Anchor, Document};
use crate::error::{HarvesterError, Result};
use crate::fetcher::PageFetcher;
use crate::pacing::RequestPacer;
use crate::topic::extract_topic_info;
use crate::types::{LawReference, TopicInfo, TopicPage};

/// Explicit "next" glyph used by the site's pager.
const NEXT_ARROW: &str = "→";

/// Localized and English "next" tokens, in priority order.
const NEXT_TOKENS: &[&str] = &["nästa", "next"];

/// Substrings marking an href as a pager link.
const PAGE_HREF_TOKENS: &[&str] = &["page", "sida"];

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static QUERY_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]page=(\d+)").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PATH_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/page/(\d+)").expect("valid regex"));

/// Page number embedded in a URL or href, if any.
fn embedded_page_number(url: &str) -> Option<u32> {
    QUERY_PAGE
        .captures(url)
        .or_else(|| PATH_PAGE.captures(url))
        .and_then(|caps| caps[1].parse().ok())
}

/// Page number of a listing URL, from `?page=N` or `/page/N`, default 1.
///
/// # Examples
/// ```
/// use lagboken_harvester::pagination::page_number;
///
/// assert_eq!(page_number("https://www.lagboken.se/t/?page=3"), 3);
/// assert_eq!(page_number("https://www.lagboken.se/t/page/2/"), 2);
/// assert_eq!(page_number("https://www.lagboken.se/t/"), 1);
/// ```
#[must_use]
pub fn page_number(url: &str) -> u32 {
    embedded_page_number(url).unwrap_or(1)
}

/// Resolve the first anchor accepted by `accept` to an absolute URL.
fn first_match(document: &Document, accept: impl Fn(&Anchor) -> bool) -> Option<String> {
    document
        .anchors()
        .iter()
        .filter(|anchor| accept(anchor))
        .find_map(|anchor| resolve_href(&anchor.href, document.url()))
}

/// Find the URL of the page following `document`.
///
/// Strategies are tried in order, each taking the first matching anchor:
///
/// 1. text is exactly `→`,
/// 2. text is the next page number,
/// 3. text contains `nästa`, then `next` (case-insensitive),
/// 4. href looks like a pager link and embeds the next page number.
#[must_use]
pub fn find_next_page(document: &Document) -> Option<String> {
    let next_number = page_number(document.url().as_str()).saturating_add(1);
    let next_label = next_number.to_string();

    if let Some(url) = first_match(document, |a| a.text == NEXT_ARROW) {
        tracing::debug!(%url, "Next page by arrow");
        return Some(url);
    }

    if let Some(url) = first_match(document, |a| a.text == next_label) {
        tracing::debug!(%url, "Next page by number");
        return Some(url);
    }

    for token in NEXT_TOKENS {
        if let Some(url) = first_match(document, |a| a.text.to_lowercase().contains(token)) {
            tracing::debug!(%url, token, "Next page by label");
            return Some(url);
        }
    }

    let url = first_match(document, |a| {
        let href = a.href.to_lowercase();
        PAGE_HREF_TOKENS.iter().any(|token| href.contains(token))
            && embedded_page_number(&href) == Some(next_number)
    })?;
    tracing::debug!(%url, "Next page by href");
    Some(url)
}

/// States of one topic walk.
#[derive(Debug)]
pub enum WalkState {
    /// About to fetch this URL.
    Fetching(String),

    /// Page fetched, laws not yet collected.
    Classifying(Box<Document>),

    /// Laws collected, looking for the next page.
    DecideNext(Box<Document>),

    Done,
}

/// Walks the listing pages of one topic.
///
/// Each walk has its own visited set; the walker can be reused for
/// several topics.
pub struct PaginationWalker<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    pacer: &'a mut RequestPacer,
    follow_pages: bool,
}

impl<'a, F: PageFetcher + ?Sized> PaginationWalker<'a, F> {
    pub fn new(fetcher: &'a F, pacer: &'a mut RequestPacer) -> Self {
        Self {
            fetcher,
            pacer,
            follow_pages: true,
        }
    }

    /// Stop after the seed page.
    #[must_use]
    pub fn single_page(mut self) -> Self {
        self.follow_pages = false;
        self
    }

    /// Walk a topic from its seed URL.
    ///
    /// Fails only when the seed page cannot be fetched. A failure on a later
    /// page ends the walk with the laws collected so far.
    pub fn walk(&mut self, seed: &str) -> Result<TopicPage> {
        let seed = validate_topic_url(seed)?.to_string();
        let scraped_at = Utc::now();

        let mut visited: HashSet<String> = HashSet::new();
        let mut laws: Vec<LawReference> = Vec::new();
        let mut topic_info: Option<TopicInfo> = None;
        let mut state = WalkState::Fetching(seed.clone());

        loop {
            state = match state {
                WalkState::Fetching(url) => {
                    visited.insert(url.clone());
                    self.pacer.wait();
                    match self.fetcher.fetch(&url) {
                        Ok(document) => WalkState::Classifying(Box::new(document)),
                        Err(e) if visited.len() == 1 => {
                            return Err(HarvesterError::fetch(url, e));
                        }
                        Err(e) => {
                            tracing::warn!(%url, error = %e, "Page fetch failed, ending topic walk");
                            WalkState::Done
                        }
                    }
                }
                WalkState::Classifying(document) => {
                    if topic_info.is_none() {
                        topic_info = Some(extract_topic_info(&document));
                    }
                    let found = extract_law_links(&document);
                    tracing::info!(
                        url = document.url().as_str(),
                        page = page_number(document.url().as_str()),
                        laws = found.len(),
                        "Classified topic page"
                    );
                    laws.extend(found);

                    if self.follow_pages {
                        WalkState::DecideNext(document)
                    } else {
                        WalkState::Done
                    }
                }
                WalkState::DecideNext(document) => match find_next_page(&document) {
                    Some(next) if visited.contains(&next) => {
                        tracing::debug!(url = %next, "Next page already visited");
                        WalkState::Done
                    }
                    Some(next) => WalkState::Fetching(next),
                    None => WalkState::Done,
                },
                WalkState::Done => break,
            };
        }

        tracing::info!(url = %seed, pages = visited.len(), laws = laws.len(), "Topic walk done");

        Ok(TopicPage {
            url: seed,
            scraped_at,
            topic_info: topic_info.unwrap_or_default(),
            total_laws_found: laws.len(),
            laws,
        })
    }
}

/// Collect the laws of one topic page without following pagination.
pub fn walk_single_page<F: PageFetcher + ?Sized>(
    fetcher: &F,
    pacer: &mut RequestPacer,
    url: &str,
) -> Result<TopicPage> {
    PaginationWalker::new(fetcher, pacer).single_page().walk(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MemoryFetcher;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use url::Url;

    const TOPIC: &str = "https://www.lagboken.se/lagboken/start/arbetsratt/";

    fn doc(url: &str, html: &str) -> Document {
        Document::parse(Url::parse(url).unwrap(), 200, html)
    }

    fn pacer() -> RequestPacer {
        RequestPacer::new(Duration::ZERO)
    }

    #[test]
    fn test_arrow_beats_number_and_label() {
        let d = doc(
            TOPIC,
            r#"<a href="?page=2">Nästa</a><a href="?page=7">2</a><a href="?page=9">→</a>"#,
        );
        assert_eq!(find_next_page(&d).unwrap(), format!("{TOPIC}?page=9"));
    }

    #[test]
    fn test_number_uses_current_page() {
        let d = doc(
            &format!("{TOPIC}?page=2"),
            r#"<a href="?page=1">1</a><a href="?page=2">2</a><a href="?page=3">3</a>"#,
        );
        assert_eq!(find_next_page(&d).unwrap(), format!("{TOPIC}?page=3"));
    }

    #[test]
    fn test_swedish_label_before_english() {
        let d = doc(TOPIC, r#"<a href="/en/">Next</a><a href="/sv/">Nästa sida</a>"#);
        assert_eq!(find_next_page(&d).unwrap(), "https://www.lagboken.se/sv/");
    }

    #[test]
    fn test_pager_href_needs_next_number() {
        let d = doc(
            TOPIC,
            r#"<a href="/t/page/3/">»</a><a href="/t/sida?page=2">»</a>"#,
        );
        assert_eq!(find_next_page(&d).unwrap(), "https://www.lagboken.se/t/sida?page=2");

        let d = doc(TOPIC, r#"<a href="/t/page/3/">»</a>"#);
        assert_eq!(find_next_page(&d), None);
    }

    #[test]
    fn test_no_next_page() {
        let d = doc(TOPIC, r#"<a href="/om-oss">Om oss</a>"#);
        assert_eq!(find_next_page(&d), None);
    }

    #[test]
    fn test_walk_visits_each_page_once() {
        let fetcher = MemoryFetcher::new()
            .with_page(
                TOPIC,
                r#"<h1>Arbetsrätt</h1><a href="/a/">Semesterlag (1977:480)</a><a href="?page=2">2</a>"#,
            )
            .with_page(
                &format!("{TOPIC}?page=2"),
                r#"<h1>Sida två</h1><a href="/b/">Lag om anställningsskydd (1982:80)</a><a href="?page=3">3</a>"#,
            )
            .with_page(
                &format!("{TOPIC}?page=3"),
                r#"<a href="/c/">Diskrimineringslag (2008:567)</a>"#,
            );
        let mut pacer = pacer();

        let topic = PaginationWalker::new(&fetcher, &mut pacer).walk(TOPIC).unwrap();

        assert_eq!(
            fetcher.requests(),
            vec![
                TOPIC.to_string(),
                format!("{TOPIC}?page=2"),
                format!("{TOPIC}?page=3")
            ]
        );
        let refs: Vec<_> = topic.laws.iter().map(|l| l.reference.as_str()).collect();
        assert_eq!(refs, vec!["1977:480", "1982:80", "2008:567"]);
        assert_eq!(topic.total_laws_found, 3);
        assert_eq!(topic.topic_info.title.as_deref(), Some("Arbetsrätt"));
    }

    #[test]
    fn test_walk_stops_on_cycle() {
        let fetcher = MemoryFetcher::new()
            .with_page(TOPIC, r#"<a href="?page=2">Nästa</a>"#)
            .with_page(&format!("{TOPIC}?page=2"), &format!(r#"<a href="{TOPIC}">Next</a>"#));
        let mut pacer = pacer();

        PaginationWalker::new(&fetcher, &mut pacer).walk(TOPIC).unwrap();

        assert_eq!(fetcher.requests().len(), 2);
    }

    #[test]
    fn test_first_page_failure_is_error() {
        let fetcher = MemoryFetcher::new();
        let mut pacer = pacer();

        let err = PaginationWalker::new(&fetcher, &mut pacer)
            .walk(TOPIC)
            .unwrap_err();

        assert!(matches!(err, HarvesterError::Fetch { .. }));
    }

    #[test]
    fn test_later_failure_keeps_collected_laws() {
        let fetcher = MemoryFetcher::new().with_page(
            TOPIC,
            r#"<a href="/a/">Semesterlag (1977:480)</a><a href="?page=2">→</a>"#,
        );
        let mut pacer = pacer();

        let topic = PaginationWalker::new(&fetcher, &mut pacer).walk(TOPIC).unwrap();

        assert_eq!(fetcher.requests().len(), 2);
        assert_eq!(topic.laws.len(), 1);
    }

    #[test]
    fn test_single_page_ignores_pager() {
        let fetcher = MemoryFetcher::new().with_page(
            TOPIC,
            r#"<a href="/a/">Semesterlag (1977:480)</a><a href="?page=2">→</a>"#,
        );
        let mut pacer = pacer();

        let topic = walk_single_page(&fetcher, &mut pacer, TOPIC).unwrap();

        assert_eq!(fetcher.requests(), vec![TOPIC.to_string()]);
        assert_eq!(topic.laws.len(), 1);
    }

    #[test]
    fn test_laws_are_not_deduplicated_across_pages() {
        let fetcher = MemoryFetcher::new()
            .with_page(TOPIC, r#"<a href="/a/">Semesterlag (1977:480)</a><a href="?page=2">2</a>"#)
            .with_page(&format!("{TOPIC}?page=2"), r#"<a href="/a/">Semesterlag (1977:480)</a>"#);
        let mut pacer = pacer();

        let topic = PaginationWalker::new(&fetcher, &mut pacer).walk(TOPIC).unwrap();

        assert_eq!(topic.laws.len(), 2);
    }
}
