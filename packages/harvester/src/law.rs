//! Scraping of individual law pages.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::document::Document;
use crate::error::{HarvesterError, Result};
use crate::fetcher::PageFetcher;
use crate::metadata::{extract_important_laws, extract_metadata, resolve_register_link};
use crate::topic::find_description;
use crate::types::LawMetadata;

const TITLE_SELECTORS: &[&str] = &["h1", ".law-title", ".page-title", "[class*=\"title\"]", "h2"];

const MIN_TITLE_CHARS: usize = 6;

/// Title used when the page names no law at all.
pub const UNKNOWN_LAW_TITLE: &str = "Unknown Law";

/// `Name (YYYY:NNN)` anywhere in the page text.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NAMED_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^,.\n]+?)\s*\((\d{4}:\d+)\)").expect("valid regex"));

/// Fetch a law page and extract its metadata.
pub fn scrape_law_page<F: PageFetcher + ?Sized>(fetcher: &F, url: &str) -> Result<LawMetadata> {
    tracing::info!(url, "Scraping law page");
    let document = fetcher
        .fetch(url)
        .map_err(|e| HarvesterError::fetch(url, e))?;
    Ok(extract_law_page(&document))
}

/// Extract title, description, metadata and important laws from a fetched law page.
///
/// Never fails: a page without a metadata block yields an empty map, and a
/// page without any text yields [`UNKNOWN_LAW_TITLE`] and nothing else.
#[must_use]
pub fn extract_law_page(document: &Document) -> LawMetadata {
    if document.text().trim().is_empty() {
        tracing::warn!(url = document.url().as_str(), "Law page has no text");
    }

    let mut metadata = extract_metadata(document.text());
    resolve_register_link(&mut metadata, document);
    let important_laws = extract_important_laws(document);

    tracing::debug!(
        url = document.url().as_str(),
        fields = metadata.len(),
        important_laws = important_laws.len(),
        "Extracted law page"
    );

    LawMetadata {
        url: document.url().to_string(),
        scraped_at: Utc::now(),
        title: extract_law_title(document),
        description: find_description(document).unwrap_or_default(),
        metadata,
        important_laws,
    }
}

/// Title of a law page.
///
/// Tries the usual heading selectors, then a `Name (YYYY:NNN)` mention in the
/// page text, then gives up with [`UNKNOWN_LAW_TITLE`].
#[must_use]
pub fn extract_law_title(document: &Document) -> String {
    let heading = TITLE_SELECTORS.iter().find_map(|selector| {
        document
            .select_first_text(selector)
            .filter(|text| text.chars().count() >= MIN_TITLE_CHARS)
    });
    if let Some(heading) = heading {
        return heading;
    }

    match NAMED_REFERENCE.captures(document.text()) {
        Some(caps) => {
            let name = caps[1].trim();
            let reference = &caps[2];
            if name.is_empty() {
                format!("Lag ({reference})")
            } else {
                format!("{name} ({reference})")
            }
        }
        None => UNKNOWN_LAW_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use pretty_assertions::assert_eq;
    use url::Url;

    const LAW_URL: &str =
        "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/semesterlag-1977480/";

    fn parse(html: &str) -> Document {
        Document::parse(Url::parse(LAW_URL).unwrap(), 200, html)
    }

    #[test]
    fn test_extract_law_page() {
        let doc = parse(
            r#"<html><head><meta name="description" content="Semesterlagen reglerar rätten till semester."></head>
            <body><h1>Semesterlag (1977:480)</h1>
            <div><p>SFS nr:</p><p>1977:480</p></div>
            <div>Utfärdad: 1977-06-09</div>
            <div>Departement/myndighet: Arbetsmarknadsdepartementet</div>
            <p>1 § Arbetstagare har rätt till semesterledighet.</p>
            </body></html>"#,
        );

        let law = extract_law_page(&doc);

        assert_eq!(law.url, LAW_URL);
        assert_eq!(law.title, "Semesterlag (1977:480)");
        assert_eq!(law.description, "Semesterlagen reglerar rätten till semester.");
        assert_eq!(law.metadata.get("Utfärdad").map(String::as_str), Some("1977-06-09"));
        assert_eq!(
            law.metadata.get("Departement").map(String::as_str),
            Some("Arbetsmarknadsdepartementet")
        );
        assert!(law.important_laws.is_empty());
    }

    #[test]
    fn test_title_from_text_reference() {
        let doc = parse("<body><div>Se lag. Semesterlag (1977:480), i lydelse</div></body>");
        assert_eq!(extract_law_title(&doc), "Semesterlag (1977:480)");
    }

    #[test]
    fn test_unknown_title() {
        let doc = parse("<body><p>Inget här</p></body>");
        assert_eq!(extract_law_title(&doc), UNKNOWN_LAW_TITLE);
    }

    #[test]
    fn test_empty_page_yields_empty_record() {
        let doc = parse("<html><body>  </body></html>");

        let law = extract_law_page(&doc);

        assert_eq!(law.url, LAW_URL);
        assert_eq!(law.title, UNKNOWN_LAW_TITLE);
        assert_eq!(law.description, "");
        assert!(law.metadata.is_empty());
        assert!(law.important_laws.is_empty());
    }

    #[test]
    fn test_empty_law_page_is_still_detailed_in_crawl() {
        use crate::config::CrawlConfig;
        use crate::fetcher::MemoryFetcher;
        use crate::orchestrator::CrawlOrchestrator;
        use std::time::Duration;

        let topic = "https://www.lagboken.se/lagboken/start/arbetsratt/";
        let fetcher = MemoryFetcher::new()
            .with_page(topic, r#"<a href="semesterlag/">Semesterlag (1977:480)</a>"#)
            .with_page(format!("{topic}semesterlag/"), "<html><body></body></html>");
        let config = CrawlConfig::new([topic]).with_request_delay(Duration::ZERO);

        let result = CrawlOrchestrator::new(fetcher, config).unwrap().run();

        assert!(result.all_laws[0].is_detailed());
        assert_eq!(result.all_laws[0].title(), UNKNOWN_LAW_TITLE);
    }

    #[test]
    fn test_fetch_failure_carries_url() {
        struct Down;
        impl PageFetcher for Down {
            fn fetch(&self, _url: &str) -> std::result::Result<Document, FetchError> {
                Err(FetchError::Status { status: 500 })
            }
        }

        match scrape_law_page(&Down, LAW_URL) {
            Err(HarvesterError::Fetch { url, .. }) => assert_eq!(url, LAW_URL),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
}
