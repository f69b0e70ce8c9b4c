//! Title and description of topic listing pages.

use crate::document::{element_text, Document};
use crate::types::TopicInfo;

/// Selectors tried in order for the topic title.
const TITLE_SELECTORS: &[&str] = &["h1", ".page-title", ".topic-title", "[class*=\"title\"]", "h2"];

/// Selectors tried in order for a description paragraph.
const DESCRIPTION_SELECTORS: &[&str] = &[".description", ".topic-description", "p"];

/// Titles this short are navigation noise, not headings.
const MIN_TITLE_CHARS: usize = 6;

const MIN_DESCRIPTION_CHARS: usize = 51;
const MAX_DESCRIPTION_CHARS: usize = 499;

/// URL segments that never name a topic.
const NON_TOPIC_SEGMENTS: &[&str] = &["start", "lagboken"];

/// Extract the title and description of a topic page.
///
/// The title falls back to the last meaningful path segment of the URL
/// (`arbetsratt-och-arbetsmiljoratt` becomes `Arbetsratt Och Arbetsmiljoratt`).
#[must_use]
pub fn extract_topic_info(document: &Document) -> TopicInfo {
    let title = find_title(document).or_else(|| title_from_url(document.url().as_str()));
    let description = find_description(document);

    TopicInfo { title, description }
}

fn find_title(document: &Document) -> Option<String> {
    TITLE_SELECTORS.iter().find_map(|selector| {
        document
            .select_first_text(selector)
            .filter(|text| text.chars().count() >= MIN_TITLE_CHARS)
    })
}

/// Meta description, else the first description-sized paragraph.
pub(crate) fn find_description(document: &Document) -> Option<String> {
    if let Some(meta) = document.select_first_attr(r#"meta[name="description"]"#, "content") {
        return Some(meta);
    }

    DESCRIPTION_SELECTORS.iter().find_map(|selector| {
        let selector = scraper::Selector::parse(selector).ok()?;
        document.html().select(&selector).map(element_text).find(|text| {
            let len = text.chars().count();
            (MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&len)
        })
    })
}

/// Title-cased last meaningful path segment of `url`.
///
/// # Examples
/// ```
/// use lagboken_harvester::topic::title_from_url;
///
/// assert_eq!(
///     title_from_url("https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/").as_deref(),
///     Some("Arbetsratt Och Arbetsmiljoratt")
/// );
/// assert_eq!(title_from_url("https://www.lagboken.se/lagboken/start/"), None);
/// ```
#[must_use]
pub fn title_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .filter(|s| !NON_TOPIC_SEGMENTS.contains(s))
        .last()?;

    let title = segment
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    (!title.is_empty()).then_some(title)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn parse(url: &str, html: &str) -> Document {
        Document::parse(Url::parse(url).unwrap(), 200, html)
    }

    const TOPIC_URL: &str = "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/";

    #[test]
    fn test_title_and_meta_description() {
        let doc = parse(
            TOPIC_URL,
            r#"<html><head><meta name="description" content="Lagar om arbete"></head>
               <body><h1>Arbetsrätt och arbetsmiljörätt</h1></body></html>"#,
        );

        let info = extract_topic_info(&doc);

        assert_eq!(info.title.as_deref(), Some("Arbetsrätt och arbetsmiljörätt"));
        assert_eq!(info.description.as_deref(), Some("Lagar om arbete"));
    }

    #[test]
    fn test_short_headings_are_skipped() {
        let doc = parse(
            TOPIC_URL,
            r#"<body><h1>Start</h1><div class="page-title">Arbetsrätt</div></body>"#,
        );

        assert_eq!(extract_topic_info(&doc).title.as_deref(), Some("Arbetsrätt"));
    }

    #[test]
    fn test_title_falls_back_to_url() {
        let doc = parse(TOPIC_URL, "<body><p>kort</p></body>");

        let info = extract_topic_info(&doc);

        assert_eq!(info.title.as_deref(), Some("Arbetsratt Och Arbetsmiljoratt"));
        assert_eq!(info.description, None);
    }

    #[test]
    fn test_description_paragraph_length_window() {
        let long = "x".repeat(600);
        let good = "Här finns de viktigaste lagarna inom arbetsrätten samlade på ett ställe.";
        let html = format!("<body><h1>Arbetsrätt</h1><p>Kort.</p><p>{long}</p><p>{good}</p></body>");
        let doc = parse(TOPIC_URL, &html);

        assert_eq!(extract_topic_info(&doc).description.as_deref(), Some(good));
    }

    #[test]
    fn test_title_from_url_ignores_query() {
        assert_eq!(
            title_from_url("https://www.lagboken.se/lagboken/start/diskriminering/?page=2").as_deref(),
            Some("Diskriminering")
        );
    }
}
