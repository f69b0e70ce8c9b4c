//! Law link classification.
//!
//! Decides whether an anchor points at a statute and extracts the canonical
//! `(title, reference, url)` triple. Acceptance is a loose substring test on
//! href and text; only anchors that also carry a `YYYY:NNN` reference become
//! laws.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::document::Document;
use crate::types::LawReference;

/// Substrings that make an href or link text a law candidate.
const LAW_LINK_TOKENS: &[&str] = &["lag", "sfs", "197", "198", "199", "200", "201", "202"];

/// `(YYYY:NNN)` embedded in link text.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PARENTHESIZED_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4}:\d+)\)").expect("valid regex"));

/// The parenthesized reference including leading whitespace, for stripping.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PARENTHESIZED_REFERENCE_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d{4}:\d+\)").expect("valid regex"));

/// Bare `YYYY:NNN` in an href.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BARE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}):(\d+)").expect("valid regex"));

/// Check if a link looks like a law link.
///
/// # Examples
/// ```
/// use lagboken_harvester::classifier::is_law_link;
///
/// assert!(is_law_link("/lagboken/start/semesterlag-1977480/", ""));
/// assert!(is_law_link("/x/", "Semesterlag (1977:480)"));
/// assert!(!is_law_link("/om-oss", "Om oss"));
/// ```
#[must_use]
pub fn is_law_link(href: &str, text: &str) -> bool {
    let href = href.to_lowercase();
    let text = text.to_lowercase();
    LAW_LINK_TOKENS
        .iter()
        .any(|token| href.contains(token) || text.contains(token))
}

/// Split a line like `Semesterlag (1977:480)` into title and reference.
///
/// # Examples
/// ```
/// use lagboken_harvester::classifier::parse_reference_line;
///
/// assert_eq!(
///     parse_reference_line("Semesterlag (1977:480)"),
///     Some(("Semesterlag".to_string(), "1977:480".to_string()))
/// );
/// assert_eq!(parse_reference_line("Semesterlag"), None);
/// ```
#[must_use]
pub fn parse_reference_line(line: &str) -> Option<(String, String)> {
    let reference = PARENTHESIZED_REFERENCE.captures(line)?.get(1)?.as_str();
    let title = PARENTHESIZED_REFERENCE_STRIP.replace_all(line, "");
    Some((title.trim().to_string(), reference.to_string()))
}

/// Resolve an href against the page it appears on.
///
/// Root-relative hrefs resolve against the origin of `base`, other relative
/// forms (including `?query`) against `base` itself. Only http(s) results are
/// returned; `javascript:` and `mailto:` links yield `None`.
///
/// # Examples
/// ```
/// use lagboken_harvester::classifier::resolve_href;
/// use url::Url;
///
/// let base = Url::parse("https://www.lagboken.se/lagboken/start/arbetsratt/?page=1").unwrap();
/// assert_eq!(
///     resolve_href("/lagboken/x/", &base).as_deref(),
///     Some("https://www.lagboken.se/lagboken/x/")
/// );
/// assert_eq!(
///     resolve_href("?page=2", &base).as_deref(),
///     Some("https://www.lagboken.se/lagboken/start/arbetsratt/?page=2")
/// );
/// assert_eq!(resolve_href("javascript:void(0)", &base), None);
/// ```
#[must_use]
pub fn resolve_href(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Classify one anchor as a law reference.
///
/// The reference is taken from `(YYYY:NNN)` in the link text, or failing
/// that from `YYYY:NNN` in the href.
#[must_use]
pub fn classify_anchor(href: &str, text: &str, base: &Url) -> Option<LawReference> {
    if !is_law_link(href, text) {
        return None;
    }

    let (title, reference) = if let Some((title, reference)) = parse_reference_line(text) {
        (title, reference)
    } else {
        let caps = BARE_REFERENCE.captures(href)?;
        let reference = format!("{}:{}", &caps[1], &caps[2]);
        let title = match text.trim() {
            "" => format!("Lag ({reference})"),
            trimmed => trimmed.to_string(),
        };
        (title, reference)
    };

    let url = resolve_href(href, base)?;
    Some(LawReference::new(title, reference, url))
}

/// Extract all law links from a page, first occurrence per reference wins.
#[must_use]
pub fn extract_law_links(document: &Document) -> Vec<LawReference> {
    let mut seen: HashSet<String> = HashSet::new();

    document
        .anchors()
        .iter()
        .filter_map(|anchor| classify_anchor(&anchor.href, &anchor.text, document.url()))
        .filter(|law| seen.insert(law.reference.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse("https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/")
            .unwrap()
    }

    #[test]
    fn test_is_law_link_tokens() {
        assert!(is_law_link("/SFS/1982-80", ""));
        assert!(is_law_link("/x", "Lag om anställningsskydd"));
        assert!(is_law_link("/x", "Ändrad 2019"));
        assert!(!is_law_link("/kontakt", "Kontakt"));
        assert!(!is_law_link("", ""));
    }

    #[test]
    fn test_classify_from_link_text() {
        let law = classify_anchor(
            "/lagboken/start/arbetsratt-och-arbetsmiljoratt/semesterlag-1977480/",
            "Semesterlag (1977:480)",
            &base(),
        )
        .unwrap();

        assert_eq!(law.title, "Semesterlag");
        assert_eq!(law.reference, "1977:480");
        assert_eq!(
            law.url,
            "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/semesterlag-1977480/"
        );
        assert!(!law.url_synthesized);
    }

    #[test]
    fn test_classify_from_href() {
        let law = classify_anchor("/sfs/1982:80", "  ", &base()).unwrap();
        assert_eq!(law.title, "Lag (1982:80)");
        assert_eq!(law.reference, "1982:80");
        assert_eq!(law.url, "https://www.lagboken.se/sfs/1982:80");

        let law = classify_anchor("/sfs/1982:80", "Anställningsskyddslagen", &base()).unwrap();
        assert_eq!(law.title, "Anställningsskyddslagen");
    }

    #[test]
    fn test_text_reference_takes_priority_over_href() {
        let law = classify_anchor("/sfs/2000:1", "Lag (1977:480)", &base()).unwrap();
        assert_eq!(law.reference, "1977:480");
    }

    #[test]
    fn test_classify_rejects_candidates_without_reference() {
        assert_eq!(classify_anchor("/lagboken/start/", "Lagboken", &base()), None);
        assert_eq!(classify_anchor("/om-oss", "Om oss", &base()), None);
    }

    #[test]
    fn test_classify_rejects_unresolvable_href() {
        assert_eq!(
            classify_anchor("javascript:open()", "Semesterlag (1977:480)", &base()),
            None
        );
    }

    #[test]
    fn test_relative_href_resolves_against_page() {
        let law = classify_anchor("semesterlag-1977480/", "Semesterlag (1977:480)", &base()).unwrap();
        assert_eq!(
            law.url,
            "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/semesterlag-1977480/"
        );
    }

    #[test]
    fn test_accepted_references_are_canonical() {
        let pattern = Regex::new(r"^\d{4}:\d+$").unwrap();
        let anchors = [
            ("/a/", "Semesterlag (1977:480)"),
            ("/sfs/1982:80/", ""),
            ("/b/", "Diskrimineringslag (2008:567) med ändringar"),
            ("/lag/2010:1/", "Text (ej nr)"),
        ];

        for (href, text) in anchors {
            let law = classify_anchor(href, text, &base()).unwrap();
            assert!(pattern.is_match(&law.reference), "{}", law.reference);
        }
    }

    #[test]
    fn test_extract_law_links_dedups_first_wins() {
        let html = r#"<body>
            <a href="/a/semesterlag/">Semesterlag (1977:480)</a>
            <a href="/om-oss">Om oss</a>
            <a href="/b/semesterlag-kopia/">Semesterlagen i kortform (1977:480)</a>
            <a href="/c/">Lag om anställningsskydd (1982:80)</a>
        </body>"#;
        let doc = Document::parse(base(), 200, html);

        let laws = extract_law_links(&doc);

        assert_eq!(laws.len(), 2);
        assert_eq!(laws[0].title, "Semesterlag");
        assert_eq!(laws[0].url, "https://www.lagboken.se/a/semesterlag/");
        assert_eq!(laws[1].reference, "1982:80");
    }
}
