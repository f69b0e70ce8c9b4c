//! Fetched page representation.
//!
//! A [`Document`] bundles the HTTP status, the raw HTML, the parsed DOM and
//! two derived views the extractors work on: a flattened text rendering with
//! one line per text node, and the list of anchors in DOM order.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Elements whose text never contributes to the visible page text.
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[allow(clippy::expect_used)] // Static selector that is guaranteed to be valid
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// A hyperlink as it appears on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// The raw `href` attribute.
    pub href: String,

    /// Visible text, trimmed fragments joined by single spaces.
    pub text: String,
}

impl Anchor {
    #[must_use]
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }
}

/// A fetched and parsed HTML page.
pub struct Document {
    url: Url,
    status: u16,
    raw_html: String,
    html: Html,
    text: String,
    anchors: Vec<Anchor>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("text_len", &self.text.len())
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

impl Document {
    /// Parse an HTML body fetched from `url`.
    #[must_use]
    pub fn parse(url: Url, status: u16, raw_html: impl Into<String>) -> Self {
        let raw_html = raw_html.into();
        let html = Html::parse_document(&raw_html);
        let text = flatten_text(&html);
        let anchors = collect_anchors(&html);

        Self {
            url,
            status,
            raw_html,
            html,
            text,
            anchors,
        }
    }

    /// The URL the document was fetched from.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn raw_html(&self) -> &str {
        &self.raw_html
    }

    #[must_use]
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Depth-first flattened text, one stripped text node per line.
    ///
    /// Inline elements split lines too: `<p>SFS nr: <b>1977:480</b></p>`
    /// becomes `SFS nr:` and `1977:480` on separate lines.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All anchors with an `href`, in DOM order.
    #[must_use]
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Text of the `<title>` element, if any.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.select_first_text("title")
    }

    /// Trimmed text of the first element matching `selector`.
    ///
    /// Invalid selectors and empty elements yield `None`.
    #[must_use]
    pub fn select_first_text(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        self.html
            .select(&selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    /// Value of an attribute on the first element matching `selector`.
    #[must_use]
    pub fn select_first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        self.html
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Visible text of an element: trimmed fragments joined by single spaces.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .nfc()
        .collect()
}

/// Render every text node of the document on its own line.
fn flatten_text(html: &Html) -> String {
    let mut lines: Vec<&str> = Vec::new();

    for node in html.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .is_some_and(|name| NON_TEXT_ELEMENTS.contains(&name));
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    lines.join("\n").nfc().collect()
}

fn collect_anchors(html: &Html) -> Vec<Anchor> {
    html.select(&ANCHOR_SELECTOR)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            Some(Anchor::new(href, element_text(el)))
        })
        .collect()
}
