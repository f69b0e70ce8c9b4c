//! Metadata extraction from law pages.
//!
//! Law pages on lagboken.se start with a header block of `Label: value`
//! lines (SFS number, issue date, department, amendment history, ...)
//! followed by the statute text, whose first paragraph marker (`1 §`) ends
//! the block. Extraction works on the flattened page text:
//!
//! 1. slice the block from `SFS nr:` up to the first paragraph marker,
//! 2. evaluate [`FIELD_RULES`] in order against the slice,
//! 3. fold the alternate spelling `Övrig text` into `Övrigt`,
//! 4. resolve the register link for `Länk` from the page anchors.
//!
//! Nothing here fails: a page without a metadata block yields an empty map.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::classifier::{parse_reference_line, resolve_href};
use crate::config::IMPORTANT_LAWS_BASE_URL;
use crate::document::Document;
use crate::types::LawReference;

/// Label that always opens the metadata block.
pub const METADATA_START_LABEL: &str = "SFS nr:";

/// Field holding a link to the external statute register.
pub const LINK_FIELD: &str = "Länk";

/// Key added next to [`LINK_FIELD`] with the resolved register URL.
pub const LINK_URL_FIELD: &str = "Länk URL";

/// Primary spelling of the free-text remark field.
pub const REMARK_FIELD: &str = "Övrigt";

/// Legacy spelling of [`REMARK_FIELD`].
pub const REMARK_FIELD_ALIAS: &str = "Övrig text";

/// Header line of the "important laws" sidebar.
pub const IMPORTANT_LAWS_HEADER: &str = "Viktiga lagar inom arbetsrätten";

/// Lines that end the "important laws" sidebar.
pub const IMPORTANT_LAWS_FOOTERS: &[&str] = &["JP Infonets", "Om Lagboken"];

/// Paragraph marker (`1 §`, `12 a §` is matched by its `12`) ending the block.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*§").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static REGISTER_LINK_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)länk till register").expect("valid regex"));

/// How far a field value extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSpan {
    /// The captured group only.
    Line,

    /// The captured line plus following lines, up to the next line that
    /// starts with a known label.
    UntilNextLabel,
}

/// One `label → regex` pair of the extraction table.
#[derive(Debug)]
pub struct FieldRule {
    /// Key used in the output map.
    pub label: &'static str,

    /// Regex source for the label as it appears on the page, without the colon.
    pub label_pattern: &'static str,

    span: ValueSpan,
    pattern: Regex,
}

impl FieldRule {
    #[allow(clippy::expect_used)] // Only called with the static patterns below
    fn new(
        label: &'static str,
        label_pattern: &'static str,
        value_pattern: &str,
        span: ValueSpan,
    ) -> Self {
        let pattern = Regex::new(&format!(r"{label_pattern}:\s*({value_pattern})"))
            .expect("valid regex");
        Self {
            label,
            label_pattern,
            span,
            pattern,
        }
    }
}

/// The extraction table, evaluated in order. Exactly one field is multi-line.
pub static FIELD_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    use ValueSpan::{Line, UntilNextLabel};

    vec![
        FieldRule::new("Utfärdad", "Utfärdad", r"[\d-]+", Line),
        FieldRule::new("Ikraftträdandedatum", "Ikraftträdandedatum", r"[\d-]+", Line),
        FieldRule::new("Källa", "Källa", r"[^\n]+", Line),
        FieldRule::new("SFS nr", "SFS nr", r"[^\n]+", Line),
        FieldRule::new("Departement", "Departement(?:/myndighet)?", r"[^\n]+", Line),
        FieldRule::new("Ändring införd", "Ändring införd", r"[^\n]+", Line),
        FieldRule::new("Ändrad", "Ändrad", r"[^\n]+", UntilNextLabel),
        FieldRule::new(REMARK_FIELD, REMARK_FIELD, r"[^\n]+", Line),
        FieldRule::new(REMARK_FIELD_ALIAS, REMARK_FIELD_ALIAS, r"[^\n]+", Line),
        FieldRule::new(LINK_FIELD, LINK_FIELD, r"[^\n]+", Line),
    ]
});

/// A line that starts with any label of [`FIELD_RULES`].
#[allow(clippy::expect_used)] // Built from the static label patterns
static LABEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    let labels: Vec<&str> = FIELD_RULES.iter().map(|rule| rule.label_pattern).collect();
    Regex::new(&format!(r"^\s*(?:{}):", labels.join("|"))).expect("valid regex")
});

/// Locate the metadata block inside the flattened page text.
///
/// Starts at the first `SFS nr:` and ends before the first paragraph marker
/// after it, or at the end of the text. Empty when `SFS nr:` is absent.
#[must_use]
pub fn find_metadata_section(text: &str) -> &str {
    let Some(start) = text.find(METADATA_START_LABEL) else {
        return "";
    };
    let rest = &text[start..];
    match SECTION_MARKER.find(rest) {
        Some(marker) => &rest[..marker.start()],
        None => rest,
    }
}

/// Extract the metadata fields from flattened page text.
///
/// # Examples
/// ```
/// use lagboken_harvester::metadata::extract_metadata;
///
/// let text = "Semesterlag\nSFS nr: 1977:480\nUtfärdad: 1977-06-09\n1 § Lagens tillämpning";
/// let metadata = extract_metadata(text);
/// assert_eq!(metadata["SFS nr"], "1977:480");
/// assert_eq!(metadata["Utfärdad"], "1977-06-09");
/// ```
#[must_use]
pub fn extract_metadata(text: &str) -> BTreeMap<String, String> {
    let section = find_metadata_section(text);
    let mut metadata = apply_field_rules(section, &FIELD_RULES);
    normalize_aliases(&mut metadata);
    metadata
}

/// Evaluate an ordered rule table against a slice of text.
///
/// The first match of each rule wins; rules that do not match are skipped.
#[must_use]
pub fn apply_field_rules(section: &str, rules: &[FieldRule]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    for rule in rules {
        let Some(caps) = rule.pattern.captures(section) else {
            continue;
        };
        let Some(value) = caps.get(1) else {
            continue;
        };

        let raw = match rule.span {
            ValueSpan::Line => value.as_str().to_string(),
            ValueSpan::UntilNextLabel => {
                let mut raw = value.as_str().to_string();
                for line in section[value.end()..].lines().skip(1) {
                    if LABEL_LINE.is_match(line) {
                        break;
                    }
                    raw.push('\n');
                    raw.push_str(line);
                }
                raw
            }
        };

        let collapsed = collapse_whitespace(&raw);
        if !collapsed.is_empty() {
            metadata.insert(rule.label.to_string(), collapsed);
        }
    }

    metadata
}

/// Keep the primary remark spelling; the alias only fills a gap.
fn normalize_aliases(metadata: &mut BTreeMap<String, String>) {
    if let Some(value) = metadata.remove(REMARK_FIELD_ALIAS) {
        metadata.entry(REMARK_FIELD.to_string()).or_insert(value);
    }
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value.trim(), " ").into_owned()
}

/// Add the register URL for the `Länk` field, if the page links to one.
///
/// Prefers an anchor labelled "Länk till register"; otherwise takes the first
/// anchor whose href mentions `register` or `lagrum`.
pub fn resolve_register_link(metadata: &mut BTreeMap<String, String>, document: &Document) {
    if !metadata.contains_key(LINK_FIELD) {
        return;
    }

    let base = document.url();
    let anchors = document.anchors();

    let by_text = anchors
        .iter()
        .filter(|a| REGISTER_LINK_TEXT.is_match(&a.text))
        .find_map(|a| resolve_href(&a.href, base));

    let url = by_text.or_else(|| {
        anchors
            .iter()
            .filter(|a| {
                let href = a.href.to_lowercase();
                href.contains("register") || href.contains("lagrum")
            })
            .find_map(|a| resolve_href(&a.href, base))
    });

    match url {
        Some(url) => {
            metadata.insert(LINK_URL_FIELD.to_string(), url);
        }
        None => tracing::debug!(url = %base, "No register link found for Länk field"),
    }
}

/// Slice the "important laws" sidebar out of the flattened text.
fn find_important_laws_block(text: &str) -> &str {
    let Some(start) = text.find(IMPORTANT_LAWS_HEADER) else {
        return "";
    };
    let Some(rest) = text[start + IMPORTANT_LAWS_HEADER.len()..].strip_prefix('\n') else {
        return "";
    };

    let end = IMPORTANT_LAWS_FOOTERS
        .iter()
        .filter_map(|footer| rest.find(&format!("\n{footer}")))
        .min()
        .unwrap_or(rest.len());

    &rest[..end]
}

/// Extract the "important laws" sidebar as law references.
///
/// Each line of the form `Title (YYYY:NNN)` becomes one reference. The URL
/// is taken from a matching anchor on the page when there is one and is
/// synthesized from the title otherwise.
#[must_use]
pub fn extract_important_laws(document: &Document) -> Vec<LawReference> {
    let block = find_important_laws_block(document.text());

    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.eq_ignore_ascii_case(IMPORTANT_LAWS_HEADER))
        .filter_map(parse_reference_line)
        .map(|(title, reference)| match find_law_url(document, &title, &reference) {
            Some(url) => LawReference::new(title, reference, url),
            None => {
                let url = synthesize_law_url(&title, &reference);
                LawReference::new(title, reference, url).synthesized()
            }
        })
        .collect()
}

/// Find an anchor on the page that points at the given law.
fn find_law_url(document: &Document, title: &str, reference: &str) -> Option<String> {
    let title = title.to_lowercase();

    document
        .anchors()
        .iter()
        .filter(|a| !a.href.trim_start().to_lowercase().starts_with("javascript:"))
        .filter(|a| {
            a.text.contains(reference)
                || a.href.contains(reference)
                || (!title.is_empty() && a.text.to_lowercase().contains(&title))
        })
        .find_map(|a| resolve_href(&a.href, document.url()))
}

/// URL slug for a law title.
///
/// Lower-cases, drops the stopwords `lag` and `om`, and collapses every run
/// of non-alphanumeric characters into one hyphen.
///
/// # Examples
/// ```
/// use lagboken_harvester::metadata::law_slug;
///
/// assert_eq!(law_slug("Lag om anställningsskydd"), "anställningsskydd");
/// assert_eq!(law_slug("Semesterlag"), "semesterlag");
/// assert_eq!(law_slug("Föräldraledighetslag, m.m."), "föräldraledighetslag-m-m");
/// ```
#[must_use]
pub fn law_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|word| *word != "lag" && *word != "om")
        .collect();

    let mut slug = String::new();
    let mut pending_hyphen = false;
    for c in words.join(" ").chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Build a best-effort URL for a law that has no link on the page.
///
/// # Examples
/// ```
/// use lagboken_harvester::metadata::synthesize_law_url;
///
/// assert_eq!(
///     synthesize_law_url("Lag om anställningsskydd", "1982:80"),
///     "https://www.lagboken.se/lagboken/start/arbetsratt-och-arbetsmiljoratt/anställningsskydd-198280/"
/// );
/// ```
#[must_use]
pub fn synthesize_law_url(title: &str, reference: &str) -> String {
    let slug = law_slug(title);
    let reference = reference.replace(':', "");
    if slug.is_empty() {
        format!("{IMPORTANT_LAWS_BASE_URL}{reference}/")
    } else {
        format!("{IMPORTANT_LAWS_BASE_URL}{slug}-{reference}/")
    }
}
