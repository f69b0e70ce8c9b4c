//! Core data types for the harvester.
//!
//! Field names are part of the JSON interchange format written by
//! [`crate::output`] and must stay stable across runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A statute reference discovered on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawReference {
    /// Link text with the reference stripped.
    pub title: String,

    /// Canonical SFS number, `YYYY:NNN`.
    pub reference: String,

    /// Absolute URL of the law page.
    pub url: String,

    /// True when `url` was built from the title instead of found on the page.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub url_synthesized: bool,
}

impl LawReference {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        reference: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            reference: reference.into(),
            url: url.into(),
            url_synthesized: false,
        }
    }

    /// Mark the URL as synthesized.
    #[must_use]
    pub fn synthesized(mut self) -> Self {
        self.url_synthesized = true;
        self
    }
}

/// Title and description of a topic listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TopicInfo {
    /// Title for display purposes.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }
}

/// All law references found on one topic, across its pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPage {
    /// Seed URL of the topic.
    pub url: String,

    pub scraped_at: DateTime<Utc>,

    /// Captured from the first page only.
    pub topic_info: TopicInfo,

    pub total_laws_found: usize,

    /// Laws in discovery order, accumulated over all pages.
    pub laws: Vec<LawReference>,
}

/// Structured data from one law page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawMetadata {
    pub url: String,

    pub scraped_at: DateTime<Utc>,

    pub title: String,

    pub description: String,

    /// Field label to value, e.g. `"SFS nr" -> "1977:480"`.
    pub metadata: BTreeMap<String, String>,

    pub important_laws: Vec<LawReference>,
}

/// A law with full metadata, tagged with the topic it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedLaw {
    /// SFS number from the topic listing.
    pub reference: String,

    #[serde(flatten)]
    pub law: LawMetadata,

    pub topic_page_info: TopicInfo,

    pub topic_page_url: String,
}

/// A law reference without metadata, tagged with the topic it was found on.
///
/// Emitted when individual laws are not scraped or when scraping one failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencedLaw {
    #[serde(flatten)]
    pub law: LawReference,

    pub topic_page_info: TopicInfo,

    pub topic_page_url: String,
}

/// One entry of [`CrawlResult::all_laws`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LawEntry {
    Detailed(Box<DetailedLaw>),
    Reference(ReferencedLaw),
}

impl LawEntry {
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Detailed(d) => &d.law.title,
            Self::Reference(r) => &r.law.title,
        }
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        match self {
            Self::Detailed(d) => &d.reference,
            Self::Reference(r) => &r.law.reference,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Detailed(d) => &d.law.url,
            Self::Reference(r) => &r.law.url,
        }
    }

    #[must_use]
    pub fn topic_page_info(&self) -> &TopicInfo {
        match self {
            Self::Detailed(d) => &d.topic_page_info,
            Self::Reference(r) => &r.topic_page_info,
        }
    }

    #[must_use]
    pub fn is_detailed(&self) -> bool {
        matches!(self, Self::Detailed(_))
    }
}

/// Aggregate output of a multi-topic crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub topic_pages: Vec<TopicPage>,
    pub all_laws: Vec<LawEntry>,
    pub total_topics_scraped: usize,
    pub total_laws_scraped: usize,
    pub scraped_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_info() -> TopicInfo {
        TopicInfo {
            title: Some("Arbetsrätt och arbetsmiljörätt".to_string()),
            description: None,
        }
    }

    #[test]
    fn test_law_reference_omits_confirmed_flag() {
        let law = LawReference::new("Semesterlag", "1977:480", "https://www.lagboken.se/a/");
        let json = serde_json::to_value(&law).unwrap();
        assert_eq!(json["reference"], "1977:480");
        assert!(json.get("url_synthesized").is_none());

        let json = serde_json::to_value(law.synthesized()).unwrap();
        assert_eq!(json["url_synthesized"], true);
    }

    #[test]
    fn test_topic_info_skips_missing_fields() {
        let json = serde_json::to_string(&topic_info()).unwrap();
        assert_eq!(json, r#"{"title":"Arbetsrätt och arbetsmiljörätt"}"#);
    }

    #[test]
    fn test_reference_entry_is_flat() {
        let entry = LawEntry::Reference(ReferencedLaw {
            law: LawReference::new("Semesterlag", "1977:480", "https://www.lagboken.se/a/"),
            topic_page_info: topic_info(),
            topic_page_url: "https://www.lagboken.se/t/".to_string(),
        });

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["title"], "Semesterlag");
        assert_eq!(json["reference"], "1977:480");
        assert_eq!(json["topic_page_url"], "https://www.lagboken.se/t/");
        assert_eq!(
            json["topic_page_info"]["title"],
            "Arbetsrätt och arbetsmiljörätt"
        );
    }

    #[test]
    fn test_detailed_entry_roundtrip() {
        let mut metadata = BTreeMap::new();
        metadata.insert("SFS nr".to_string(), "1977:480".to_string());

        let entry = LawEntry::Detailed(Box::new(DetailedLaw {
            reference: "1977:480".to_string(),
            law: LawMetadata {
                url: "https://www.lagboken.se/a/".to_string(),
                scraped_at: Utc::now(),
                title: "Semesterlag (1977:480)".to_string(),
                description: String::new(),
                metadata,
                important_laws: Vec::new(),
            },
            topic_page_info: topic_info(),
            topic_page_url: "https://www.lagboken.se/t/".to_string(),
        }));

        let json = serde_json::to_string(&entry).unwrap();
        let back: LawEntry = serde_json::from_str(&json).unwrap();
        assert!(back.is_detailed());
        assert_eq!(back.reference(), "1977:480");
        assert_eq!(back, entry);
    }
}
