//! Multi-topic crawl orchestration.
//!
//! [`CrawlOrchestrator`] walks each topic in turn, then visits the laws found
//! on it, subject to a per-topic and a total quota. All state of a run lives
//! on the stack of [`CrawlOrchestrator::run`]; nothing is shared between runs.
//!
//! Failures never abort a run:
//!
//! - a topic whose first page cannot be fetched is skipped,
//! - a law page that cannot be fetched becomes a reference-only
//!   entry carrying the topic context.

use chrono::Utc;

use crate::config::CrawlConfig;
use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::law::scrape_law_page;
use crate::pacing::RequestPacer;
use crate::pagination::PaginationWalker;
use crate::types::{CrawlResult, DetailedLaw, LawEntry, LawReference, ReferencedLaw, TopicPage};

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    TopicStarted {
        index: usize,
        total: usize,
        url: String,
    },
    TopicSkipped {
        url: String,
    },
    LawStarted {
        index: usize,
        title: String,
        url: String,
    },
}

type ProgressHook = Box<dyn Fn(&CrawlEvent)>;

/// Drives a crawl over many topics and their laws.
pub struct CrawlOrchestrator<F: PageFetcher> {
    fetcher: F,
    config: CrawlConfig,
    pacer: RequestPacer,
    progress: Option<ProgressHook>,
}

impl<F: PageFetcher> CrawlOrchestrator<F> {
    /// Create an orchestrator. The configuration is validated here, before
    /// any request is made.
    pub fn new(fetcher: F, config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        let pacer = RequestPacer::new(config.request_delay);
        Ok(Self {
            fetcher,
            config,
            pacer,
            progress: None,
        })
    }

    /// Receive a [`CrawlEvent`] for every topic and law as it starts.
    #[must_use]
    pub fn on_progress(mut self, hook: impl Fn(&CrawlEvent) + 'static) -> Self {
        self.progress = Some(Box::new(hook));
        self
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(hook) = &self.progress {
            hook(&event);
        }
    }

    fn total_quota_reached(&self, collected: usize) -> bool {
        self.config
            .max_total_laws
            .is_some_and(|max| collected >= max)
    }

    /// Run the crawl to completion.
    pub fn run(&mut self) -> CrawlResult {
        let scraped_at = Utc::now();
        let topic_urls = self.config.topic_urls.clone();
        let mut topic_pages: Vec<TopicPage> = Vec::new();
        let mut all_laws: Vec<LawEntry> = Vec::new();

        for (index, topic_url) in topic_urls.iter().enumerate() {
            if self.total_quota_reached(all_laws.len()) {
                tracing::info!(
                    collected = all_laws.len(),
                    "Total law quota reached, skipping remaining topics"
                );
                break;
            }

            self.emit(CrawlEvent::TopicStarted {
                index: index + 1,
                total: topic_urls.len(),
                url: topic_url.clone(),
            });

            let walked = PaginationWalker::new(&self.fetcher, &mut self.pacer).walk(topic_url);
            let topic = match walked {
                Ok(topic) => topic,
                Err(e) => {
                    tracing::warn!(url = %topic_url, error = %e, "Topic unreachable, skipping");
                    self.emit(CrawlEvent::TopicSkipped {
                        url: topic_url.clone(),
                    });
                    continue;
                }
            };

            self.visit_laws(&topic, &mut all_laws);
            topic_pages.push(topic);
        }

        tracing::info!(
            topics = topic_pages.len(),
            laws = all_laws.len(),
            "Crawl finished"
        );

        CrawlResult {
            total_topics_scraped: topic_pages.len(),
            total_laws_scraped: all_laws.len(),
            topic_pages,
            all_laws,
            scraped_at,
        }
    }

    /// Turn the laws of one topic into entries, within both quotas.
    fn visit_laws(&mut self, topic: &TopicPage, all_laws: &mut Vec<LawEntry>) {
        let per_topic = self.config.max_laws_per_topic.unwrap_or(usize::MAX);

        for law in topic.laws.iter().take(per_topic) {
            if self.total_quota_reached(all_laws.len()) {
                tracing::info!(url = %topic.url, "Total law quota reached");
                break;
            }

            self.emit(CrawlEvent::LawStarted {
                index: all_laws.len() + 1,
                title: law.title.clone(),
                url: law.url.clone(),
            });

            let entry = if self.config.scrape_individual_laws {
                self.visit_law(topic, law)
            } else {
                reference_entry(topic, law)
            };
            all_laws.push(entry);
        }
    }

    fn visit_law(&mut self, topic: &TopicPage, law: &LawReference) -> LawEntry {
        self.pacer.wait();
        match scrape_law_page(&self.fetcher, &law.url) {
            Ok(metadata) => LawEntry::Detailed(Box::new(DetailedLaw {
                reference: law.reference.clone(),
                law: metadata,
                topic_page_info: topic.topic_info.clone(),
                topic_page_url: topic.url.clone(),
            })),
            Err(e) => {
                tracing::warn!(url = %law.url, error = %e, "Law page failed, keeping reference only");
                reference_entry(topic, law)
            }
        }
    }
}

fn reference_entry(topic: &TopicPage, law: &LawReference) -> LawEntry {
    LawEntry::Reference(ReferencedLaw {
        law: law.clone(),
        topic_page_info: topic.topic_info.clone(),
        topic_page_url: topic.url.clone(),
    })
}
