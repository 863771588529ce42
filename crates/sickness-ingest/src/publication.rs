//! Publication period resolution.
//!
//! The publisher lists one "latest statistics" entry and a "past
//! publications" section on each publication's root page. Resolving the
//! latest N periods means taking the latest anchor plus up to N-1 past
//! entries, newest first as published.

use crate::{PipelineConfig, PipelineError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Element holding the latest-period anchor on the publication root page.
const LATEST_SECTION: &str = "#latest-statistics a";

/// Past-publication links, restricted to the call-to-action class so
/// decorative or unrelated anchors in the section are excluded.
const PAST_SECTION: &str = "#past-publications a.cta__button";

/// Opaque locator for one reporting period's listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodPage {
    /// Relative path (or absolute URL) as published by the source.
    pub href: String,
}

impl PeriodPage {
    /// Absolute URL for this period page.
    pub fn url(&self, base_url: &str) -> String {
        if self.href.starts_with("http://") || self.href.starts_with("https://") {
            self.href.clone()
        } else {
            format!("{}{}", base_url.trim_end_matches('/'), self.href)
        }
    }
}

/// Resolves the most recent period pages of a publication.
pub struct PublicationResolver {
    client: Client,
    base_url: String,
    section: String,
}

impl PublicationResolver {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("sickness-ingest/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            section: config.publication_section.clone(),
        })
    }

    /// Resolve the latest `n` period pages for a publication, newest first.
    ///
    /// The latest anchor is required; its absence is a [`PipelineError::NotFound`]
    /// and fatal for the run since no data can be resolved at all. Fewer
    /// than `n - 1` past entries is not an error: the shorter list is
    /// returned and a warning logged.
    pub async fn resolve_latest(&self, publication: &str, n: usize) -> Result<Vec<PeriodPage>> {
        if n == 0 {
            return Err(PipelineError::Config(
                "period count must be at least 1".to_string(),
            ));
        }

        let url = format!(
            "{}{}{}/",
            self.base_url.trim_end_matches('/'),
            self.section,
            publication
        );
        info!(publication, n, %url, "Resolving latest periods");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::FetchFailure {
                url,
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        let pages = parse_publication_listing(&html, n)?;

        info!(count = pages.len(), "Resolved period pages");
        Ok(pages)
    }
}

/// Extract the latest + past period references from a publication root page.
fn parse_publication_listing(html: &str, n: usize) -> Result<Vec<PeriodPage>> {
    let document = Html::parse_document(html);
    // Both selectors are compile-time constants; parse cannot fail.
    let latest_selector = Selector::parse(LATEST_SECTION).unwrap();
    let past_selector = Selector::parse(PAST_SECTION).unwrap();

    let latest_href = document
        .select(&latest_selector)
        .find_map(|a| a.value().attr("href"))
        .ok_or_else(|| {
            PipelineError::NotFound(
                "latest-statistics anchor missing from publication page".to_string(),
            )
        })?;

    let mut pages = vec![PeriodPage {
        href: latest_href.to_string(),
    }];

    if n == 1 {
        return Ok(pages);
    }

    for anchor in document.select(&past_selector) {
        if pages.len() >= n {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        // One resolution call never yields the same page twice.
        if pages.iter().any(|p| p.href == href) {
            debug!(href, "Skipping duplicate period reference");
            continue;
        }
        pages.push(PeriodPage {
            href: href.to_string(),
        });
    }

    if pages.len() < n {
        warn!(
            requested = n,
            found = pages.len(),
            "Fewer past publications available than requested"
        );
    }

    Ok(pages)
}
