//! Period-page resource catalogs.
//!
//! One period page lists the downloadable resources for that reporting
//! period. The catalog maps the publisher's stable file label to a
//! download descriptor, so downstream code can pick the files it cares
//! about by name.

use crate::filename::parse_filename;
use crate::{PipelineConfig, PipelineError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anchors within the resources section of a period page.
const RESOURCES_SECTION: &str = "#resources a";

/// Metadata for one downloadable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// The publisher's label for the dataset, derived from the URL's
    /// filename segment.
    pub file_id: String,
    /// Absolute download URL.
    pub url: String,
    /// Reporting period as written in the filename, when present.
    pub period: Option<String>,
    /// File extension, lowercased as published.
    pub extension: String,
}

/// Catalog of one period's resources, keyed by file label.
pub type ResourceCatalog = HashMap<String, ResourceDescriptor>;

/// Builds resource catalogs from period pages.
pub struct CatalogBuilder {
    client: Client,
    base_url: String,
}

impl CatalogBuilder {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("sickness-ingest/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetch a period page and index its downloadable resources.
    pub async fn catalog(&self, period_page_url: &str) -> Result<ResourceCatalog> {
        debug!(url = %period_page_url, "Fetching period page");

        let response = self.client.get(period_page_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::FetchFailure {
                url: period_page_url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        let catalog = parse_resources(&html, &self.base_url);

        info!(
            url = %period_page_url,
            resources = catalog.len(),
            "Built resource catalog"
        );
        Ok(catalog)
    }
}

/// Index every anchor in the resources section by parsed file label.
///
/// Anchors with an empty or placeholder href are inline notes on the
/// source site, not downloads; they are skipped silently. Two links
/// yielding the same label keep the later one (last-write-wins), which is
/// logged since it can hide a resource.
fn parse_resources(html: &str, base_url: &str) -> ResourceCatalog {
    let document = Html::parse_document(html);
    let selector = Selector::parse(RESOURCES_SECTION).unwrap();

    let mut catalog = ResourceCatalog::new();

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.is_empty() || href == "#" {
            continue;
        }

        let url = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", base_url.trim_end_matches('/'), href)
        };

        let parsed = parse_filename(&url);
        if let Some(previous) = catalog.insert(
            parsed.file_id.clone(),
            ResourceDescriptor {
                file_id: parsed.file_id.clone(),
                url,
                period: parsed.period,
                extension: parsed.extension,
            },
        ) {
            warn!(
                file_id = %parsed.file_id,
                replaced = %previous.url,
                "Two resources share one file label; keeping the later link"
            );
        }
    }

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Raw-string delimiters are doubled because the fixture itself
    // contains a `"#` sequence (the placeholder href).
    const PERIOD_PAGE: &str = r##"
        <html><body>
        <div id="summary"><a href="/unrelated.csv">elsewhere</a></div>
        <div id="resources">
            <a href="https://files.digital.nhs.uk/A1/NHS%20Sickness%20Absence%20benchmarking%20tool%20CSV%2C%20March%202024.csv">Benchmarking tool</a>
            <a href="https://files.digital.nhs.uk/A2/NHS%20Sickness%20Absence%20rates%20by%20staff%20group%20and%20reason%20CSV%2C%20March%202024.csv">By reason</a>
            <a href="https://files.digital.nhs.uk/A3/Background%20quality%20report.pdf">Quality report</a>
            <a href="#">Footnote marker</a>
            <a href="">Empty note</a>
        </div>
        </body></html>
    "##;

    #[test]
    fn test_parse_resources_indexes_by_file_id() {
        let catalog = parse_resources(PERIOD_PAGE, "https://digital.nhs.uk");
        assert_eq!(catalog.len(), 3);

        let bench = &catalog["NHS Sickness Absence benchmarking tool CSV"];
        assert_eq!(bench.period.as_deref(), Some("March 2024"));
        assert_eq!(bench.extension, "csv");
        assert!(bench.url.starts_with("https://files.digital.nhs.uk/A1/"));
    }

    #[test]
    fn test_parse_resources_period_optional() {
        let catalog = parse_resources(PERIOD_PAGE, "https://digital.nhs.uk");
        let report = &catalog["Background quality report"];
        assert_eq!(report.period, None);
        assert_eq!(report.extension, "pdf");
    }

    #[test]
    fn test_parse_resources_skips_placeholder_anchors() {
        let catalog = parse_resources(PERIOD_PAGE, "https://digital.nhs.uk");
        assert!(catalog.values().all(|d| !d.url.ends_with('#')));
    }

    #[test]
    fn test_parse_resources_outside_section_ignored() {
        let catalog = parse_resources(PERIOD_PAGE, "https://digital.nhs.uk");
        assert!(!catalog.contains_key("unrelated"));
    }

    #[test]
    fn test_parse_resources_relative_href() {
        let html = r#"<div id="resources">
            <a href="/files/Rates%20CSV%2C%20April%202024.csv">dl</a>
        </div>"#;
        let catalog = parse_resources(html, "https://digital.nhs.uk/");
        let rates = &catalog["Rates CSV"];
        assert_eq!(rates.url, "https://digital.nhs.uk/files/Rates%20CSV%2C%20April%202024.csv");
    }

    #[test]
    fn test_parse_resources_duplicate_label_last_wins() {
        let html = r#"<div id="resources">
            <a href="/a/Rates%20CSV%2C%20April%202024.csv">first</a>
            <a href="/b/Rates%20CSV%2C%20April%202024.csv">second</a>
        </div>"#;
        let catalog = parse_resources(html, "https://digital.nhs.uk");
        assert_eq!(catalog.len(), 1);
        assert!(catalog["Rates CSV"].url.contains("/b/"));
    }

    #[tokio::test]
    async fn test_catalog_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pubs/sickness/march-2024"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PERIOD_PAGE))
            .mount(&server)
            .await;

        let config = PipelineConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        let builder = CatalogBuilder::new(&config).unwrap();
        let catalog = builder
            .catalog(&format!("{}/pubs/sickness/march-2024", server.uri()))
            .await
            .unwrap();

        assert_eq!(catalog.len(), 3);
    }

    #[tokio::test]
    async fn test_catalog_http_error_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = PipelineConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        let builder = CatalogBuilder::new(&config).unwrap();
        let err = builder
            .catalog(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::FetchFailure { status: 404, .. }));
    }
}
