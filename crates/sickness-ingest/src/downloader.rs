//! Resource downloading and staging.

use crate::catalog::ResourceDescriptor;
use crate::{PipelineConfig, PipelineError, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for retrieving cataloged resources.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("sickness-ingest/0.1")
            .build()?;

        Ok(Self { client })
    }

    /// Retrieve one resource as raw bytes.
    ///
    /// A non-2xx response is a [`PipelineError::FetchFailure`], local to
    /// this resource; the orchestrator continues with remaining files.
    pub async fn download(&self, descriptor: &ResourceDescriptor) -> Result<Vec<u8>> {
        debug!(file_id = %descriptor.file_id, url = %descriptor.url, "Downloading resource");

        let response = self.client.get(&descriptor.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::FetchFailure {
                url: descriptor.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        info!(
            file_id = %descriptor.file_id,
            bytes = bytes.len(),
            "Downloaded resource"
        );
        Ok(bytes.to_vec())
    }

    /// Download a resource and write it into the staging directory.
    ///
    /// Returns the staged path. The staged name keeps the publisher's
    /// label-and-period convention so the canonicalization step can parse
    /// the period out of it.
    pub async fn stage(
        &self,
        descriptor: &ResourceDescriptor,
        source_dir: &Path,
    ) -> Result<PathBuf> {
        let bytes = self.download(descriptor).await?;

        tokio::fs::create_dir_all(source_dir).await?;
        let path = source_dir.join(staged_filename(descriptor));
        tokio::fs::write(&path, &bytes).await?;

        info!(path = %path.display(), "Staged resource");
        Ok(path)
    }
}

/// Local filename for a staged resource: `"{label}, {period}.{ext}"`, or
/// `"{label}.{ext}"` when the resource carries no period.
pub fn staged_filename(descriptor: &ResourceDescriptor) -> String {
    match &descriptor.period {
        Some(period) => format!(
            "{}, {}.{}",
            descriptor.file_id, period, descriptor.extension
        ),
        None => format!("{}.{}", descriptor.file_id, descriptor.extension),
    }
}
