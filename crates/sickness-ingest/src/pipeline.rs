//! Run orchestration.
//!
//! One run optionally scrapes fresh files from the publisher, then works
//! through every staged source file: classify, canonicalize the name,
//! parse, transform, load, archive. Failures are collected per file so a
//! bad file never aborts the rest of the run; only run-level problems
//! (no source files at all, an unreachable publication page, a failed
//! database connection) are fatal.

use crate::catalog::CatalogBuilder;
use crate::cleanse::{cleanse_filename, CleanseOutcome};
use crate::downloader::Downloader;
use crate::loader::WarehouseLoader;
use crate::publication::PublicationResolver;
use crate::table::DataTable;
use crate::transform::{ColumnMap, IcsLookup, Transformer};
use crate::{PipelineConfig, PipelineError, Result};
use sickness_common::types::{DatasetKind, OverwritePolicy};
use std::path::Path;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Terminal state of one source file within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Transformed and written to the warehouse.
    Loaded { rows: u64 },
    /// Deliberately not processed; the file stays where it is.
    Skipped { reason: String },
    /// Processing failed; the file stays in the source directory for
    /// inspection or retry.
    Failed { error: String },
}

/// One source file's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
}

/// Aggregated results of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    pub fn loaded(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Drives one end-to-end run.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Execute a full run and report per-file outcomes.
    pub async fn run(&self) -> Result<RunReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            scrape = self.config.scrape,
            cleanse = self.config.cleanse,
            archive = self.config.archive,
            "Starting run"
        );

        if self.config.scrape {
            self.scrape().await?;
        }

        let filenames = list_source_files(&self.config.source_dir)?;

        let column_map = ColumnMap::from_csv_path(&self.config.column_map_path)?;
        let transformer = Transformer::new(column_map, self.config.region_code.clone());

        let loader = WarehouseLoader::connect(&self.config.database_url).await?;
        let ics = loader.load_ics_lookup(&self.config.ics_lookup_query).await?;

        let mut report = RunReport::default();
        for filename in filenames {
            if !filename.ends_with(".csv") {
                warn!(file = %filename, "Not a CSV file; it will not be processed");
                report.outcomes.push(FileOutcome {
                    filename,
                    status: FileStatus::Skipped {
                        reason: "not a CSV file".to_string(),
                    },
                });
                continue;
            }

            let status = match self.process_file(&filename, &transformer, &loader, &ics).await {
                Ok(status) => status,
                Err(e) => {
                    error!(file = %filename, error = %e, "File failed");
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push(FileOutcome { filename, status });
        }

        info!(
            %run_id,
            loaded = report.loaded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(report)
    }

    /// Resolve the latest periods and stage the target resources.
    ///
    /// A resource missing from one period's catalog is not an error: the
    /// publisher simply may not have offered that file that period. An
    /// unreachable period page or a failed download is logged and
    /// skipped; those files can still be staged by hand. Only failing to
    /// resolve the publication listing itself aborts the scrape.
    async fn scrape(&self) -> Result<()> {
        let resolver = PublicationResolver::new(&self.config)?;
        let catalog_builder = CatalogBuilder::new(&self.config)?;
        let downloader = Downloader::new(&self.config)?;

        let pages = resolver
            .resolve_latest(&self.config.publication, self.config.periods)
            .await?;

        for page in &pages {
            let catalog = match catalog_builder.catalog(&page.url(&self.config.base_url)).await {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!(page = %page.href, error = %e, "Period page failed; continuing with the rest");
                    continue;
                }
            };

            for file_id in &self.config.target_file_ids {
                let Some(descriptor) = catalog.get(file_id) else {
                    info!(file_id, page = %page.href, "File not offered this period");
                    continue;
                };

                match downloader.stage(descriptor, &self.config.source_dir).await {
                    Ok(path) => info!(path = %path.display(), "Staged file"),
                    Err(e) => warn!(file_id, error = %e, "Download failed; continuing"),
                }
            }
        }

        Ok(())
    }

    /// Take one staged CSV from raw name to loaded-and-archived.
    async fn process_file(
        &self,
        filename: &str,
        transformer: &Transformer,
        loader: &WarehouseLoader,
        ics: &IcsLookup,
    ) -> Result<FileStatus> {
        let kind = DatasetKind::classify(filename);
        info!(file = %filename, %kind, "Processing file");

        let canonical = if self.config.cleanse {
            match cleanse_filename(
                &self.config.source_dir,
                filename,
                kind,
                self.config.overwrite_policy,
            )? {
                CleanseOutcome::Renamed(name) | CleanseOutcome::Unchanged(name) => name,
                CleanseOutcome::Skipped { target } => {
                    let conflict = PipelineError::NamingConflict {
                        filename: filename.to_string(),
                        target,
                    };
                    return Ok(FileStatus::Skipped {
                        reason: conflict.to_string(),
                    });
                }
            }
        } else {
            filename.to_string()
        };

        let raw = DataTable::from_csv_path(&self.config.source_dir.join(&canonical))?;
        let transformed = transformer.transform(&raw, kind, ics)?;
        let rows = loader
            .load(&transformed, &self.config.qualified_table(kind))
            .await?;

        if self.config.archive {
            self.archive(&canonical)?;
        }

        Ok(FileStatus::Loaded { rows })
    }

    /// Move a loaded file out of the source directory.
    fn archive(&self, filename: &str) -> Result<()> {
        std::fs::create_dir_all(&self.config.archive_dir)?;

        let target = self.config.archive_dir.join(filename);
        if target.exists() && self.config.overwrite_policy == OverwritePolicy::NeverOverwrite {
            warn!(
                file = %filename,
                "Archive already holds this file; leaving it in the source directory"
            );
            return Ok(());
        }

        std::fs::rename(self.config.source_dir.join(filename), &target)?;
        info!(file = %filename, "Archived file");
        Ok(())
    }
}

/// Enumerate the source directory, sorted for a stable processing order.
///
/// An empty (or missing) source directory is fatal: it means the staging
/// step was skipped entirely, not that there is nothing to do.
fn list_source_files(source_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(source_dir).map_err(|_| {
        PipelineError::NotFound(format!(
            "source directory {} does not exist",
            source_dir.display()
        ))
    })?;

    let mut filenames: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    filenames.sort();

    if filenames.is_empty() {
        return Err(PipelineError::NotFound(format!(
            "no files were found; stage the publisher data in {}",
            source_dir.display()
        )));
    }

    Ok(filenames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_source_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "x").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = list_source_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.csv", "b.csv", "notes.txt"]);
    }

    #[test]
    fn test_empty_source_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_source_files(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_missing_source_dir_is_fatal() {
        let err = list_source_files(Path::new("/nonexistent/source")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_run_report_accounting() {
        let report = RunReport {
            outcomes: vec![
                FileOutcome {
                    filename: "a.csv".to_string(),
                    status: FileStatus::Loaded { rows: 120 },
                },
                FileOutcome {
                    filename: "b.csv".to_string(),
                    status: FileStatus::Skipped {
                        reason: "not a CSV file".to_string(),
                    },
                },
                FileOutcome {
                    filename: "c.csv".to_string(),
                    status: FileStatus::Failed {
                        error: "required column missing: region_code".to_string(),
                    },
                },
            ],
        };

        assert_eq!(report.loaded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_run_report_empty_has_no_failures() {
        assert!(!RunReport::default().has_failures());
    }

    #[tokio::test]
    async fn test_scrape_continues_past_failed_period_page() {
        use wiremock::matchers::{method, path, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        let listing = r#"
            <div id="latest-statistics"><a href="/p/march-2024">March 2024</a></div>
            <div id="past-publications">
                <a class="cta__button" href="/p/february-2024">February 2024</a>
            </div>
        "#;
        Mock::given(method("GET"))
            .and(path(
                "/data-and-information/publications/statistical/nhs-sickness-absence-rates/",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(&server)
            .await;

        // Latest period page is down; the older one lists the target file.
        Mock::given(method("GET"))
            .and(path("/p/march-2024"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let resources = r#"<div id="resources">
            <a href="/files/Rates%20CSV%2C%20February%202024.csv">download</a>
        </div>"#;
        Mock::given(method("GET"))
            .and(path("/p/february-2024"))
            .respond_with(ResponseTemplate::new(200).set_body_string(resources))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/files/.*"))
            .respond_with(ResponseTemplate::new(200).set_body_string("org_code,rate\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            base_url: server.uri(),
            periods: 2,
            target_file_ids: vec!["Rates CSV".to_string()],
            source_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let pipeline = Pipeline::new(config);
        pipeline.scrape().await.unwrap();

        assert!(dir.path().join("Rates CSV, February 2024.csv").exists());
    }
}
