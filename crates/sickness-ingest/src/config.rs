//! Pipeline configuration.
//!
//! Mirrors the runtime settings surface of the workflow: database
//! connection and destination tables, the publisher location, directory
//! layout, lookup resources, and the per-run mode flags.

use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use sickness_common::types::{DatasetKind, OverwritePolicy};
use std::path::PathBuf;

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Postgres connection string.
    pub database_url: String,

    /// Destination schema.
    pub schema: String,

    /// Destination table for the benchmarking dataset.
    pub table_benchmarking: String,

    /// Destination table for the by-reason dataset.
    pub table_byreason: String,

    /// Query returning `org_code, ics_code, ics_name` for the ICS lookup.
    pub ics_lookup_query: String,

    /// Region code the data is filtered to (London).
    pub region_code: String,

    /// CSV resource mapping source column names to output column names.
    pub column_map_path: PathBuf,

    /// Directory holding staged source files.
    pub source_dir: PathBuf,

    /// Directory successful loads are archived into.
    pub archive_dir: PathBuf,

    /// Publisher base URL.
    pub base_url: String,

    /// Path segment for statistical publications on the publisher site.
    pub publication_section: String,

    /// Publication slug, e.g. "nhs-sickness-absence-rates".
    pub publication: String,

    /// How many recent periods to resolve when scraping.
    pub periods: usize,

    /// Resource labels to download from each period catalog.
    pub target_file_ids: Vec<String>,

    /// Fetch new files from the publisher before processing.
    pub scrape: bool,

    /// Rename staged files into the canonical convention.
    pub cleanse: bool,

    /// Move files into the archive directory after a successful load.
    pub archive: bool,

    /// Conflict handling for cleansing and archival renames.
    pub overwrite_policy: OverwritePolicy,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            schema: "public".to_string(),
            table_benchmarking: "sickness_absence".to_string(),
            table_byreason: "sickness_absence_by_reason".to_string(),
            ics_lookup_query:
                "SELECT org_code, ics_code, ics_name FROM ics_lookup".to_string(),
            region_code: "Y56".to_string(),
            column_map_path: PathBuf::from("./config/column_names.csv"),
            source_dir: PathBuf::from("./data/current"),
            archive_dir: PathBuf::from("./data/archive"),
            base_url: "https://digital.nhs.uk".to_string(),
            publication_section: "/data-and-information/publications/statistical/"
                .to_string(),
            publication: "nhs-sickness-absence-rates".to_string(),
            periods: 1,
            target_file_ids: vec![
                "NHS Sickness Absence benchmarking tool CSV".to_string(),
                "NHS Sickness Absence rates by staff group and reason CSV".to_string(),
            ],
            scrape: false,
            cleanse: true,
            archive: true,
            overwrite_policy: OverwritePolicy::NeverOverwrite,
            timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(schema) = std::env::var("SQL_SCHEMA") {
            config.schema = schema;
        }
        if let Ok(table) = std::env::var("SQL_TABLE_BENCHMARKING") {
            config.table_benchmarking = table;
        }
        if let Ok(table) = std::env::var("SQL_TABLE_BYREASON") {
            config.table_byreason = table;
        }
        if let Ok(query) = std::env::var("ICS_LOOKUP_QUERY") {
            config.ics_lookup_query = query;
        }
        if let Ok(code) = std::env::var("REGION_CODE") {
            config.region_code = code;
        }
        if let Ok(path) = std::env::var("COLUMN_MAP_PATH") {
            config.column_map_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("SOURCE_DIR") {
            config.source_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("ARCHIVE_DIR") {
            config.archive_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("PUBLISHER_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(section) = std::env::var("PUBLICATION_SECTION") {
            config.publication_section = section;
        }
        if let Ok(slug) = std::env::var("PUBLICATION_SLUG") {
            config.publication = slug;
        }
        if let Ok(n) = std::env::var("SCRAPE_PERIODS") {
            config.periods = n
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid SCRAPE_PERIODS: {}", n)))?;
        }
        if let Ok(ids) = std::env::var("SOURCE_FILE_IDS") {
            // Labels contain commas, so the list separator is ';'.
            config.target_file_ids = ids
                .split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(flag) = env_flag("SOURCE_SCRAPE") {
            config.scrape = flag;
        }
        if let Some(flag) = env_flag("SOURCE_CLEANSE") {
            config.cleanse = flag;
        }
        if let Some(flag) = env_flag("SOURCE_ARCHIVE") {
            config.archive = flag;
        }
        if let Ok(policy) = std::env::var("OVERWRITE_POLICY") {
            config.overwrite_policy = policy
                .parse()
                .map_err(|e| PipelineError::Config(format!("{}", e)))?;
        }
        if let Ok(secs) = std::env::var("HTTP_TIMEOUT_SECS") {
            config.timeout_secs = secs
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid HTTP_TIMEOUT_SECS: {}", secs)))?;
        }

        Ok(config)
    }

    /// Validate the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(PipelineError::Config(
                "DATABASE_URL must be set".to_string(),
            ));
        }
        if self.periods == 0 {
            return Err(PipelineError::Config(
                "SCRAPE_PERIODS must be at least 1".to_string(),
            ));
        }
        if self.region_code.is_empty() {
            return Err(PipelineError::Config(
                "REGION_CODE cannot be empty".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "HTTP_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.scrape && self.target_file_ids.is_empty() {
            return Err(PipelineError::Config(
                "SOURCE_FILE_IDS cannot be empty when scraping is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Destination table (unqualified) for a dataset kind.
    pub fn table_for(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::Benchmarking => &self.table_benchmarking,
            DatasetKind::ByReason => &self.table_byreason,
        }
    }

    /// Schema-qualified destination table for a dataset kind.
    pub fn qualified_table(&self, kind: DatasetKind) -> String {
        format!("{}.{}", self.schema, self.table_for(kind))
    }
}

/// Tri-state env flag: unset means "keep the default".
///
/// Matches the workflow convention where any set value other than "false"
/// enables the flag.
fn env_flag(name: &str) -> Option<bool> {
    match std::env::var(name) {
        Ok(v) if v.is_empty() => None,
        Ok(v) => Some(!v.eq_ignore_ascii_case("false") && v != "0"),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.publication, "nhs-sickness-absence-rates");
        assert_eq!(config.periods, 1);
        assert_eq!(config.region_code, "Y56");
        assert!(!config.scrape);
        assert!(config.cleanse);
        assert_eq!(config.overwrite_policy, OverwritePolicy::NeverOverwrite);
    }

    #[test]
    fn test_table_for_kind() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.table_for(DatasetKind::Benchmarking),
            "sickness_absence"
        );
        assert_eq!(
            config.qualified_table(DatasetKind::ByReason),
            "public.sickness_absence_by_reason"
        );
    }

    #[test]
    fn test_validate_requires_database_url() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_err());

        let mut config = config;
        config.database_url = "postgres://localhost/warehouse".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        let mut config = PipelineConfig {
            database_url: "postgres://localhost/warehouse".to_string(),
            ..Default::default()
        };
        config.periods = 0;
        assert!(config.validate().is_err());
    }
}
