//! NHS Sickness Absence Rates Ingestion Pipeline
//!
//! Retrieves the periodic sickness absence releases published by NHS
//! Digital, normalizes the human-authored source filenames, reshapes the
//! tabular payload into the warehouse schema, and performs an idempotent
//! replace-by-reporting-date load.
//!
//! Pipeline stages, in data-flow order:
//!
//! - [`publication`]: resolve the latest N period pages for a publication
//! - [`catalog`]: enumerate the downloadable resources on one period page
//! - [`downloader`]: fetch a resource and stage it locally
//! - [`cleanse`]: rename a staged file into the canonical convention
//! - [`table`] / [`transform`]: CSV payload -> warehouse-shaped table
//! - [`loader`]: transactional delete + batch insert per reporting date
//! - [`pipeline`]: drive the stages per file, collecting outcomes
//!
//! All I/O is awaited strictly sequentially; the pipeline never processes
//! two files or two network calls at once.

pub mod catalog;
pub mod cleanse;
pub mod config;
pub mod downloader;
pub mod filename;
pub mod loader;
pub mod pipeline;
pub mod publication;
pub mod table;
pub mod transform;

// Re-export the main types
pub use catalog::{CatalogBuilder, ResourceCatalog, ResourceDescriptor};
pub use cleanse::{cleanse_filename, CleanseOutcome};
pub use config::PipelineConfig;
pub use downloader::Downloader;
pub use filename::{parse_filename, ParsedFilename};
pub use loader::WarehouseLoader;
pub use pipeline::{FileOutcome, FileStatus, Pipeline, RunReport};
pub use publication::{PeriodPage, PublicationResolver};
pub use table::{Cell, DataTable};
pub use transform::{ColumnMap, IcsLookup, Transformer};

/// Rows per INSERT batch during a load.
pub const INSERT_BATCH_SIZE: usize = 200;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error taxonomy for the ingestion pipeline.
///
/// The first group is ambient (transport, database, filesystem); the
/// second group carries the per-file failure kinds the orchestrator
/// reports without aborting the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A required page or anchor was structurally absent. Fatal for the
    /// whole run when it is the latest-period anchor.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-2xx response for one resource; the run continues with the rest.
    #[error("Fetch failed for {url}: HTTP {status}")]
    FetchFailure { url: String, status: u16 },

    /// The filename is outside the enumerated grammar (no isolated 4-digit
    /// year, or an unrecognized month token).
    #[error("Bad filename '{filename}': {reason}")]
    BadFilename { filename: String, reason: String },

    /// Canonicalization would overwrite a different existing file.
    #[error("Naming conflict: '{filename}' canonicalizes to existing '{target}'")]
    NamingConflict { filename: String, target: String },

    /// A required column is missing after the rename/projection step.
    #[error("Schema mismatch: expected column '{column}' is missing")]
    SchemaMismatch { column: String },

    /// A single file carried more than one distinct reporting date; no
    /// partial replace was performed.
    #[error("Load precondition violated: {count} distinct reporting dates in one file (expected exactly 1)")]
    MultiDatePrecondition { count: usize },

    #[error("Parse error: {0}")]
    Parse(String),
}
