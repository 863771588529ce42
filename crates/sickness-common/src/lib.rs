//! Shared plumbing for the sickness absence ingestion workspace.
//!
//! This crate provides the pieces every workspace member needs:
//!
//! - **Logging**: tracing subscriber initialization with env-driven
//!   configuration (console and optional rotated file output)
//! - **Types**: domain types shared between the pipeline stages
//!   ([`types::DatasetKind`], [`types::OverwritePolicy`])

pub mod logging;
pub mod types;

pub use types::{DatasetKind, OverwritePolicy};
