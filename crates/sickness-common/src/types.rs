//! Domain types shared across the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// The two dataset families published in each sickness absence release.
///
/// The kind drives the canonical filename, the column handling in the
/// transform stage, and the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    /// Organisation-level absence rates (the benchmarking tool extract).
    Benchmarking,
    /// Absence broken down by recorded reason.
    ByReason,
}

impl DatasetKind {
    /// Classify a source file by its name.
    ///
    /// Both raw and already-canonicalized names of the by-reason extract
    /// contain the word "reason", so cleansed and uncleansed names classify
    /// identically.
    pub fn classify(filename: &str) -> Self {
        if filename.to_lowercase().contains("reason") {
            DatasetKind::ByReason
        } else {
            DatasetKind::Benchmarking
        }
    }

    /// The token used in canonical filenames and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Benchmarking => "Benchmarking",
            DatasetKind::ByReason => "ByReason",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when filename canonicalization or archival would land on a
/// name that is already taken.
///
/// Resolved once per run from configuration and passed down, rather than
/// mutated through shared state mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Replace the existing file.
    AlwaysOverwrite,
    /// Leave both files untouched and skip the conflicting source.
    #[default]
    NeverOverwrite,
    /// Ask on stdin at each conflict (interactive runs only).
    PromptPerConflict,
}

impl std::str::FromStr for OverwritePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" | "overwrite" | "always-overwrite" => Ok(OverwritePolicy::AlwaysOverwrite),
            "never" | "skip" | "never-overwrite" => Ok(OverwritePolicy::NeverOverwrite),
            "prompt" | "ask" | "prompt-per-conflict" => Ok(OverwritePolicy::PromptPerConflict),
            _ => Err(anyhow::anyhow!("Invalid overwrite policy: {}", s)),
        }
    }
}

impl std::fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverwritePolicy::AlwaysOverwrite => write!(f, "always-overwrite"),
            OverwritePolicy::NeverOverwrite => write!(f, "never-overwrite"),
            OverwritePolicy::PromptPerConflict => write!(f, "prompt-per-conflict"),
        }
    }
}
