//! Filename canonicalization.
//!
//! Staged source files arrive under whatever name the publisher (or an
//! operator) gave them. Before processing they are renamed into the
//! canonical convention `"Sickness {Kind} - {YYYY} {MM}.csv"`. Exactly two
//! name forms are accepted:
//!
//! - raw: any name carrying a month token (`March` or `03`) immediately
//!   before an isolated 4-digit year, e.g.
//!   `NHS Sickness Absence benchmarking tool CSV, March 2024.csv`
//! - canonical: the output convention itself, which makes the operation
//!   an idempotent no-op
//!
//! Anything outside those forms is a [`PipelineError::BadFilename`].

use crate::{PipelineError, Result};
use regex::Regex;
use sickness_common::types::{DatasetKind, OverwritePolicy};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Full month names in source filenames, with their 2-digit forms.
const MONTHS: [(&str, &str); 12] = [
    ("January", "01"),
    ("February", "02"),
    ("March", "03"),
    ("April", "04"),
    ("May", "05"),
    ("June", "06"),
    ("July", "07"),
    ("August", "08"),
    ("September", "09"),
    ("October", "10"),
    ("November", "11"),
    ("December", "12"),
];

/// Result of one canonicalization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanseOutcome {
    /// The file was renamed to the canonical name.
    Renamed(String),
    /// The name was already canonical; nothing was touched.
    Unchanged(String),
    /// A different file already owns the canonical name; the source file
    /// was left in place and must be excluded from this run.
    Skipped { target: String },
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Isolated 4-digit run; longer digit runs do not match.
    PATTERN.get_or_init(|| Regex::new(r"\b\d{4}\b").unwrap())
}

/// Compute the canonical name for a source filename.
///
/// Pure naming logic: no filesystem access. Errors are
/// [`PipelineError::BadFilename`] with the reason spelled out for the
/// operator.
pub fn canonical_name(old_filename: &str, kind: DatasetKind) -> Result<String> {
    let bad = |reason: &str| PipelineError::BadFilename {
        filename: old_filename.to_string(),
        reason: reason.to_string(),
    };

    let year_match = year_pattern()
        .find(old_filename)
        .ok_or_else(|| bad("no isolated 4-digit year found; expected e.g. 'March 2024' or '03 2024'"))?;
    let year = year_match.as_str();
    let year_idx = year_match.start();

    // A '-' two characters before the year marks an already-cleansed name,
    // where the month follows as "YYYY MM"; otherwise the month is the
    // token immediately before the year.
    let already_cleansed =
        year_idx >= 2 && old_filename.as_bytes().get(year_idx - 2) == Some(&b'-');

    let month_token = if already_cleansed {
        old_filename
            .get(year_idx + 5..year_idx + 7)
            .ok_or_else(|| bad("cleansed-form name is truncated after the year"))?
    } else {
        // The match start is always a char boundary; anything that is not
        // whitespace-separated from the year stays glued to the token and
        // falls out of the month table below.
        old_filename[..year_idx]
            .split_whitespace()
            .last()
            .ok_or_else(|| bad("no month token before the year"))?
    };

    let month = MONTHS
        .iter()
        .find_map(|(name, number)| {
            (*name == month_token || *number == month_token).then_some(*number)
        })
        .ok_or_else(|| bad("month token is neither a full month name nor a 2-digit month"))?;

    Ok(format!("Sickness {} - {} {}.csv", kind, year, month))
}

/// Canonicalize one staged file's name on disk.
///
/// Idempotent: re-running on an already-canonical name returns
/// [`CleanseOutcome::Unchanged`] without touching the filesystem. When the
/// destination name is taken by a different file the outcome depends on
/// the overwrite policy; there is no precedence rule between two raw
/// files claiming the same canonical name, so the default is to skip.
pub fn cleanse_filename(
    source_dir: &Path,
    old_filename: &str,
    kind: DatasetKind,
    policy: OverwritePolicy,
) -> Result<CleanseOutcome> {
    let new_filename = canonical_name(old_filename, kind)?;

    if new_filename == old_filename {
        return Ok(CleanseOutcome::Unchanged(new_filename));
    }

    let old_path = source_dir.join(old_filename);
    let new_path = source_dir.join(&new_filename);

    if new_path.exists() {
        let overwrite = match policy {
            OverwritePolicy::AlwaysOverwrite => true,
            OverwritePolicy::NeverOverwrite => false,
            OverwritePolicy::PromptPerConflict => prompt_overwrite(&new_filename)?,
        };
        if !overwrite {
            warn!(
                source = old_filename,
                target = %new_filename,
                "Canonical name already taken; skipping file"
            );
            return Ok(CleanseOutcome::Skipped {
                target: new_filename,
            });
        }
    }

    std::fs::rename(&old_path, &new_path)?;
    info!(from = old_filename, to = %new_filename, "Canonicalized filename");
    Ok(CleanseOutcome::Renamed(new_filename))
}

/// Ask the operator whether to overwrite a conflicting target (interactive
/// runs with the prompt-per-conflict policy only).
fn prompt_overwrite(target: &str) -> Result<bool> {
    print!("'{}' already exists. Overwrite? [y/N] ", target);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name_from_month_word() {
        assert_eq!(
            canonical_name("Benchmarking March 2024.csv", DatasetKind::Benchmarking).unwrap(),
            "Sickness Benchmarking - 2024 03.csv"
        );
    }

    #[test]
    fn test_canonical_name_numeric_month_matches_word() {
        let from_word =
            canonical_name("Benchmarking March 2024.csv", DatasetKind::Benchmarking).unwrap();
        let from_number =
            canonical_name("Benchmarking 03 2024.csv", DatasetKind::Benchmarking).unwrap();
        assert_eq!(from_word, from_number);
    }

    #[test]
    fn test_canonical_name_already_canonical() {
        let name = "Sickness ByReason - 2023 11.csv";
        assert_eq!(
            canonical_name(name, DatasetKind::ByReason).unwrap(),
            name
        );
    }

    #[test]
    fn test_canonical_name_full_publisher_label() {
        assert_eq!(
            canonical_name(
                "NHS Sickness Absence rates by staff group and reason CSV, January 2023.csv",
                DatasetKind::ByReason,
            )
            .unwrap(),
            "Sickness ByReason - 2023 01.csv"
        );
    }

    #[test]
    fn test_canonical_name_rejects_missing_year() {
        let err = canonical_name("Benchmarking March.csv", DatasetKind::Benchmarking).unwrap_err();
        assert!(matches!(err, PipelineError::BadFilename { .. }));
    }

    #[test]
    fn test_canonical_name_rejects_long_digit_run() {
        // 5-digit run is not an isolated year.
        let err = canonical_name("Benchmarking March 20244.csv", DatasetKind::Benchmarking)
            .unwrap_err();
        assert!(matches!(err, PipelineError::BadFilename { .. }));
    }

    #[test]
    fn test_canonical_name_rejects_non_space_separator() {
        // An en dash between month and year must fail cleanly, not panic
        // on a byte slice inside the multibyte character.
        let err = canonical_name(
            "Benchmarking March\u{2013}2024.csv",
            DatasetKind::Benchmarking,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::BadFilename { .. }));
    }

    #[test]
    fn test_canonical_name_rejects_unknown_month() {
        let err =
            canonical_name("Benchmarking Mar 2024.csv", DatasetKind::Benchmarking).unwrap_err();
        assert!(matches!(err, PipelineError::BadFilename { .. }));
    }

    #[test]
    fn test_cleanse_renames_file() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "Benchmarking March 2024.csv";
        std::fs::write(dir.path().join(raw), "data").unwrap();

        let outcome = cleanse_filename(
            dir.path(),
            raw,
            DatasetKind::Benchmarking,
            OverwritePolicy::NeverOverwrite,
        )
        .unwrap();

        assert_eq!(
            outcome,
            CleanseOutcome::Renamed("Sickness Benchmarking - 2024 03.csv".to_string())
        );
        assert!(dir.path().join("Sickness Benchmarking - 2024 03.csv").exists());
        assert!(!dir.path().join(raw).exists());
    }

    #[test]
    fn test_cleanse_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "Benchmarking March 2024.csv";
        std::fs::write(dir.path().join(raw), "data").unwrap();

        let first = cleanse_filename(
            dir.path(),
            raw,
            DatasetKind::Benchmarking,
            OverwritePolicy::NeverOverwrite,
        )
        .unwrap();
        let CleanseOutcome::Renamed(canonical) = first else {
            panic!("expected rename");
        };

        let second = cleanse_filename(
            dir.path(),
            &canonical,
            DatasetKind::Benchmarking,
            OverwritePolicy::NeverOverwrite,
        )
        .unwrap();
        assert_eq!(second, CleanseOutcome::Unchanged(canonical));
    }

    #[test]
    fn test_cleanse_conflict_skips_and_loses_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Benchmarking March 2024.csv"), "first").unwrap();
        std::fs::write(dir.path().join("Benchmarking 03 2024.csv"), "second").unwrap();

        let first = cleanse_filename(
            dir.path(),
            "Benchmarking March 2024.csv",
            DatasetKind::Benchmarking,
            OverwritePolicy::NeverOverwrite,
        )
        .unwrap();
        assert!(matches!(first, CleanseOutcome::Renamed(_)));

        let second = cleanse_filename(
            dir.path(),
            "Benchmarking 03 2024.csv",
            DatasetKind::Benchmarking,
            OverwritePolicy::NeverOverwrite,
        )
        .unwrap();
        assert_eq!(
            second,
            CleanseOutcome::Skipped {
                target: "Sickness Benchmarking - 2024 03.csv".to_string()
            }
        );

        // First file's rename untouched, second file still present.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Sickness Benchmarking - 2024 03.csv"))
                .unwrap(),
            "first"
        );
        assert!(dir.path().join("Benchmarking 03 2024.csv").exists());
    }

    #[test]
    fn test_cleanse_always_overwrite_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Sickness Benchmarking - 2024 03.csv"), "old").unwrap();
        std::fs::write(dir.path().join("Benchmarking March 2024.csv"), "new").unwrap();

        let outcome = cleanse_filename(
            dir.path(),
            "Benchmarking March 2024.csv",
            DatasetKind::Benchmarking,
            OverwritePolicy::AlwaysOverwrite,
        )
        .unwrap();

        assert!(matches!(outcome, CleanseOutcome::Renamed(_)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Sickness Benchmarking - 2024 03.csv"))
                .unwrap(),
            "new"
        );
    }
}
