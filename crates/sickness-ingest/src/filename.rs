//! Source filename parsing.
//!
//! NHS Digital names its downloadable resources with a human-readable
//! label, an optional comma-delimited period, and an extension, e.g.
//! `NHS Sickness Absence benchmarking tool CSV, March 2024.csv`. Links on
//! the site escape spaces and commas (`%20` / `%2C`); both forms must
//! parse to the same record.

/// A source filename decomposed into its stable parts.
///
/// `file_id` is the label the publisher uses to identify the dataset and
/// is the join key for picking resources out of a period catalog. `period`
/// is absent for resources whose name carries no comma-delimited period
/// suffix; callers must not assume it is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub file_id: String,
    pub period: Option<String>,
    pub extension: String,
}

/// Parse a remote URL or local filename into its parts.
///
/// Total over every input: the final path segment is percent-decoded for
/// the two escapes the source is known to use, then split on the last
/// comma (label vs period) and the last dot (period vs extension). Inputs
/// without a comma yield `period = None`; inputs without a dot yield an
/// empty extension.
pub fn parse_filename(raw: &str) -> ParsedFilename {
    // Only the final path segment carries the filename.
    let segment = raw.rsplit('/').next().unwrap_or(raw);
    let cleaned = segment.replace("%20", " ").replace("%2C", ",");

    match cleaned.rfind(',') {
        Some(comma) => {
            let file_id = cleaned[..comma].trim().to_string();
            let rest = cleaned[comma + 1..].trim();
            match rest.rfind('.') {
                Some(dot) => ParsedFilename {
                    file_id,
                    period: Some(rest[..dot].trim().to_string()),
                    extension: rest[dot + 1..].to_string(),
                },
                None => ParsedFilename {
                    file_id,
                    period: Some(rest.to_string()),
                    extension: String::new(),
                },
            }
        },
        None => match cleaned.rfind('.') {
            Some(dot) => ParsedFilename {
                file_id: cleaned[..dot].trim().to_string(),
                period: None,
                extension: cleaned[dot + 1..].to_string(),
            },
            None => ParsedFilename {
                file_id: cleaned.trim().to_string(),
                period: None,
                extension: String::new(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_period() {
        let parsed = parse_filename(
            "NHS Sickness Absence benchmarking tool CSV, March 2024.csv",
        );
        assert_eq!(parsed.file_id, "NHS Sickness Absence benchmarking tool CSV");
        assert_eq!(parsed.period.as_deref(), Some("March 2024"));
        assert_eq!(parsed.extension, "csv");
    }

    #[test]
    fn test_parse_escaped_equals_unescaped() {
        let escaped = parse_filename(
            "https://files.digital.nhs.uk/AB/NHS%20Sickness%20Absence%20benchmarking%20tool%20CSV%2C%20March%202024.csv",
        );
        let plain = parse_filename(
            "NHS Sickness Absence benchmarking tool CSV, March 2024.csv",
        );
        assert_eq!(escaped, plain);
    }

    #[test]
    fn test_parse_final_segment_only() {
        let parsed = parse_filename(
            "https://files.digital.nhs.uk/C1/D2E3F4/Sickness%20rates%20CSV%2C%20January%202023.csv",
        );
        assert_eq!(parsed.file_id, "Sickness rates CSV");
        assert_eq!(parsed.period.as_deref(), Some("January 2023"));
    }

    #[test]
    fn test_parse_without_period() {
        let parsed = parse_filename("Background quality report.pdf");
        assert_eq!(parsed.file_id, "Background quality report");
        assert_eq!(parsed.period, None);
        assert_eq!(parsed.extension, "pdf");
    }

    #[test]
    fn test_parse_total_on_bare_token() {
        // No comma, no dot: still a full record, never a panic.
        let parsed = parse_filename("notes");
        assert_eq!(parsed.file_id, "notes");
        assert_eq!(parsed.period, None);
        assert_eq!(parsed.extension, "");
    }

    #[test]
    fn test_parse_splits_on_last_comma_and_dot() {
        let parsed = parse_filename("Rates, by org, April 2024.data.csv");
        assert_eq!(parsed.file_id, "Rates, by org");
        assert_eq!(parsed.period.as_deref(), Some("April 2024.data"));
        assert_eq!(parsed.extension, "csv");
    }
}
