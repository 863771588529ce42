//! Transformation of raw source tables into the warehouse schema.
//!
//! The steps run in a fixed order: rename and project columns per the
//! external column map, filter to the configured region, nullify empty
//! cells, split the combined reason column (by-reason dataset only),
//! enrich with the ICS lookup, stamp the upload time, and normalize the
//! reporting date. A required column missing after the rename is a
//! [`PipelineError::SchemaMismatch`] for that file only.

use crate::table::{Cell, DataTable};
use crate::{PipelineError, Result};
use chrono::{NaiveDate, Utc};
use sickness_common::types::DatasetKind;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

// Warehouse column names shared across both datasets.
const COL_ORG_CODE: &str = "org_code";
const COL_REGION_CODE: &str = "region_code";
const COL_REASON: &str = "reason";
const COL_REASON_CODE: &str = "reason_code";
const COL_REASON_DESCRIPTION: &str = "reason_description";
const COL_ICS_CODE: &str = "ics_code";
const COL_ICS_NAME: &str = "ics_name";
const COL_DATE_DATA: &str = "date_data";
const COL_DATE_UPLOAD: &str = "date_upload";

/// Known upstream misattributions, applied unconditionally after the ICS
/// join. RNOH (RAN) is published under North West London but belongs to
/// North Central London; CNWL (RV3) the other way around.
pub const ICS_OVERRIDES: [(&str, &str, &str); 2] = [
    ("RAN", "QMJ", "North Central London"),
    ("RV3", "QRV", "North West London"),
];

/// Date formats accepted for the reporting-date column, day-first where
/// the format is ambiguous.
const DATE_DATA_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d %B %Y"];

// ============================================================================
// Column map
// ============================================================================

/// Source-name to output-name column map, loaded from a small external
/// CSV resource. Map order defines output column order.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    entries: Vec<(String, String)>,
}

impl ColumnMap {
    /// Load the map from a CSV with `source_name,output_name` headers.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        let source_idx = headers
            .iter()
            .position(|h| h.trim() == "source_name")
            .ok_or_else(|| PipelineError::Config(format!(
                "column map {} is missing a 'source_name' header",
                path.display()
            )))?;
        let output_idx = headers
            .iter()
            .position(|h| h.trim() == "output_name")
            .ok_or_else(|| PipelineError::Config(format!(
                "column map {} is missing an 'output_name' header",
                path.display()
            )))?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let source = record.get(source_idx).unwrap_or("").trim();
            let output = record.get(output_idx).unwrap_or("").trim();
            if source.is_empty() || output.is_empty() {
                continue;
            }
            entries.push((source.to_string(), output.to_string()));
        }

        debug!(path = %path.display(), entries = entries.len(), "Loaded column map");
        Ok(Self { entries })
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(s, o)| (s.to_string(), o.to_string()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

// ============================================================================
// ICS lookup
// ============================================================================

/// Reference mapping from organization code to Integrated Care System
/// code and name, loaded fresh per run.
#[derive(Debug, Clone, Default)]
pub struct IcsLookup {
    map: HashMap<String, (String, String)>,
}

impl IcsLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, org_code: String, ics_code: String, ics_name: String) {
        self.map.insert(org_code, (ics_code, ics_name));
    }

    pub fn get(&self, org_code: &str) -> Option<(&str, &str)> {
        self.map
            .get(org_code)
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// Transformer
// ============================================================================

/// Applies the warehouse transform to raw source tables.
pub struct Transformer {
    column_map: ColumnMap,
    region_code: String,
}

impl Transformer {
    pub fn new(column_map: ColumnMap, region_code: impl Into<String>) -> Self {
        Self {
            column_map,
            region_code: region_code.into(),
        }
    }

    /// Transform one raw table into its warehouse shape.
    pub fn transform(
        &self,
        raw: &DataTable,
        kind: DatasetKind,
        ics: &IcsLookup,
    ) -> Result<DataTable> {
        let mut table = self.rename_and_project(raw);
        self.filter_region(&mut table)?;
        nullify_empty_cells(&mut table);

        if kind == DatasetKind::ByReason {
            split_reason_column(&mut table)?;
        }

        join_ics_lookup(&mut table, ics)?;
        stamp_upload_time(&mut table);
        parse_reporting_dates(&mut table)?;

        info!(
            kind = %kind,
            rows = table.row_count(),
            columns = table.columns.len(),
            "Transformed table"
        );
        Ok(table)
    }

    /// Rename source columns to output names and keep only mapped
    /// columns, in map order. Map entries whose source column is absent
    /// are tolerated and skipped.
    fn rename_and_project(&self, raw: &DataTable) -> DataTable {
        let selected: Vec<(usize, &str)> = self
            .column_map
            .entries()
            .iter()
            .filter_map(|(source, output)| {
                raw.column_index(source).map(|idx| (idx, output.as_str()))
            })
            .collect();

        let mut table = DataTable::new(
            selected.iter().map(|(_, output)| output.to_string()).collect(),
        );
        for row in &raw.rows {
            table
                .rows
                .push(selected.iter().map(|(idx, _)| row[*idx].clone()).collect());
        }
        table
    }

    /// Keep only rows for the configured region, then drop the region
    /// column since it carries no information afterward.
    fn filter_region(&self, table: &mut DataTable) -> Result<()> {
        let region_idx = table.require_column(COL_REGION_CODE)?;
        let region = self.region_code.as_str();
        table.retain_rows(|row| row[region_idx].as_text() == Some(region));
        table.drop_column(region_idx);
        Ok(())
    }
}

/// Replace empty or whitespace-only text cells with explicit nulls.
fn nullify_empty_cells(table: &mut DataTable) {
    for row in &mut table.rows {
        for cell in row.iter_mut() {
            if let Cell::Text(s) = cell {
                if s.trim().is_empty() {
                    *cell = Cell::Null;
                }
            }
        }
    }
}

/// Split the combined reason column into a 3-character code and a
/// description starting at the 5th character, per the publisher's
/// fixed-width convention (`"S10 Anxiety/stress/..."`).
fn split_reason_column(table: &mut DataTable) -> Result<()> {
    let reason_idx = table.require_column(COL_REASON)?;

    let mut codes = Vec::with_capacity(table.row_count());
    let mut descriptions = Vec::with_capacity(table.row_count());
    for row in &table.rows {
        match row[reason_idx].as_text() {
            Some(reason) => {
                codes.push(Cell::Text(reason.chars().take(3).collect()));
                descriptions.push(Cell::Text(reason.chars().skip(4).collect()));
            }
            None => {
                codes.push(Cell::Null);
                descriptions.push(Cell::Null);
            }
        }
    }

    let mut codes = codes.into_iter();
    table.push_column(COL_REASON_CODE, |_| {
        codes.next().unwrap_or(Cell::Null)
    });
    let mut descriptions = descriptions.into_iter();
    table.push_column(COL_REASON_DESCRIPTION, |_| {
        descriptions.next().unwrap_or(Cell::Null)
    });
    table.drop_column(reason_idx);
    Ok(())
}

/// Left-join the ICS lookup on organization code, then apply the
/// [`ICS_OVERRIDES`] corrections unconditionally.
fn join_ics_lookup(table: &mut DataTable, ics: &IcsLookup) -> Result<()> {
    let org_idx = table.require_column(COL_ORG_CODE)?;

    let ics_code_idx = ensure_column(table, COL_ICS_CODE);
    let ics_name_idx = ensure_column(table, COL_ICS_NAME);

    for row in &mut table.rows {
        let Some(org_code) = row[org_idx].as_text() else {
            continue;
        };

        let joined = ics
            .get(org_code)
            .map(|(code, name)| (code.to_string(), name.to_string()));
        let patched = ICS_OVERRIDES
            .iter()
            .find(|(org, _, _)| *org == org_code)
            .map(|(_, code, name)| (code.to_string(), name.to_string()));

        if let Some((code, name)) = patched.or(joined) {
            row[ics_code_idx] = Cell::Text(code);
            row[ics_name_idx] = Cell::Text(name);
        }
    }
    Ok(())
}

/// Index of a named column, appending it filled with nulls when absent.
fn ensure_column(table: &mut DataTable, name: &str) -> usize {
    match table.column_index(name) {
        Some(idx) => idx,
        None => {
            table.push_column(name, |_| Cell::Null);
            table.columns.len() - 1
        }
    }
}

/// Stamp every row with the same current-time upload marker.
fn stamp_upload_time(table: &mut DataTable) {
    let now = Utc::now();
    table.push_column(COL_DATE_UPLOAD, |_| Cell::Timestamp(now));
}

/// Parse the reporting-date column from day-first date text into
/// normalized date values.
fn parse_reporting_dates(table: &mut DataTable) -> Result<()> {
    let date_idx = table.require_column(COL_DATE_DATA)?;

    for row in &mut table.rows {
        let text = row[date_idx].as_text().ok_or_else(|| {
            PipelineError::Parse("row is missing its reporting date".to_string())
        })?;
        let date = parse_day_first(text)?;
        row[date_idx] = Cell::Date(date);
    }
    Ok(())
}

/// Parse date text, preferring day-first readings of ambiguous formats.
pub fn parse_day_first(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    DATE_DATA_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .ok_or_else(|| PipelineError::Parse(format!("unparseable reporting date: '{}'", text)))
}
