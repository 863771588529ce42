//! In-memory tabular payloads.
//!
//! A [`DataTable`] is the unit passed from CSV parsing through the
//! transform steps into the loader: a header row plus typed cells. Cells
//! start life as text straight off the CSV and are coerced to dates and
//! timestamps by the transform steps that own those columns.

use crate::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;

/// One typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Cell {
    /// Text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// A rectangular table: named columns and uniform-width rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Read a CSV file into a table of text cells.
    ///
    /// The first record is the header. Every cell comes in as text; type
    /// coercion happens downstream.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;

        let columns = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut table = DataTable::new(columns);
        for record in reader.records() {
            let record = record?;
            table
                .rows
                .push(record.iter().map(|v| Cell::Text(v.to_string())).collect());
        }

        Ok(table)
    }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a named column, or a [`PipelineError::SchemaMismatch`]
    /// when the column is required and absent.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::SchemaMismatch {
                column: name.to_string(),
            })
    }

    /// Remove a column and every row's cell in it.
    pub fn drop_column(&mut self, index: usize) {
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
    }

    /// Append a column whose cells are produced per row.
    pub fn push_column<F>(&mut self, name: &str, mut cell: F)
    where
        F: FnMut(&[Cell]) -> Cell,
    {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            let value = cell(row);
            row.push(value);
        }
    }

    /// Keep only rows matching the predicate.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
