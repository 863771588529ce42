//! Warehouse loading.
//!
//! A load replaces one reporting date in one destination table: delete
//! every existing row for that date, then insert the new rows in bounded
//! batches, all inside a single transaction. Re-loading the same file is
//! therefore idempotent, and a failure part-way leaves the destination
//! untouched.

use crate::table::{Cell, DataTable};
use crate::transform::IcsLookup;
use crate::{PipelineError, Result, INSERT_BATCH_SIZE};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info, warn};

/// Writes transformed tables into the destination database.
pub struct WarehouseLoader {
    pool: PgPool,
}

impl WarehouseLoader {
    /// Connect to the destination database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the ICS reference table with the configured query, which must
    /// return `org_code`, `ics_code` and `ics_name` columns.
    pub async fn load_ics_lookup(&self, query: &str) -> Result<IcsLookup> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let mut lookup = IcsLookup::new();
        for row in &rows {
            let org_code: String = row.try_get("org_code")?;
            let ics_code: String = row.try_get("ics_code")?;
            let ics_name: String = row.try_get("ics_name")?;
            lookup.insert(org_code, ics_code, ics_name);
        }

        info!(organizations = lookup.len(), "Loaded ICS lookup");
        Ok(lookup)
    }

    /// Replace the table's reporting date in the destination.
    ///
    /// Precondition: the table carries exactly one distinct `date_data`
    /// value. Multiple dates abort before any write
    /// ([`PipelineError::MultiDatePrecondition`]); an empty table is a
    /// no-op. Returns the number of rows inserted.
    pub async fn load(&self, table: &DataTable, destination: &str) -> Result<u64> {
        let Some(date) = single_reporting_date(table)? else {
            warn!(destination, "Table is empty after transformation; nothing to load");
            return Ok(0);
        };

        let mut tx = self.pool.begin().await?;

        let delete = format!("DELETE FROM {} WHERE date_data = $1", destination);
        let deleted = sqlx::query(&delete)
            .bind(date)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!(destination, %date, deleted, "Cleared existing rows for reporting date");

        let mut inserted = 0u64;
        for chunk in table.rows.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                destination,
                table.columns.join(", ")
            ));
            builder.push_values(chunk, |mut values, row| {
                for cell in row {
                    match cell {
                        Cell::Text(s) => values.push_bind(s.clone()),
                        Cell::Date(d) => values.push_bind(*d),
                        Cell::Timestamp(t) => values.push_bind(*t),
                        Cell::Null => values.push_bind(None::<String>),
                    };
                }
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        info!(destination, %date, deleted, inserted, "Loaded table");
        Ok(inserted)
    }
}

/// The single distinct reporting date in the table, `None` when empty.
///
/// More than one distinct date violates the replace-by-date contract and
/// must be rejected before any write happens.
pub fn single_reporting_date(table: &DataTable) -> Result<Option<NaiveDate>> {
    let date_idx = table.require_column("date_data")?;

    let mut dates: Vec<NaiveDate> = Vec::new();
    for row in &table.rows {
        match row[date_idx] {
            Cell::Date(date) => {
                if !dates.contains(&date) {
                    dates.push(date);
                }
            }
            _ => {
                return Err(PipelineError::Parse(
                    "reporting-date column holds a non-date value".to_string(),
                ))
            }
        }
    }

    match dates.len() {
        0 => Ok(None),
        1 => Ok(Some(dates[0])),
        count => Err(PipelineError::MultiDatePrecondition { count }),
    }
}
