use crate::errors::{AppError, ResultExt};
use crate::models::{TargetRow, TARGET_COLUMNS};
use async_trait::async_trait;
use regex::Regex;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use std::fmt;
use std::sync::OnceLock;

/// Name of the table reports are loaded into, optionally schema-qualified.
///
/// The name ends up inside SQL text, so only plain identifiers are accepted
/// and each part is double-quoted when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62})?$")
            .expect("identifier regex is valid")
    })
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if !identifier_regex().is_match(raw) {
            return Err(format!(
                "'{}' is not a table name (expected table or schema.table)",
                raw
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `"schema"."table"` form for use in SQL text.
    pub fn quoted(&self) -> String {
        self.0
            .split('.')
            .map(|part| format!("\"{}\"", part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single row insert inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    /// The database refused the row; the batch carries on without it.
    Rejected(String),
}

/// Opens report batches against the relational store.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Checks out one connection and begins a transaction on it.
    async fn begin(&self) -> Result<Box<dyn ReportBatch>, AppError>;
}

/// One open transaction on one checked-out connection.
///
/// Dropping the batch hands the connection back to its pool.
#[async_trait]
pub trait ReportBatch: Send {
    /// Inserts one row.
    ///
    /// A refused row is reported as [`RowOutcome::Rejected`] and leaves the
    /// transaction usable; `Err` means the transaction itself is broken.
    async fn insert_row(&mut self, row: &TargetRow) -> Result<RowOutcome, AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;

    /// Rolls the transaction back.
    ///
    /// Returns `false` without touching the database when the transaction has
    /// already ended, which includes a commit attempt that failed.
    async fn rollback(&mut self) -> Result<bool, AppError>;
}

/// PostgreSQL-backed report storage.
pub struct PgReportStore {
    pool: PgPool,
    insert_sql: String,
}

impl PgReportStore {
    pub fn new(pool: PgPool, table: &TableName) -> Self {
        Self {
            pool,
            insert_sql: insert_statement(table),
        }
    }
}

/// Lets the database coerce each untyped JSON value to its column's type.
fn insert_statement(table: &TableName) -> String {
    let columns = TARGET_COLUMNS.join(", ");
    let table = table.quoted();
    format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)"
    )
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn begin(&self) -> Result<Box<dyn ReportBatch>, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to start report transaction")?;
        tracing::debug!("Report transaction started");

        Ok(Box::new(PgReportBatch {
            tx: Some(tx),
            insert_sql: self.insert_sql.clone(),
        }))
    }
}

struct PgReportBatch {
    tx: Option<Transaction<'static, Postgres>>,
    insert_sql: String,
}

impl Drop for PgReportBatch {
    fn drop(&mut self) {
        tracing::debug!("Database connection released back to pool.");
    }
}

#[async_trait]
impl ReportBatch for PgReportBatch {
    async fn insert_row(&mut self, row: &TargetRow) -> Result<RowOutcome, AppError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| AppError::Internal("report transaction already closed".to_string()))?;

        // Postgres poisons the whole transaction on a failed statement, so each
        // row gets its own savepoint.
        let mut savepoint = Connection::begin(&mut **tx)
            .await
            .context("Failed to create row savepoint")?;

        let result = sqlx::query(&self.insert_sql)
            .bind(row.to_json())
            .execute(&mut *savepoint)
            .await;

        match result {
            Ok(_) => {
                savepoint
                    .commit()
                    .await
                    .context("Failed to release row savepoint")?;
                Ok(RowOutcome::Inserted)
            }
            Err(e) => {
                savepoint
                    .rollback()
                    .await
                    .context("Failed to roll back row savepoint")?;
                Ok(RowOutcome::Rejected(e.to_string()))
            }
        }
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("report transaction already closed".to_string()))?;
        tx.commit()
            .await
            .context("Failed to commit report transaction")
    }

    async fn rollback(&mut self) -> Result<bool, AppError> {
        let Some(tx) = self.tx.take() else {
            return Ok(false);
        };
        tx.rollback()
            .await
            .context("Failed to roll back report transaction")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(TableName::parse("report_data").is_ok());
        assert!(TableName::parse("hdc.s_kpi_cvd_risk").is_ok());
        assert!(TableName::parse(" padded ").is_ok());

        assert!(TableName::parse("").is_err());
        assert!(TableName::parse("1table").is_err());
        assert!(TableName::parse("a.b.c").is_err());
        assert!(TableName::parse("report\"; DROP TABLE x; --").is_err());
        assert!(TableName::parse("report data").is_err());
    }

    #[test]
    fn test_table_name_quoting() {
        assert_eq!(
            TableName::parse("report_data").unwrap().quoted(),
            "\"report_data\""
        );
        assert_eq!(
            TableName::parse("hdc.kpi").unwrap().quoted(),
            "\"hdc\".\"kpi\""
        );
    }

    #[test]
    fn test_table_name_try_from() {
        let name = TableName::try_from("hdc.kpi".to_string()).unwrap();
        assert_eq!(name.as_str(), "hdc.kpi");
        assert!(TableName::try_from("bad name".to_string()).is_err());
    }

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement(&TableName::parse("hdc.kpi").unwrap());
        assert_eq!(
            sql,
            "INSERT INTO \"hdc\".\"kpi\" (id, hospcode, areacode, date_com, b_year, target, result) \
             SELECT id, hospcode, areacode, date_com, b_year, target, result \
             FROM jsonb_populate_record(NULL::\"hdc\".\"kpi\", $1)"
        );
    }
}
