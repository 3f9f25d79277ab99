//! Fetch, validate, transform and load one report per request.

use std::sync::Arc;

use crate::db_storage::{ReportBatch, ReportStore, RowOutcome};
use crate::errors::AppError;
use crate::models::{
    LoadStats, RelayOutcome, ReportRequest, SourceRecord, TargetRow, UpstreamRequestBody,
};
use crate::report_client::ReportApiClient;

/// Relays report datasets from the report API into the report table.
#[derive(Clone)]
pub struct ReportRelay {
    client: ReportApiClient,
    store: Arc<dyn ReportStore>,
}

impl ReportRelay {
    pub fn new(client: ReportApiClient, store: Arc<dyn ReportStore>) -> Self {
        Self { client, store }
    }

    /// Runs the whole pipeline for one request.
    ///
    /// Nothing touches the database unless the report API returned a
    /// non-empty record array.
    pub async fn handle(&self, request: ReportRequest) -> Result<RelayOutcome, AppError> {
        let request = request.validate()?;
        let body = UpstreamRequestBody::from(&request);

        let Some(records) = self.client.fetch_report(&body).await? else {
            return Ok(RelayOutcome::NoData);
        };

        let stats = self.load(&request.year, &records).await?;
        Ok(RelayOutcome::Saved(stats))
    }

    /// Inserts every record inside one transaction and commits it.
    ///
    /// The batch (and with it the pooled connection) is dropped on every
    /// return path.
    async fn load(&self, year: &str, records: &[SourceRecord]) -> Result<LoadStats, AppError> {
        let mut batch = self.store.begin().await?;

        let result = match insert_records(batch.as_mut(), year, records).await {
            Ok(stats) => batch.commit().await.map(|_| stats),
            Err(e) => Err(e),
        };

        match result {
            Ok(stats) => {
                tracing::info!("Successfully inserted {} records ({})", stats.inserted, stats);
                Ok(stats)
            }
            Err(e) => {
                tracing::error!("An overall error occurred: {}", e);
                match batch.rollback().await {
                    Ok(true) => tracing::error!("Transaction rolled back."),
                    Ok(false) => {
                        tracing::error!("Transaction already ended; nothing to roll back.")
                    }
                    Err(rollback_err) => {
                        tracing::error!("Error rolling back transaction: {}", rollback_err)
                    }
                }
                Err(e)
            }
        }
    }
}

/// Attempts one insert per record, in order. Refused rows are logged and
/// counted; only a broken transaction stops the loop.
async fn insert_records(
    batch: &mut dyn ReportBatch,
    year: &str,
    records: &[SourceRecord],
) -> Result<LoadStats, AppError> {
    let mut stats = LoadStats {
        fetched: records.len(),
        ..LoadStats::default()
    };

    for record in records {
        let row = TargetRow::from_record(record, year);
        match batch.insert_row(&row).await? {
            RowOutcome::Inserted => stats.inserted += 1,
            RowOutcome::Rejected(reason) => {
                tracing::warn!(
                    "Error inserting record: {} Record: {}",
                    reason,
                    serde_json::to_string(record).unwrap_or_default()
                );
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
