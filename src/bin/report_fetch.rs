//! One-shot fetch-and-save of a single report, without the HTTP server.
//!
//! Usage: `report-fetch <reportName> <year> <province>`

use std::sync::Arc;

use moph_report_relay::config::Config;
use moph_report_relay::db::Database;
use moph_report_relay::db_storage::PgReportStore;
use moph_report_relay::models::ReportRequest;
use moph_report_relay::relay::ReportRelay;
use moph_report_relay::report_client::ReportApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [report_name, year, province] = args.as_slice() else {
        anyhow::bail!("Usage: report-fetch <reportName> <year> <province>");
    };

    let config = Config::from_env()?;
    let db = Database::new(&config.database).await?;
    let store = Arc::new(PgReportStore::new(db.pool.clone(), &config.report_table));
    let relay = ReportRelay::new(ReportApiClient::new(&config.api_base_url)?, store);

    let result = relay
        .handle(ReportRequest::new(report_name, year, province))
        .await;
    db.close().await;

    let outcome = result?;
    println!("{}", outcome.message());

    Ok(())
}
