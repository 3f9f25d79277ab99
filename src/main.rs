use std::sync::Arc;

use moph_report_relay::config::Config;
use moph_report_relay::db::Database;
use moph_report_relay::db_storage::PgReportStore;
use moph_report_relay::handlers::{self, AppState, FETCH_AND_SAVE_PATH};
use moph_report_relay::relay::ReportRelay;
use moph_report_relay::report_client::ReportApiClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection pool.
/// - Report API client.
/// - HTTP routes and middleware.
///
/// It then serves until SIGINT/SIGTERM and closes the pool on the way out.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moph_report_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database).await?;
    tracing::info!("Database connection pool established");

    let client = ReportApiClient::new(&config.api_base_url)?;
    tracing::info!("Report API client initialized: {}", client.endpoint());

    let store = Arc::new(PgReportStore::new(db.pool.clone(), &config.report_table));
    let app_state = Arc::new(AppState {
        relay: ReportRelay::new(client, store),
    });

    let app = handlers::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server is running on http://localhost:{}", config.port);
    tracing::info!(
        "Endpoint to fetch report: POST http://localhost:{}{}",
        config.port,
        FETCH_AND_SAVE_PATH
    );
    tracing::info!(
        r#"Example Request Body (JSON): {{ "reportName": "s_kpi_cvd_risk", "year": "2567", "province": "51" }}"#
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                tracing::warn!("Failed to register signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received, draining requests");
}
