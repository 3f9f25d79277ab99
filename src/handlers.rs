use crate::errors::AppError;
use crate::models::ReportRequest;
use crate::relay::ReportRelay;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub const FETCH_AND_SAVE_PATH: &str = "/fetch-and-save-report";

/// Request bodies are three short strings; anything bigger is a mistake.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The fetch-and-save pipeline.
    pub relay: ReportRelay,
}

/// Builds the HTTP router with its middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    let report_routes = Router::new()
        .route(FETCH_AND_SAVE_PATH, post(fetch_and_save_report))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Router::new()
        .route("/health", get(health))
        .merge(report_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /fetch-and-save-report
///
/// Fetches `{reportName, year, province}` from the report API and saves the
/// rows. A body that cannot be read as JSON is answered like one with
/// missing fields.
///
/// # Returns
///
/// * `Result<(StatusCode, String), AppError>` - plain-text summary or error.
pub async fn fetch_and_save_report(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<(StatusCode, String), AppError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("Unreadable request body: {}", rejection.body_text());
            ReportRequest::default()
        }
    };
    tracing::info!("POST {} - params: {:?}", FETCH_AND_SAVE_PATH, request);

    let outcome = state.relay.handle(request).await?;

    Ok((StatusCode::OK, outcome.message()))
}
