use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

pub const VALIDATION_MESSAGE: &str =
    "Please provide reportName, year, and province in the Request Body (JSON).";
pub const UNREACHABLE_MESSAGE: &str = "Error sending request to API: No response received.";

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// A required request field is missing or empty.
    Validation(String),
    /// The report API answered with something other than 200.
    UpstreamStatus {
        /// Status returned by the report API, mirrored to the caller.
        status: StatusCode,
        /// Reason phrase for `status`.
        status_text: String,
    },
    /// The report API could not be reached or the response never arrived.
    UpstreamUnreachable(String),
    /// No pooled connection could be acquired.
    PoolExhausted(String),
    /// Database-related errors.
    Database(sqlx::Error),
    /// Internal server error.
    Internal(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// HTTP status the caller receives for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamStatus { status, .. } => *status,
            AppError::UpstreamUnreachable(_)
            | AppError::PoolExhausted(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::WithContext { source, .. } => source.status(),
        }
    }

    /// Innermost error, skipping context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Plain-text body returned to the caller.
    pub fn response_body(&self) -> String {
        match self.root() {
            AppError::Validation(msg) => msg.clone(),
            AppError::UpstreamStatus { status_text, .. } => {
                format!("Error fetching data from API: {}", status_text)
            }
            AppError::UpstreamUnreachable(_) => UNREACHABLE_MESSAGE.to_string(),
            _ => format!("Internal Server Error: {}", self),
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::UpstreamStatus {
                status,
                status_text,
            } => write!(
                f,
                "Report API returned status {}: {}",
                status.as_u16(),
                status_text
            ),
            AppError::UpstreamUnreachable(msg) => write!(f, "Report API unreachable: {}", msg),
            AppError::PoolExhausted(msg) => {
                write!(f, "No database connection available: {}", msg)
            }
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into a plain-text HTTP response.
    ///
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let status = self.status();
        match self.root() {
            AppError::Validation(msg) => tracing::warn!("Rejected request: {}", msg),
            AppError::UpstreamStatus { .. } => tracing::error!("{}", self),
            _ => tracing::error!("Request failed: {}", self),
        }

        (status, self.response_body()).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    ///
    /// Pool timeouts and a closed pool mean no connection could be checked out.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::PoolExhausted(err.to_string())
            }
            other => AppError::Database(other),
        }
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamUnreachable(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: context.into(),
        })
    }
}
