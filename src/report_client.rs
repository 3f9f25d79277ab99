use crate::errors::AppError;
use crate::models::{extract_records, SourceRecord, UpstreamRequestBody};
use serde_json::Value;

pub const REPORT_DATA_PATH: &str = "/api/report_data";

/// Client for the MOPH open-data report API.
#[derive(Clone)]
pub struct ReportApiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ReportApiClient {
    /// Creates a new `ReportApiClient`.
    ///
    /// No request timeout is configured: large reports can take minutes to
    /// render upstream and the caller is expected to wait for them.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the report API, without the report path.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            AppError::Internal(format!("Failed to create report API client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), REPORT_DATA_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Requests one report and returns its records.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - 200 response without a non-empty `data` array.
    /// * `Ok(Some(records))` - the records in upstream order.
    /// * `Err(AppError::UpstreamStatus)` - any status other than 200.
    /// * `Err(AppError::UpstreamUnreachable)` - transport failure.
    pub async fn fetch_report(
        &self,
        body: &UpstreamRequestBody,
    ) -> Result<Option<Vec<SourceRecord>>, AppError> {
        tracing::info!(
            "Fetching data from API: {} with Request Body: {}",
            self.endpoint,
            serde_json::to_string(body).unwrap_or_default()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnreachable(format!("Report API request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // reqwest drops the reason phrase sent on the wire; the canonical
            // one for the code is the closest available.
            let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                "API returned an error status: {} {} - {}",
                status.as_u16(),
                status_text,
                error_text
            );
            return Err(AppError::UpstreamStatus {
                status,
                status_text,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            AppError::UpstreamUnreachable(format!("Failed to read report API response: {}", e))
        })?;

        let payload: Value = match serde_json::from_slice(&bytes) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Report API response is not JSON: {}", e);
                return Ok(None);
            }
        };

        match extract_records(&payload) {
            Some(records) => {
                tracing::info!("Fetched {} records.", records.len());
                Ok(Some(records))
            }
            None => {
                tracing::info!(
                    "No data received or received data is not an array from the specified API."
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ReportApiClient::new("https://example.com/").unwrap();
        assert_eq!(client.endpoint(), "https://example.com/api/report_data");
    }
}
