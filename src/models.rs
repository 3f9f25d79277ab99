use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, VALIDATION_MESSAGE};

// ============ Inbound ============

/// Body of `POST /fetch-and-save-report`.
///
/// Read leniently from any JSON value: a field that is missing or falsy, and
/// every field of a body that is not an object, surfaces as a validation
/// error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct ReportRequest {
    pub report_name: Option<String>,
    pub year: Option<String>,
    pub province: Option<String>,
}

impl From<Value> for ReportRequest {
    fn from(body: Value) -> Self {
        let Value::Object(fields) = body else {
            return Self::default();
        };
        let field = |key: &str| fields.get(key).and_then(truthy_string);
        Self {
            report_name: field("reportName"),
            year: field("year"),
            province: field("province"),
        }
    }
}

/// A request whose three fields are all present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReportRequest {
    pub report_name: String,
    pub year: String,
    pub province: String,
}

impl ReportRequest {
    pub fn new(report_name: &str, year: &str, province: &str) -> Self {
        Self {
            report_name: Some(report_name.to_string()),
            year: Some(year.to_string()),
            province: Some(province.to_string()),
        }
    }

    pub fn validate(self) -> Result<ValidReportRequest, AppError> {
        match (self.report_name, self.year, self.province) {
            (Some(report_name), Some(year), Some(province))
                if !report_name.is_empty() && !year.is_empty() && !province.is_empty() =>
            {
                Ok(ValidReportRequest {
                    report_name,
                    year,
                    province,
                })
            }
            _ => Err(AppError::Validation(VALIDATION_MESSAGE.to_string())),
        }
    }
}

/// Strings and non-zero numbers; `""`, `0`, null, booleans and structured
/// values count as absent.
fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

// ============ Report API ============

/// POST body sent to the report API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRequestBody {
    pub table_name: String,
    pub year: String,
    pub province: String,
    #[serde(rename = "type")]
    pub format: String,
}

impl From<&ValidReportRequest> for UpstreamRequestBody {
    fn from(request: &ValidReportRequest) -> Self {
        Self {
            table_name: request.report_name.clone(),
            year: request.year.clone(),
            province: request.province.clone(),
            format: "json".to_string(),
        }
    }
}

/// One element of the report API's `data` array. Left untyped on purpose:
/// column coercion is the database's job.
pub type SourceRecord = serde_json::Map<String, Value>;

/// Pulls the record array out of a report API body.
///
/// Returns `None` when `data` is missing, not an array or empty. Array
/// elements that are not objects are kept as empty records so every element
/// still gets an insert attempt.
pub fn extract_records(body: &Value) -> Option<Vec<SourceRecord>> {
    let data = body.get("data")?.as_array()?;
    if data.is_empty() {
        return None;
    }

    Some(
        data.iter()
            .map(|item| item.as_object().cloned().unwrap_or_default())
            .collect(),
    )
}

// ============ Database ============

pub const TARGET_COLUMNS: [&str; 7] = [
    "id", "hospcode", "areacode", "date_com", "b_year", "target", "result",
];

/// Column values for one insert into the report table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    pub id: Value,
    pub hospcode: Value,
    pub areacode: Value,
    pub date_com: Value,
    pub b_year: Value,
    pub target: Value,
    pub result: Value,
}

impl TargetRow {
    /// `b_year` comes from the request, everything else from the record.
    pub fn from_record(record: &SourceRecord, year: &str) -> Self {
        let field = |key: &str| record.get(key).cloned().unwrap_or(Value::Null);
        Self {
            id: field("id"),
            hospcode: field("hospcode"),
            areacode: field("areacode"),
            date_com: field("date_com"),
            b_year: Value::String(year.to_string()),
            target: field("target"),
            result: field("result"),
        }
    }

    /// JSON object keyed by column name, fed to `jsonb_populate_record`.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============ Outcome ============

/// Result of one relay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelayOutcome {
    /// The report API returned no usable record array.
    NoData,
    /// Records were loaded and the transaction committed.
    Saved(LoadStats),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub fetched: usize,
    pub inserted: usize,
    pub failed: usize,
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} fetched, {} inserted, {} failed",
            self.fetched, self.inserted, self.failed
        )
    }
}

pub const NO_DATA_MESSAGE: &str =
    "No data received or received data is not an array from the specified API.";

impl RelayOutcome {
    pub fn inserted(&self) -> usize {
        match self {
            RelayOutcome::NoData => 0,
            RelayOutcome::Saved(stats) => stats.inserted,
        }
    }

    /// Plain-text message returned to the caller.
    pub fn message(&self) -> String {
        match self {
            RelayOutcome::NoData => NO_DATA_MESSAGE.to_string(),
            RelayOutcome::Saved(stats) => format!(
                "Successfully fetched and saved {} records.",
                stats.inserted
            ),
        }
    }
}
