use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use comtrade_reader::{ComtradeError, QueryError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub dataset_id: String,
    pub name: String,
    pub created_at: i64,
    pub size_bytes: u64,
}

/// Written next to the uploaded files as `dataset.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetManifest {
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub dataset_id: String,
    pub name: String,
}

/// Error body: `{ "error": { "code", "message", "details" } }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn internal(detail: impl ToString) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal server error")
            .with_details(json!({ "detail": detail.to_string() }))
    }
}

impl From<ComtradeError> for ApiError {
    fn from(e: ComtradeError) -> Self {
        let message = match e.code() {
            "CFG_PARSE_FAILED" => "configuration file (.cfg) could not be parsed",
            "DAT_PARSE_FAILED" => "data file (.dat) could not be parsed",
            "VERSION_UNSUPPORTED" => "unsupported COMTRADE revision",
            "DATA_TYPE_UNSUPPORTED" => "unsupported data file type",
            _ => "failed to parse COMTRADE files",
        };
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.code(), message)
            .with_details(json!({ "error": e.to_string() }))
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match e {
            QueryError::NoData => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::NoChannels | QueryError::BadMethod(_) => StatusCode::BAD_REQUEST,
        };
        let details = match e {
            QueryError::NoChannels => json!({ "hint": "select channels with ?A=1,2&D=1" }),
            _ => Value::Null,
        };
        Self::new(status, e.code(), e.to_string()).with_details(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
