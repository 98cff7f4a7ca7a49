//! Request failures and how each one is answered

use crate::response::{self, HttpResponse};
use crate::store::StoreError;
use hyper::StatusCode;
use serde_json::{Map, Value};
use statskv_common::ValidationIssues;
use tracing::error;

pub const UNAUTHORIZED_MESSAGE: &str = "No valid 'API-KEY' in request headers.";
pub const INVALID_BODY_NOTE: &str = "Received body doesn't match schema.";
pub const INCONSISTENT_RECORD_NOTE: &str = "KV statsObject doesn't match schema. Not updating KV.";
pub const NOT_FOUND_MESSAGE: &str = "Not found.";
const STORE_FAILURE_MESSAGE: &str = "Failed to access the key-value store.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or wrong API key")]
    Unauthorized,

    #[error("request body doesn't match schema: {0}")]
    InvalidBody(ValidationIssues),

    #[error("stored record doesn't match schema: {0}")]
    InconsistentRecord(ValidationIssues),

    #[error("unsupported method")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::InconsistentRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        let status = self.status();
        match self {
            ApiError::Unauthorized => response::text(status, UNAUTHORIZED_MESSAGE),
            ApiError::NotFound => response::text(status, NOT_FOUND_MESSAGE),
            ApiError::InvalidBody(issues) => issue_response(status, INVALID_BODY_NOTE, &issues),
            ApiError::InconsistentRecord(issues) => {
                issue_response(status, INCONSISTENT_RECORD_NOTE, &issues)
            }
            ApiError::Store(_) | ApiError::Encode(_) => {
                response::text(status, STORE_FAILURE_MESSAGE)
            }
        }
    }
}

/// `{"note": ..., "_errors": [...], "<field>": {...}}`
fn issue_response(status: StatusCode, note: &str, issues: &ValidationIssues) -> HttpResponse {
    let mut body = Map::new();
    body.insert("note".to_string(), Value::String(note.to_string()));
    body.extend(issues.format());

    response::json(status, &body).unwrap_or_else(|e| {
        error!("Failed to encode validation issues: {}", e);
        response::text(StatusCode::INTERNAL_SERVER_ERROR, STORE_FAILURE_MESSAGE)
    })
}
