//! Response bodies and status mapping.
//!
//! # Status Codes
//! - 200: every handled outcome, including denial and relay failures the
//!   ledger reported
//! - 400: malformed destination
//! - 500: cooldown store failure (never reported as a denial)
//! - 503: ledger unreachable

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::admission::{Decision, InfrastructureError};
use crate::blockchain::RelayError;

/// Body of `POST /validate-ip`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<Decision> for AdmissionResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allowed => Self {
                allowed: true,
                retry_after_secs: None,
            },
            Decision::Denied { retry_after } => Self {
                allowed: false,
                retry_after_secs: Some(retry_after.as_secs().max(1)),
            },
        }
    }
}

/// Body of `POST /withdraw`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl WithdrawResponse {
    pub fn submitted(tx_hash: String) -> Self {
        Self {
            success: true,
            transaction_id: Some(tx_hash),
            ..Default::default()
        }
    }

    pub fn denied(retry_after_secs: u64) -> Self {
        Self {
            error: Some("withdrawal cooldown active".to_string()),
            error_kind: Some("denied"),
            retryable: Some(false),
            retry_after_secs: Some(retry_after_secs),
            ..Default::default()
        }
    }

    pub fn failed(err: &RelayError) -> Self {
        Self {
            transaction_id: err.tx_hash().map(|h| h.to_string()),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            retryable: Some(err.retryable()),
            ..Default::default()
        }
    }
}

/// HTTP status for a relay failure.
pub fn relay_status(err: &RelayError) -> StatusCode {
    match err {
        RelayError::NetworkUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::EstimationFailed(_) | RelayError::SubmissionFailed { .. } => StatusCode::OK,
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger_reachable: bool,
}

/// Errors that end a request before any outcome was produced.
#[derive(Debug)]
pub enum ApiError {
    InvalidDestination(String),
    Infrastructure(InfrastructureError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    error_kind: &'static str,
    details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidDestination(details) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Invalid destination",
                    error_kind: "invalid_destination",
                    details,
                },
            ),
            ApiError::Infrastructure(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Internal server error",
                    error_kind: "infrastructure",
                    details: e.to_string(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<InfrastructureError> for ApiError {
    fn from(e: InfrastructureError) -> Self {
        ApiError::Infrastructure(e)
    }
}
