//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Parse and validate the withdrawal body
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A bad destination is rejected before the cooldown is consumed

use alloy::primitives::Address;
use axum::http::{HeaderName, HeaderValue, Request};
use serde::Deserialize;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Issues a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Body of `POST /withdraw`.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    #[serde(alias = "address")]
    pub destination: String,
}

/// Parse a 20-byte hex address, optionally rejecting the zero address.
pub fn parse_destination(raw: &str, strict: bool) -> Result<Address, String> {
    let address: Address = raw
        .trim()
        .parse()
        .map_err(|e| format!("invalid destination address '{}': {}", raw, e))?;

    if strict && address.is_zero() {
        return Err("zero address not allowed".to_string());
    }
    Ok(address)
}
