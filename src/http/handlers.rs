//! Route handlers.

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::admission::Decision;
use crate::http::request::{parse_destination, WithdrawRequest};
use crate::http::response::{
    relay_status, AdmissionResponse, ApiError, HealthResponse, WithdrawResponse,
};
use crate::http::server::AppState;
use crate::observability::metrics;

fn finish(route: &'static str, response: Response) -> Response {
    metrics::record_request(route, response.status().as_u16());
    response
}

/// `POST /validate-ip`: standalone cooldown check that records the grant.
pub async fn validate_ip(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let identity = state.identity_source.resolve(peer, &headers);
    tracing::info!(identity = %identity, "Admission check requested");

    let response = match state.guard.admit(&identity).await {
        Ok(decision) => Json(AdmissionResponse::from(decision)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    };
    finish("validate_ip", response)
}

/// `POST /withdraw`: claim an admission grant, then relay.
///
/// A grant recorded by `/validate-ip` within the claim window is spent here,
/// so the check-then-withdraw flow and a bare withdrawal both pay out once.
pub async fn withdraw(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Response {
    let response = match process_withdrawal(&state, peer, &headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    finish("withdraw", response)
}

async fn process_withdrawal(
    state: &AppState,
    peer: SocketAddr,
    headers: &HeaderMap,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidDestination(e.body_text()))?;
    let destination = parse_destination(&request.destination, state.strict_validation)
        .map_err(ApiError::InvalidDestination)?;

    let identity = state.identity_source.resolve(peer, headers);
    tracing::info!(identity = %identity, destination = %destination, "Withdrawal requested");

    if let Decision::Denied { retry_after } = state.guard.claim(&identity).await? {
        let body = WithdrawResponse::denied(retry_after.as_secs().max(1));
        return Ok(Json(body).into_response());
    }

    let response = match state.relay.submit(destination).await {
        Ok(tx_hash) => (
            StatusCode::OK,
            Json(WithdrawResponse::submitted(tx_hash.to_string())),
        ),
        Err(e) => (relay_status(&e), Json(WithdrawResponse::failed(&e))),
    };
    Ok(response.into_response())
}

/// `GET /health`: always 200; reports ledger reachability.
pub async fn health(State(state): State<AppState>) -> Response {
    let ledger_reachable = state.relay.ledger().is_healthy().await;
    let body = HealthResponse {
        status: if ledger_reachable { "ok" } else { "degraded" },
        ledger_reachable,
    };
    finish("health", Json(body).into_response())
}
