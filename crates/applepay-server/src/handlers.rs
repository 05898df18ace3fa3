//! HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::Instrument;

use applepay_core::{PayRequest, RelayErrorBody, ValidateSessionRequest};
use applepay_gateway::{GatewayError, UpstreamBody};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub validation_configured: bool,
    pub processor: String,
}

type ApiError = (StatusCode, Json<RelayErrorBody>);

fn gateway_error(e: GatewayError) -> ApiError {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(%status, error = %e, "Relay request failed");
    } else {
        tracing::warn!(%status, error = %e, "Relay request rejected");
    }

    (
        status,
        Json(RelayErrorBody {
            error: e.user_message(),
            code: e.code().into(),
            upstream: e.upstream_body().cloned(),
        }),
    )
}

fn rejection_error(rejection: JsonRejection) -> ApiError {
    tracing::warn!(error = %rejection.body_text(), "Malformed request body");
    (
        StatusCode::BAD_REQUEST,
        Json(RelayErrorBody {
            error: rejection.body_text(),
            code: "INVALID_REQUEST".into(),
            upstream: None,
        }),
    )
}

/// Relay an upstream body as-is
fn upstream_response(body: UpstreamBody) -> Response {
    let content_type = body
        .content_type
        .unwrap_or_else(|| "application/json".to_string());
    ([(header::CONTENT_TYPE, content_type)], body.bytes).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        validation_configured: state.relay.validation_configured(),
        processor: state.relay.processor_name().to_string(),
    })
}

/// Exchange Apple's validation URL for a merchant session
pub async fn validate_session(
    State(state): State<AppState>,
    payload: Result<Json<ValidateSessionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(rejection_error)?;

    let body = state
        .relay
        .validate_session(&request)
        .await
        .map_err(gateway_error)?;

    Ok(upstream_response(body))
}

/// Tokenize and charge an authorized Apple Pay payment
pub async fn pay(
    State(state): State<AppState>,
    payload: Result<Json<PayRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(rejection_error)?;
    let span = tracing::info_span!("pay", request_id = %uuid::Uuid::new_v4());

    async move {
        state
            .relay
            .pay(&request)
            .await
            .map(upstream_response)
            .map_err(gateway_error)
    }
    .instrument(span)
    .await
}
