//! Rejection and error responses.
//!
//! # Responsibilities
//! - Stable JSON error envelope: {status, message, error_code, retry_after?}
//! - 429 for rate/block rejections, 502 for upstream failure, 500 otherwise
//! - Map backend transport errors to a synthesized response, never a panic
//!
//! # Design Decisions
//! - A freshly created block advertises the full configured duration as
//!   retry_after; an already-active block advertises actual remaining time

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    #[serde(rename = "BACKEND_UNAVAILABLE")]
    BackendUnavailable,
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: bool,
    message: String,
    error_code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<i64>,
}

fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    error_code: ErrorCode,
    retry_after: Option<i64>,
) -> Response {
    (
        status,
        Json(ErrorBody {
            status: false,
            message: message.into(),
            error_code,
            retry_after,
        }),
    )
        .into_response()
}

/// Rejection for an IP with an already-active block.
pub fn blocked_response(retry_after: i64) -> Response {
    error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "Your IP address is temporarily blocked. Please try again later.",
        ErrorCode::RateLimitExceeded,
        Some(retry_after),
    )
}

/// Rejection for an IP that just exceeded its window budget.
pub fn rate_limited_response(retry_after: i64) -> Response {
    error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "Rate limit exceeded. Your IP address has been blocked.",
        ErrorCode::RateLimitExceeded,
        Some(retry_after),
    )
}

/// Synthesized response for an unreachable or failing upstream.
pub fn upstream_unavailable_response() -> Response {
    error_response(
        StatusCode::BAD_GATEWAY,
        "The backend service is currently unavailable.",
        ErrorCode::BackendUnavailable,
        None,
    )
}

/// Rejection for a request body over the configured size limit.
pub fn payload_too_large_response() -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        "Request body too large.",
        ErrorCode::GatewayError,
        None,
    )
}

/// Last-resort response for unexpected internal failures.
pub fn internal_error_response() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "An unexpected gateway error occurred.",
        ErrorCode::GatewayError,
        None,
    )
}
