//! Admin action handlers.
//!
//! A single dispatch route keeps the action surface enumerable: an unknown
//! action answers 400 with the list of valid ones. Every mutating action
//! validates its `ip` parameter as an IP literal before touching the store.

use std::collections::HashMap;
use std::net::IpAddr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::http::server::AppState;

/// Actions the dispatcher understands.
pub const VALID_ACTIONS: [&str; 6] = ["stats", "blocked", "block", "unblock", "check", "logs"];

const DEFAULT_BLOCK_REASON: &str = "Blocked by administrator";
const DEFAULT_LOG_TAIL: usize = 50;

fn ok_data<T: Serialize>(data: T) -> Response {
    Json(json!({"status": true, "data": data})).into_response()
}

fn ok_message(message: &str) -> Response {
    Json(json!({"status": true, "message": message})).into_response()
}

fn bad_request(body: serde_json::Value) -> Response {
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Parse the `ip` parameter; a malformed value rejects the action before
/// any state mutation.
fn require_ip(params: &HashMap<String, String>) -> Result<IpAddr, Response> {
    let raw = params.get("ip").map(String::as_str).unwrap_or("");
    raw.parse::<IpAddr>().map_err(|_| {
        bad_request(json!({
            "status": false,
            "message": format!("'{}' is not a valid IP address", raw),
        }))
    })
}

/// Dispatch one admin action.
pub async fn dispatch_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limiter = &state.limiter;

    match action.as_str() {
        "stats" => ok_data(limiter.stats()),

        "blocked" => ok_data(limiter.blocked_list()),

        "block" => {
            let ip = match require_ip(&params) {
                Ok(ip) => ip,
                Err(rejection) => return rejection,
            };
            let reason = params
                .get("reason")
                .map(String::as_str)
                .unwrap_or(DEFAULT_BLOCK_REASON);
            let permanent = params
                .get("permanent")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
            limiter.block_ip(&ip, reason, permanent);
            ok_message("IP blocked")
        }

        "unblock" => {
            let ip = match require_ip(&params) {
                Ok(ip) => ip,
                Err(rejection) => return rejection,
            };
            if limiter.unblock_ip(&ip) {
                ok_message("IP unblocked")
            } else {
                ok_message("IP was not blocked")
            }
        }

        "check" => {
            let ip = match require_ip(&params) {
                Ok(ip) => ip,
                Err(rejection) => return rejection,
            };
            ok_data(json!({
                "ip": ip,
                "whitelisted": limiter.is_whitelisted(&ip),
                "blocked": limiter.is_blocked(&ip),
                "block_time_remaining": limiter.block_time_remaining(&ip),
                "request_count": limiter.request_count(&ip),
            }))
        }

        "logs" => {
            let limit = params
                .get("limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_LOG_TAIL);
            ok_data(state.request_log.tail(limit))
        }

        unknown => bad_request(json!({
            "status": false,
            "message": format!("Unknown action '{}'", unknown),
            "valid_actions": VALID_ACTIONS,
        })),
    }
}
