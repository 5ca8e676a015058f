//! Admin authentication: one shared secret, no user accounts.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use url::form_urlencoded;

use crate::http::server::AppState;

/// Header carrying the admin shared secret.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Accepts the shared secret from the `X-Admin-Key` header or the `key`
/// query parameter. Anything else is 401 before any handler runs.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let secret = &state.config.admin.secret;

    let header_key = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if header_key == Some(secret.as_str()) {
        return next.run(request).await;
    }

    let query_key = request.uri().query().and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "key")
            .map(|(_, value)| value.into_owned())
    });
    if query_key.as_deref() == Some(secret.as_str()) {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": false, "message": "Unauthorized"})),
    )
        .into_response()
}
