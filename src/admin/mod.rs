pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::dispatch_action;
use crate::http::server::AppState;

/// Build the admin router: one authenticated dispatch route.
pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/{action}", get(dispatch_action))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
