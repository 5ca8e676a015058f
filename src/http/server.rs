//! HTTP server setup and gateway orchestration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all gateway handler
//! - Wire up middleware (timeout, request ID, tracing, panic boundary)
//! - Per request: resolve identity → block check → rate check → forward
//! - Relay the upstream response, or synthesize a structured rejection
//! - Spawn the admin listener when enabled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::SetRequestIdLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::forward::{ForwardError, Forwarder};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::http::response;
use crate::limiter::{MemoryStore, RateLimiter, AUTO_BLOCK_REASON};
use crate::observability::metrics;
use crate::observability::RequestLog;
use crate::security::resolve_client_ip;

/// The listener speaks plain HTTP; TLS termination is out of scope.
const LISTENER_SCHEME: &str = "http";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiter: Arc<RateLimiter>,
    pub forwarder: Arc<Forwarder>,
    pub request_log: Arc<RequestLog>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ForwardError> {
        let config = Arc::new(config);
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryStore::new()),
            config.rate_limit.clone(),
        ));
        let forwarder = Arc::new(Forwarder::new(config.upstream.clone())?);
        let request_log = Arc::new(RequestLog::new(config.observability.request_log_capacity));

        let state = AppState {
            config: config.clone(),
            limiter,
            forwarder,
            request_log,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(|_: Box<dyn std::any::Any + Send>| {
                response::internal_error_response()
            }))
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "Gateway listening"
        );

        if self.config.admin.enabled {
            let admin_router = setup_admin_router(self.state.clone());
            let admin_addr = self.config.admin.bind_address.clone();
            let mut admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let listener = match TcpListener::bind(&admin_addr).await {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(address = %admin_addr, error = %e, "Admin listener failed to bind");
                        return;
                    }
                };
                tracing::info!(address = %admin_addr, "Admin API listening");
                let _ = axum::serve(listener, admin_router)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Main gateway handler.
///
/// Orchestration per request: (1) active block → reject with remaining
/// seconds; (2) over budget → create block, reject with the full configured
/// duration; (3) count the request and forward. The admission decision for
/// the boundary case comes from the atomic increment, so concurrent bursts
/// from one IP can never slip past the limit.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let client_ip = resolve_client_ip(request.headers(), Some(addr));

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        "Handling request"
    );

    let limiter = &state.limiter;

    let response = if limiter.is_blocked(&client_ip) {
        metrics::record_rate_limited("blocked");
        response::blocked_response(limiter.block_time_remaining(&client_ip))
    } else if !limiter.check_limit(&client_ip) {
        limiter.block_ip(&client_ip, AUTO_BLOCK_REASON, false);
        metrics::record_rate_limited("window_exceeded");
        response::rate_limited_response(limiter.block_duration_secs())
    } else {
        let admitted = limiter.record_request(&client_ip);
        if admitted > limiter.max_requests() {
            // Concurrent racers past the check land here; same outcome as
            // failing the check outright.
            limiter.block_ip(&client_ip, AUTO_BLOCK_REASON, false);
            metrics::record_rate_limited("window_exceeded");
            response::rate_limited_response(limiter.block_duration_secs())
        } else {
            forward_request(&state, &request_id, request, &path_and_query, client_ip).await
        }
    };

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);
    state.request_log.record(
        &request_id,
        client_ip,
        method.as_str(),
        &path,
        status.as_u16(),
        start.elapsed().as_millis() as u64,
    );

    response
}

/// Buffer the body and relay the request to the fixed upstream.
async fn forward_request(
    state: &AppState,
    request_id: &str,
    request: Request<Body>,
    path_and_query: &str,
    client_ip: std::net::IpAddr,
) -> Response {
    let method = request.method().clone();
    let (parts, body) = request.into_parts();

    let body_bytes = match axum::body::to_bytes(body, state.config.listener.max_body_size).await {
        Ok(bytes) => bytes,
        Err(_) => return response::payload_too_large_response(),
    };

    match state
        .forwarder
        .forward(
            method,
            path_and_query,
            &parts.headers,
            body_bytes,
            client_ip,
            LISTENER_SCHEME,
        )
        .await
    {
        Ok(upstream) => {
            let mut relayed = Response::new(Body::from(upstream.body));
            *relayed.status_mut() = upstream.status;
            *relayed.headers_mut() = upstream.headers;
            relayed
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            response::upstream_unavailable_response()
        }
    }
}
