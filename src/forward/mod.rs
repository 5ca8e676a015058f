//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Allowed request (method, path, headers, body, client IP)
//!     → header filter (allow-list copy + X-Forwarded-* + credential)
//!     → body.rs (re-encode per declared content type)
//!     → reqwest client (timeouts, TLS verification, bounded redirects)
//!     → UpstreamResponse (status verbatim, hop-by-hop headers stripped)
//! ```
//!
//! # Design Decisions
//! - Exactly one upstream attempt per inbound request; retries are an
//!   operator concern
//! - The credential header is inserted last so a caller-supplied value can
//!   never reach the upstream
//! - Transport failures surface as a typed error, mapped to a synthesized
//!   502 at the HTTP boundary

pub mod body;

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::forward::body::{
    boundary_from_content_type, parse_multipart, parts_to_urlencoded, rebuild_multipart,
    reencode_urlencoded,
};

/// Request headers copied through to the upstream. Everything else is
/// dropped; hop-by-hop and infrastructure headers never leak.
const FORWARDED_REQUEST_HEADERS: [&str; 8] = [
    "content-type",
    "accept",
    "accept-language",
    "authorization",
    "x-api-key",
    "x-requested-with",
    "user-agent",
    "cookie",
];

/// Response headers stripped before relaying; transport-hop artifacts, not
/// application semantics.
const STRIPPED_RESPONSE_HEADERS: [&str; 3] = ["transfer-encoding", "content-encoding", "connection"];

/// Errors talking to the upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream client: {0}")]
    Client(reqwest::Error),

    #[error("invalid credential header '{0}'")]
    Credential(String),

    #[error("upstream request failed: {0}")]
    Upstream(reqwest::Error),
}

/// Normalized upstream response, ready to relay.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Builds outbound requests against the single fixed upstream and relays
/// responses back unchanged in semantics.
pub struct Forwarder {
    client: reqwest::Client,
    config: UpstreamConfig,
    credential_name: HeaderName,
    credential_value: HeaderValue,
}

impl Forwarder {
    /// Fails on a malformed credential header so a misconfiguration is a
    /// startup error, never a request silently forwarded without it.
    pub fn new(config: UpstreamConfig) -> Result<Self, ForwardError> {
        let credential_name = HeaderName::try_from(config.credential_header.as_str())
            .map_err(|_| ForwardError::Credential(config.credential_header.clone()))?;
        let credential_value = HeaderValue::from_str(&config.credential_value)
            .map_err(|_| ForwardError::Credential(config.credential_header.clone()))?;

        // TLS peer verification stays at the reqwest default (on).
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(Policy::limited(config.max_redirects))
            .build()
            .map_err(ForwardError::Client)?;
        Ok(Self {
            client,
            config,
            credential_name,
            credential_value,
        })
    }

    /// Forward one request and buffer the upstream response.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        inbound_headers: &HeaderMap,
        body: Bytes,
        client_ip: IpAddr,
        scheme: &str,
    ) -> Result<UpstreamResponse, ForwardError> {
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            path_and_query
        );

        let mut headers = self.outbound_headers(inbound_headers, client_ip, scheme);

        let content_type = inbound_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let request = if content_type.starts_with("multipart/form-data") {
            let parts = boundary_from_content_type(&content_type)
                .map(|boundary| parse_multipart(&body, &boundary))
                .unwrap_or_default();

            if parts.iter().any(|p| p.is_file()) {
                // True file upload: rebuild multipart so the upstream sees
                // every field and file part. reqwest owns the content-type
                // and boundary from here.
                headers.remove(header::CONTENT_TYPE);
                self.client
                    .request(method, &url)
                    .headers(headers)
                    .multipart(rebuild_multipart(parts))
            } else {
                // Plain fields only: the upstream expects urlencoded.
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                self.client
                    .request(method, &url)
                    .headers(headers)
                    .body(parts_to_urlencoded(&parts))
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            self.client
                .request(method, &url)
                .headers(headers)
                .body(reencode_urlencoded(&body))
        } else {
            // JSON and everything else: raw bytes, unchanged.
            self.client.request(method, &url).headers(headers).body(body)
        };

        let response = request.send().await.map_err(ForwardError::Upstream)?;

        let status = response.status();
        let mut relayed = response.headers().clone();
        for name in STRIPPED_RESPONSE_HEADERS {
            relayed.remove(name);
        }
        let body = response.bytes().await.map_err(ForwardError::Upstream)?;

        Ok(UpstreamResponse {
            status,
            headers: relayed,
            body,
        })
    }

    fn outbound_headers(
        &self,
        inbound: &HeaderMap,
        client_ip: IpAddr,
        scheme: &str,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for name in FORWARDED_REQUEST_HEADERS {
            let name = HeaderName::from_static(name);
            for value in inbound.get_all(&name) {
                headers.append(name.clone(), value.clone());
            }
        }

        if let Ok(ip_value) = HeaderValue::from_str(&client_ip.to_string()) {
            headers.insert("x-forwarded-for", ip_value.clone());
            headers.insert("x-real-ip", ip_value);
        }
        if let Ok(proto) = HeaderValue::from_str(scheme) {
            headers.insert("x-forwarded-proto", proto);
        }

        // Inserted last so it replaces every prior value, including a
        // caller-supplied one copied through the allow-list above.
        headers.insert(
            self.credential_name.clone(),
            self.credential_value.clone(),
        );

        headers
    }
}
