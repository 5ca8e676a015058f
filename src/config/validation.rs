//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, timeouts > 0)
//! - Check whitelist entries are IP literals, never ranges
//! - Check the upstream base URL parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError {
            field: "upstream.base_url",
            message: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError {
            field: "upstream.base_url",
            message: format!("not a valid URL: {}", e),
        }),
    }

    // The credential is injected into every upstream request; a value that
    // cannot be a header must fail here, not per request.
    if HeaderName::try_from(config.upstream.credential_header.as_str()).is_err() {
        errors.push(ValidationError {
            field: "upstream.credential_header",
            message: format!(
                "'{}' is not a valid header name",
                config.upstream.credential_header
            ),
        });
    }
    if HeaderValue::from_str(&config.upstream.credential_value).is_err() {
        errors.push(ValidationError {
            field: "upstream.credential_value",
            message: "not a valid header value".to_string(),
        });
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError {
            field: "rate_limit.max_requests",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rate_limit.window_secs <= 0 {
        errors.push(ValidationError {
            field: "rate_limit.window_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rate_limit.block_duration_mins <= 0 {
        errors.push(ValidationError {
            field: "rate_limit.block_duration_mins",
            message: "must be greater than zero".to_string(),
        });
    }

    for entry in &config.rate_limit.whitelist {
        if entry.parse::<IpAddr>().is_err() {
            errors.push(ValidationError {
                field: "rate_limit.whitelist",
                message: format!("'{}' is not an IP literal", entry),
            });
        }
    }

    if config.admin.enabled && config.admin.secret.is_empty() {
        errors.push(ValidationError {
            field: "admin.secret",
            message: "must not be empty when the admin API is enabled".to_string(),
        });
    }

    if config.upstream.connect_timeout_secs == 0 || config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "upstream",
            message: "timeouts must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
