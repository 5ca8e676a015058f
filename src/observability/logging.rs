//! Structured logging and the admin-facing request log.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (env filter + fmt layer)
//! - Keep a bounded in-memory tail of recent requests for the admin API
//!
//! # Design Decisions
//! - Logging is a fire-and-forget side channel: recording can never fail in
//!   a way that alters the response sent to the caller
//! - The ring buffer overwrites oldest entries; it is a tail, not an archive

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;

use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::limiter::store::now_secs;

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rategate={},tower_http=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// One relayed (or rejected) request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    pub timestamp: i64,
    pub request_id: String,
    pub ip: IpAddr,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
}

/// Bounded tail of recent requests, served by the admin `logs` action.
pub struct RequestLog {
    entries: Mutex<VecDeque<RequestLogEntry>>,
    capacity: usize,
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Record one request. Never fails; a poisoned lock drops the entry.
    pub fn record(
        &self,
        request_id: &str,
        ip: IpAddr,
        method: &str,
        path: &str,
        status: u16,
        duration_ms: u64,
    ) {
        let entry = RequestLogEntry {
            timestamp: now_secs(),
            request_id: request_id.to_string(),
            ip,
            method: method.to_string(),
            path: path.to_string(),
            status,
            duration_ms,
        };
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Most recent entries, newest last, at most `limit`.
    pub fn tail(&self, limit: usize) -> Vec<RequestLogEntry> {
        match self.entries.lock() {
            Ok(entries) => {
                let skip = entries.len().saturating_sub(limit);
                entries.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }
}
