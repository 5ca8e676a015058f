//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events + request log ring buffer)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Admin `logs` action (request log tail)
//! ```
//!
//! # Design Decisions
//! - Structured logging with a request ID flowing through all subsystems
//! - Metrics are cheap (atomic increments)
//! - Both channels are best-effort and never affect request handling

pub mod logging;
pub mod metrics;

pub use logging::{RequestLog, RequestLogEntry};
