//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve trust-ordered client identity)
//!     → limiter (block + rate checks keyed by that identity)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Proxy headers are consulted in a fixed priority order
//! - No trust in unparseable input: invalid literals are skipped
//! - Fail closed at the limiter, not here; resolution always yields an IP

pub mod client_ip;

pub use client_ip::resolve_client_ip;
