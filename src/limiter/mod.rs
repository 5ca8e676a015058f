//! Rate limiting and IP blocking subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (resolved client IP)
//!     → engine.rs is_blocked (deny-list predicate, read-only)
//!     → engine.rs check_limit (window budget; resets expired windows)
//!     → engine.rs record_request (atomic increment, admission decision)
//!     → over budget? engine.rs block_ip (upsert deny-list entry)
//! ```
//!
//! # Design Decisions
//! - Counter and block records are independent per-IP state; a block
//!   outlives and out-scopes the window logic
//! - The store owns all mutability; the engine is freely shareable
//! - Whitelist bypasses both blocking and counting, checked first

pub mod engine;
pub mod store;

pub use engine::{LimiterStats, RateLimiter, AUTO_BLOCK_REASON};
pub use store::{BlockEntry, MemoryStore, RateStore, WindowCounter};
