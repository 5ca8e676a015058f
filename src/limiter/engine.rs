//! Rate limiting and blocking decision engine.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::limiter::store::{now_secs, BlockEntry, RateStore};
use crate::observability::metrics;

/// Reason recorded when the limiter blocks an IP on its own.
pub const AUTO_BLOCK_REASON: &str = "Rate limit exceeded";

/// Aggregate limiter state, served by the admin `stats` action.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStats {
    pub active_ips: usize,
    pub total_requests_last_minute: u64,
    pub blocked_ips: usize,
    pub rate_limit: u64,
    pub window_seconds: i64,
    pub block_duration_minutes: i64,
}

/// Per-IP rate limiting with promote-to-block.
///
/// Whitelisted IPs bypass every check. All other state lives in the injected
/// store; the limiter itself holds nothing mutable, so it can be shared
/// freely across request tasks.
pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    config: RateLimitConfig,
    whitelist: HashSet<IpAddr>,
}

impl RateLimiter {
    /// Build a limiter and run one opportunistic sweep of expired state.
    pub fn new(store: Arc<dyn RateStore>, config: RateLimitConfig) -> Self {
        let whitelist = config
            .whitelist
            .iter()
            .filter_map(|entry| entry.parse().ok())
            .collect();
        let limiter = Self {
            store,
            config,
            whitelist,
        };
        limiter.cleanup_expired();
        limiter
    }

    pub fn is_whitelisted(&self, ip: &IpAddr) -> bool {
        self.whitelist.contains(ip)
    }

    /// Whether requests from this IP are currently rejected. Read-only.
    pub fn is_blocked(&self, ip: &IpAddr) -> bool {
        if self.is_whitelisted(ip) {
            return false;
        }
        match self.store.block(ip) {
            Some(entry) => entry.is_effective(now_secs()),
            None => false,
        }
    }

    /// Whether this IP is still under its request budget.
    ///
    /// An expired window is reset here as a side effect before returning
    /// true; callers must not assume this is a pure read.
    pub fn check_limit(&self, ip: &IpAddr) -> bool {
        if self.is_whitelisted(ip) {
            return true;
        }
        let now = now_secs();
        match self.store.counter(ip) {
            None => true,
            Some(counter) if now - counter.window_start >= self.config.window_secs => {
                self.store.reset_counter(*ip, now);
                true
            }
            Some(counter) => counter.count < self.config.max_requests,
        }
    }

    /// Count one request from this IP; returns the new window count.
    ///
    /// The increment is atomic at the store layer, so the returned count is
    /// an admission decision two concurrent callers can never both win.
    pub fn record_request(&self, ip: &IpAddr) -> u64 {
        if self.is_whitelisted(ip) {
            return 0;
        }
        let now = now_secs();
        self.store.incr_in_window(*ip, now, self.config.window_secs)
    }

    /// Insert-or-overwrite a block for this IP.
    pub fn block_ip(&self, ip: &IpAddr, reason: &str, permanent: bool) {
        let now = now_secs();
        self.store.upsert_block(BlockEntry {
            ip: *ip,
            reason: reason.to_string(),
            blocked_at: now,
            expires_at: now + self.config.block_duration_secs(),
            is_permanent: permanent,
        });
        metrics::record_block_created(permanent);
        // Audit trail is fire-and-forget; it never gates the block itself.
        tracing::warn!(ip = %ip, reason = %reason, permanent, "IP blocked");
    }

    /// Remove a block; returns whether one existed.
    pub fn unblock_ip(&self, ip: &IpAddr) -> bool {
        let existed = self.store.remove_block(ip);
        if existed {
            tracing::info!(ip = %ip, "IP unblocked");
        }
        existed
    }

    /// Seconds until an active block lapses: 0 when not blocked, -1 when
    /// permanent.
    pub fn block_time_remaining(&self, ip: &IpAddr) -> i64 {
        let now = now_secs();
        match self.store.block(ip) {
            Some(entry) if entry.is_permanent => -1,
            Some(entry) if entry.expires_at > now => entry.expires_at - now,
            _ => 0,
        }
    }

    /// Request count in the current window, 0 if the IP has no record.
    pub fn request_count(&self, ip: &IpAddr) -> u64 {
        self.store.counter(ip).map(|c| c.count).unwrap_or(0)
    }

    /// All currently-effective block entries.
    pub fn blocked_list(&self) -> Vec<BlockEntry> {
        let now = now_secs();
        let mut blocks: Vec<_> = self
            .store
            .blocks()
            .into_iter()
            .filter(|entry| entry.is_effective(now))
            .collect();
        blocks.sort_by_key(|entry| entry.blocked_at);
        blocks
    }

    /// Aggregate counters inside the active window plus effective blocks.
    pub fn stats(&self) -> LimiterStats {
        let now = now_secs();
        let mut active_ips = 0;
        let mut total = 0;
        for counter in self.store.counters() {
            if now - counter.window_start < self.config.window_secs {
                active_ips += 1;
                total += counter.count;
            }
        }
        let blocked_ips = self
            .store
            .blocks()
            .into_iter()
            .filter(|entry| entry.is_effective(now))
            .count();

        LimiterStats {
            active_ips,
            total_requests_last_minute: total,
            blocked_ips,
            rate_limit: self.config.max_requests,
            window_seconds: self.config.window_secs,
            block_duration_minutes: self.config.block_duration_mins,
        }
    }

    /// Sweep expired non-permanent blocks and stale counters. Invoked once
    /// at construction; absence of sweeps between restarts is harmless since
    /// the blocking predicate already checks expiry.
    pub fn cleanup_expired(&self) {
        self.store.purge_expired(now_secs());
    }

    /// The configured block duration, in seconds. Freshly-blocked rejections
    /// advertise this full duration as their retry-after.
    pub fn block_duration_secs(&self) -> i64 {
        self.config.block_duration_secs()
    }

    pub fn max_requests(&self) -> u64 {
        self.config.max_requests
    }
}
