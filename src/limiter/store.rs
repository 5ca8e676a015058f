//! Keyed state shared by every request-handling task.
//!
//! Two independent records per IP: a window counter and an optional block
//! entry. All cross-request coordination happens here; the per-key entry
//! lock is the primitive that makes the counter increment atomic.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

/// Counter records older than this are garbage and may be swept.
pub const COUNTER_RETENTION_SECS: i64 = 3600;

/// Per-IP request counter for the current window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowCounter {
    pub ip: IpAddr,
    pub count: u64,
    pub window_start: i64,
}

/// Per-IP deny-list entry, independent of the counter.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEntry {
    pub ip: IpAddr,
    pub reason: String,
    pub blocked_at: i64,
    pub expires_at: i64,
    pub is_permanent: bool,
}

impl BlockEntry {
    /// Whether this block still rejects requests at `now`.
    pub fn is_effective(&self, now: i64) -> bool {
        self.is_permanent || self.expires_at > now
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Durable keyed storage for limiter state.
///
/// The trait is the seam for a shared backend reachable from multiple
/// gateway instances; the gateway receives it as `Arc<dyn RateStore>` so no
/// component ever touches an ambient global handle.
pub trait RateStore: Send + Sync {
    /// Point lookup of the live counter for an IP.
    fn counter(&self, ip: &IpAddr) -> Option<WindowCounter>;

    /// Atomic upsert-with-increment. If the record is missing it is created
    /// with `count=1, window_start=now`; if its window has expired it is
    /// reset before counting. Returns the post-increment count. Concurrent
    /// callers for the same IP must never lose an increment.
    fn incr_in_window(&self, ip: IpAddr, now: i64, window_secs: i64) -> u64;

    /// Reset a counter to `count=0, window_start=now`.
    fn reset_counter(&self, ip: IpAddr, now: i64);

    /// Point lookup of the block entry for an IP.
    fn block(&self, ip: &IpAddr) -> Option<BlockEntry>;

    /// Insert-or-overwrite a block entry. Last writer wins on
    /// reason/expiry/permanence.
    fn upsert_block(&self, entry: BlockEntry);

    /// Delete a block entry; returns whether one existed.
    fn remove_block(&self, ip: &IpAddr) -> bool;

    /// Snapshot of all live counters, for stats aggregation.
    fn counters(&self) -> Vec<WindowCounter>;

    /// Snapshot of all block entries, effective or not.
    fn blocks(&self) -> Vec<BlockEntry>;

    /// Delete expired non-permanent blocks and counters older than the
    /// retention horizon. Predicates are re-checked under the entry lock so
    /// the sweep tolerates concurrent increments.
    fn purge_expired(&self, now: i64);
}

/// In-memory `RateStore` backed by sharded concurrent maps.
#[derive(Default)]
pub struct MemoryStore {
    counters: DashMap<IpAddr, WindowCounter>,
    blocks: DashMap<IpAddr, BlockEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateStore for MemoryStore {
    fn counter(&self, ip: &IpAddr) -> Option<WindowCounter> {
        self.counters.get(ip).map(|r| r.value().clone())
    }

    fn incr_in_window(&self, ip: IpAddr, now: i64, window_secs: i64) -> u64 {
        // The entry guard holds the shard lock for the whole read-modify-write,
        // so the reset-and-increment is a single atomic step.
        let mut entry = self.counters.entry(ip).or_insert_with(|| WindowCounter {
            ip,
            count: 0,
            window_start: now,
        });
        if now - entry.window_start >= window_secs {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;
        entry.count
    }

    fn reset_counter(&self, ip: IpAddr, now: i64) {
        let mut entry = self.counters.entry(ip).or_insert_with(|| WindowCounter {
            ip,
            count: 0,
            window_start: now,
        });
        entry.count = 0;
        entry.window_start = now;
    }

    fn block(&self, ip: &IpAddr) -> Option<BlockEntry> {
        self.blocks.get(ip).map(|r| r.value().clone())
    }

    fn upsert_block(&self, entry: BlockEntry) {
        self.blocks.insert(entry.ip, entry);
    }

    fn remove_block(&self, ip: &IpAddr) -> bool {
        self.blocks.remove(ip).is_some()
    }

    fn counters(&self) -> Vec<WindowCounter> {
        self.counters.iter().map(|r| r.value().clone()).collect()
    }

    fn blocks(&self) -> Vec<BlockEntry> {
        self.blocks.iter().map(|r| r.value().clone()).collect()
    }

    fn purge_expired(&self, now: i64) {
        self.blocks
            .retain(|_, entry| entry.is_permanent || entry.expires_at > now);
        self.counters
            .retain(|_, counter| now - counter.window_start < COUNTER_RETENTION_SECS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn increment_creates_then_counts() {
        let store = MemoryStore::new();
        assert!(store.counter(&ip("1.2.3.4")).is_none());
        assert_eq!(store.incr_in_window(ip("1.2.3.4"), 1000, 60), 1);
        assert_eq!(store.incr_in_window(ip("1.2.3.4"), 1001, 60), 2);

        let counter = store.counter(&ip("1.2.3.4")).unwrap();
        assert_eq!(counter.count, 2);
        assert_eq!(counter.window_start, 1000);
    }

    #[test]
    fn increment_resets_expired_window() {
        let store = MemoryStore::new();
        store.incr_in_window(ip("1.2.3.4"), 1000, 60);
        store.incr_in_window(ip("1.2.3.4"), 1001, 60);

        // Past the window: counter starts over at 1, window_start moves forward.
        assert_eq!(store.incr_in_window(ip("1.2.3.4"), 1060, 60), 1);
        let counter = store.counter(&ip("1.2.3.4")).unwrap();
        assert_eq!(counter.window_start, 1060);
    }

    #[test]
    fn concurrent_increments_are_never_lost() {
        let store = Arc::new(MemoryStore::new());
        let threads: u64 = 8;
        let per_thread: u64 = 500;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        store.incr_in_window(ip("9.9.9.9"), 1000, 60);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let counter = store.counter(&ip("9.9.9.9")).unwrap();
        assert_eq!(counter.count, threads * per_thread);
    }

    #[test]
    fn block_upsert_overwrites() {
        let store = MemoryStore::new();
        store.upsert_block(BlockEntry {
            ip: ip("5.5.5.5"),
            reason: "first".into(),
            blocked_at: 100,
            expires_at: 200,
            is_permanent: false,
        });
        store.upsert_block(BlockEntry {
            ip: ip("5.5.5.5"),
            reason: "second".into(),
            blocked_at: 150,
            expires_at: 900,
            is_permanent: true,
        });

        let entry = store.block(&ip("5.5.5.5")).unwrap();
        assert_eq!(entry.reason, "second");
        assert!(entry.is_permanent);
    }

    #[test]
    fn purge_keeps_permanent_blocks_and_fresh_counters() {
        let store = MemoryStore::new();
        store.upsert_block(BlockEntry {
            ip: ip("1.1.1.1"),
            reason: "expired".into(),
            blocked_at: 0,
            expires_at: 10,
            is_permanent: false,
        });
        store.upsert_block(BlockEntry {
            ip: ip("2.2.2.2"),
            reason: "forever".into(),
            blocked_at: 0,
            expires_at: 0,
            is_permanent: true,
        });
        store.incr_in_window(ip("3.3.3.3"), 100, 60);
        store.incr_in_window(ip("4.4.4.4"), 100 + COUNTER_RETENTION_SECS, 60);

        store.purge_expired(100 + COUNTER_RETENTION_SECS);

        assert!(store.block(&ip("1.1.1.1")).is_none());
        assert!(store.block(&ip("2.2.2.2")).is_some());
        assert!(store.counter(&ip("3.3.3.3")).is_none());
        assert!(store.counter(&ip("4.4.4.4")).is_some());
    }
}
