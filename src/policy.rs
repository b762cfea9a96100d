use chrono::{DateTime, Utc};

/// Bounds on what one sync run may do. Process-level constants rather than
/// per-call overrides so the safety envelope stays uniform.
pub const DEFAULT_PAGE_CAP: usize = 50;
pub const DEFAULT_TXN_CAP: usize = 10_000;
pub const DEFAULT_COOLDOWN_SECS: i64 = 300;

#[derive(Debug, Clone, Copy)]
pub struct SyncPolicy {
    /// Max pages fetched per run.
    pub page_cap: usize,
    /// Max added+modified transactions accumulated per run.
    pub txn_cap: usize,
    /// Minimum seconds between runs for the same item.
    pub cooldown_secs: i64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            page_cap: DEFAULT_PAGE_CAP,
            txn_cap: DEFAULT_TXN_CAP,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

impl SyncPolicy {
    /// Checked after every page fetch. Hitting a cap stops the loop but
    /// keeps everything fetched so far; it is a throughput limiter, not an
    /// error.
    pub fn capped(&self, pages_fetched: usize, txns_accumulated: usize) -> bool {
        pages_fetched >= self.page_cap || txns_accumulated >= self.txn_cap
    }

    /// Seconds left before this item may sync again, if any.
    /// `last_synced_at` is the stored RFC 3339 stamp; unparseable or
    /// missing stamps mean no cooldown.
    pub fn cooldown_remaining(&self, last_synced_at: Option<&str>, now: DateTime<Utc>) -> Option<i64> {
        let last = DateTime::parse_from_rfc3339(last_synced_at?).ok()?;
        let elapsed = now.signed_duration_since(last).num_seconds();
        let remaining = self.cooldown_secs - elapsed;
        (remaining > 0).then_some(remaining)
    }
}
