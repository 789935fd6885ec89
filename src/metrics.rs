use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide DNS query counters, updated by the listener.
#[derive(Default)]
pub struct DnsMetrics {
    pub queries_total: AtomicU64,
    pub queries_blocked: AtomicU64,
    pub queries_allowed: AtomicU64,
    pub queries_temp_allowed: AtomicU64,
    /// Queries answered by the raw forward after the normal pipeline failed.
    pub queries_fail_open: AtomicU64,
    /// Queries that got no reply at all.
    pub queries_dropped: AtomicU64,
}

impl DnsMetrics {
    pub fn inc_blocked(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.queries_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_allowed(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.queries_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_temp_allowed(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.queries_temp_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fail_open(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.queries_fail_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.queries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.queries_total.load(Ordering::Relaxed)
    }

    /// One-line summary for the periodic stats log.
    pub fn summary(&self) -> String {
        let total = self.queries_total.load(Ordering::Relaxed);
        let blocked = self.queries_blocked.load(Ordering::Relaxed);
        let allowed = self.queries_allowed.load(Ordering::Relaxed);
        let temp = self.queries_temp_allowed.load(Ordering::Relaxed);
        let fail_open = self.queries_fail_open.load(Ordering::Relaxed);
        let dropped = self.queries_dropped.load(Ordering::Relaxed);

        format!(
            "queries={total} blocked={blocked} allowed={allowed} temp_allowed={temp} \
             fail_open={fail_open} dropped={dropped}"
        )
    }
}
