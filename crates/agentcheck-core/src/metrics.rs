//! Global atomic counters for agentcheck observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a suite run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free atomic counters.
pub struct Metrics {
    sessions_run: AtomicU64,
    events_recorded: AtomicU64,
    violations_found: AtomicU64,
    escalations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sessions_run: AtomicU64::new(0),
            events_recorded: AtomicU64::new(0),
            violations_found: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
        }
    }

    pub fn inc_sessions(&self) {
        self.sessions_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_run", "counter incremented");
    }

    pub fn inc_events_recorded(&self) {
        self.events_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_violations(&self, n: u64) {
        self.violations_found.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "violations_found", n, "counter incremented");
    }

    pub fn inc_escalations(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "escalations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sessions_run = self.sessions_run(),
            events_recorded = self.events_recorded(),
            violations_found = self.violations_found(),
            escalations = self.escalations(),
        );
    }

    pub fn sessions_run(&self) -> u64 {
        self.sessions_run.load(Ordering::Relaxed)
    }

    pub fn events_recorded(&self) -> u64 {
        self.events_recorded.load(Ordering::Relaxed)
    }

    pub fn violations_found(&self) -> u64 {
        self.violations_found.load(Ordering::Relaxed)
    }

    pub fn escalations(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.sessions_run.store(0, Ordering::Relaxed);
        self.events_recorded.store(0, Ordering::Relaxed);
        self.violations_found.store(0, Ordering::Relaxed);
        self.escalations.store(0, Ordering::Relaxed);
    }
}
