//! In-process runtime counters, shared by every crate that needs to bump
//! one. There's no exporter here; the CLI's `status --json` and the
//! duplex endpoint's `/health` route read a snapshot on demand.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter registry.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub worker_restarts: AtomicU64,
    pub active_calls: AtomicU64,
    pub sandbox_runs: AtomicU64,
    pub sandbox_timeouts: AtomicU64,
    pub mcp_calls: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            worker_restarts: AtomicU64::new(0),
            active_calls: AtomicU64::new(0),
            sandbox_runs: AtomicU64::new(0),
            sandbox_timeouts: AtomicU64::new(0),
            mcp_calls: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_worker_restarts(&self) {
        self.worker_restarts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn call_started(&self) {
        self.active_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn call_finished(&self) {
        self.active_calls.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_sandbox_runs(&self) {
        self.sandbox_runs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_sandbox_timeouts(&self) {
        self.sandbox_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_mcp_calls(&self) {
        self.mcp_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            worker_restarts: self.worker_restarts.load(Ordering::Relaxed),
            active_calls: self.active_calls.load(Ordering::Relaxed),
            sandbox_runs: self.sandbox_runs.load(Ordering::Relaxed),
            sandbox_timeouts: self.sandbox_timeouts.load(Ordering::Relaxed),
            mcp_calls: self.mcp_calls.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot, serialisable for the `status --json`/`/health` surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub worker_restarts: u64,
    pub active_calls: u64,
    pub sandbox_runs: u64,
    pub sandbox_timeouts: u64,
    pub mcp_calls: u64,
}
