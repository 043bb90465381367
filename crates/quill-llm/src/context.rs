//! Per-request bookkeeping

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide request id source; ids start at 1 and are never reused
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Per-dispatch state, alive from `on_start` until `on_finally`
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Strictly increasing request id
    pub id: u64,
    /// When the dispatch began
    pub started_at: Instant,
    /// Log request and event payloads
    pub debug: bool,
}

impl RequestContext {
    /// Allocate a context with the next request id
    pub fn begin(debug: bool) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            started_at: Instant::now(),
            debug,
        }
    }

    /// Time since the dispatch began
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
