//! Cooperative shutdown signal (spec §5: "cooperative cancellation, no
//! force-termination").
//!
//! Every context (T1-T4) polls this on each iteration of its own loop
//! and exits cleanly when asked; nothing here ever calls `thread::kill`
//! or equivalent. Mirrors the stop-flag-plus-join shape already used by
//! [`crate::time::SimTicker`], generalized into a shareable handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable cooperative-cancellation flag.
#[derive(Clone)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request every holder of this token to stop at their next
    /// opportunity.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}
