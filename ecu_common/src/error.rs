//! The abstract error kind shared by every subsystem (spec §7).
//!
//! Every hot-path and cold-path failure in the ECU core boils down to one
//! of these six kinds. Subsystems that need extra context wrap a
//! `CoreError` with structured fields rather than growing their own
//! disjoint error hierarchy — the same "one shared enum, richer wrappers
//! where needed" shape as `evo_common::config::ConfigError`.

use thiserror::Error;

/// Abstract failure kind. Never panics; every fallible operation in the
/// core returns one of these instead of crashing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Caller contract violation: channel out of range, NaN angle,
    /// non-monotone bins. Reject and return; never crash.
    #[error("bad argument: {0}")]
    BadArg(&'static str),

    /// Subsystem has not been initialized, or sync has not been achieved.
    /// Distinct from `BadArg` because a retry may succeed.
    #[error("not ready: {0}")]
    NotReady(&'static str),

    /// Data older than its freshness bound.
    #[error("stale data: {0}")]
    Stale(&'static str),

    /// Scheduler refused an arm request (past deadline, overlap,
    /// out-of-range duration).
    #[error("rejected: {0}")]
    Rejected(&'static str),

    /// Calibration blob failed version or CRC check.
    #[error("integrity failure: {0}")]
    Integrity(&'static str),

    /// Physical condition that triggers limp mode (over-rev, over-heat,
    /// under-volt, watchdog, sync loss).
    #[error("fault: {0}")]
    Fault(&'static str),
}

impl CoreError {
    /// True for kinds where a caller retry with the same arguments could
    /// plausibly succeed later (`NotReady`, `Stale`), as opposed to kinds
    /// that require the caller to change something first.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady(_) | Self::Stale(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CoreError::NotReady("x").is_retryable());
        assert!(CoreError::Stale("x").is_retryable());
        assert!(!CoreError::BadArg("x").is_retryable());
        assert!(!CoreError::Fault("x").is_retryable());
        assert!(!CoreError::Rejected("x").is_retryable());
        assert!(!CoreError::Integrity("x").is_retryable());
    }

    #[test]
    fn display_includes_message() {
        let e = CoreError::Rejected("overlap");
        assert!(format!("{e}").contains("overlap"));
    }
}
