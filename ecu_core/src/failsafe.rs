//! Fail-safe latch and limp-mode overrides (spec §4.8).
//!
//! Merges two patterns from the teacher's safety module into one state
//! machine sized for a single engine-wide latch rather than per-axis
//! stop sequencing: the phase-style "what do we do this tick" dispatch
//! of `safety::stop::SafeStopExecutor`, and the hysteresis-gated,
//! multi-condition recovery gating of `safety::recovery::RecoveryManager`.
//! There is no separate "recovery sequence" here — spec §4.8 only
//! requires a single latched `limp` flag with a two-part clear condition,
//! so both teacher patterns collapse into one monitor rather than two
//! cooperating state machines.

use bitflags::bitflags;

use ecu_common::config::EcuConfig;
use ecu_common::ecu::interfaces::ActuatorHardware;

use crate::scheduler::AngleScheduler;

bitflags! {
    /// Independent fault sources that can force limp mode (spec §4.8).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FaultFlags: u16 {
        const OVER_REV              = 0b0000_0001;
        const OVERHEAT              = 0b0000_0010;
        const VBAT_OUT_OF_RANGE     = 0b0000_0100;
        const WATCHDOG_TIMEOUT      = 0b0000_1000;
        const SYNC_LOST             = 0b0001_0000;
        const ARM_REJECTED          = 0b0010_0000;
        const CALIBRATION_INTEGRITY = 0b0100_0000;
    }
}

/// Forced calibration overrides while `limp` is latched (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimpOverrides {
    pub rpm_cap: u32,
    pub ve_pct_x10: u16,
    pub advance_deg: f32,
    pub lambda_target: f32,
}

/// Engine-wide fail-safe latch.
pub struct FailsafeMonitor {
    limp_active: bool,
    /// Tick [ms] the latch was last engaged.
    latch_since_ms: u32,
    /// Tick [ms] the fault set most recently became empty, if it has.
    fault_clear_since_ms: Option<u32>,
}

impl FailsafeMonitor {
    pub fn new() -> Self {
        Self {
            limp_active: false,
            latch_since_ms: 0,
            fault_clear_since_ms: None,
        }
    }

    pub fn is_limp_active(&self) -> bool {
        self.limp_active
    }

    /// Evaluate the current fault set for this tick. `now_ms` is in the
    /// same monotonic domain as `recovery_hysteresis_ms`/`limp_min_ms`
    /// (i.e. milliseconds, not HW-Time microsecond ticks).
    pub fn tick(&mut self, now_ms: u32, faults: FaultFlags, config: &EcuConfig) -> bool {
        if !faults.is_empty() {
            if !self.limp_active {
                self.limp_active = true;
                self.latch_since_ms = now_ms;
            }
            self.fault_clear_since_ms = None;
            return true;
        }

        if self.fault_clear_since_ms.is_none() {
            self.fault_clear_since_ms = Some(now_ms);
        }

        if self.limp_active {
            let since_latch = now_ms.wrapping_sub(self.latch_since_ms);
            let since_clear = now_ms.wrapping_sub(self.fault_clear_since_ms.unwrap());
            if since_latch >= config.limp_min_ms && since_clear >= config.recovery_hysteresis_ms {
                self.limp_active = false;
            }
        }

        self.limp_active
    }

    /// Calibration overrides to apply while latched; `None` if not
    /// currently in limp mode.
    pub fn overrides(&self, config: &EcuConfig) -> Option<LimpOverrides> {
        if !self.limp_active {
            return None;
        }
        Some(LimpOverrides {
            rpm_cap: config.limp_rpm_limit,
            ve_pct_x10: config.limp_ve,
            advance_deg: config.limp_timing_deg,
            lambda_target: config.limp_lambda_target,
        })
    }

    /// Unconditional "all outputs off". Callable from any context and
    /// independent of plan dispatch or the current latch state (spec
    /// §4.8's dedicated entry point requirement).
    pub fn emergency_stop_all(scheduler: &mut AngleScheduler, hw: &mut dyn ActuatorHardware) {
        scheduler.cancel_all(hw);
    }
}

impl Default for FailsafeMonitor {
    fn default() -> Self {
        Self::new()
    }
}
