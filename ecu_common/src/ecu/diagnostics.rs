//! Runtime state and injection diagnostics (spec §3 "Runtime state" /
//! "Injection diagnostic").
//!
//! `RuntimeState` is the seqlock-published snapshot every context reads
//! to find out where the engine is right now; `InjectionDiagnostic`
//! accumulates the executor's dispatch history per cylinder, extended
//! (supplement) with the last commanded SOI/EOI angle and arm outcome so
//! a tuning tool can tell which cylinder last missed its window.

use crate::consts::CYLINDER_COUNT;
use crate::ecu::sync::SyncState;
use crate::ecu::trims::FuelTrims;

/// Result of the executor's last arm attempt for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArmOutcome {
    /// No arm attempted yet since startup.
    Unknown = 0,
    /// Arm accepted and scheduled.
    Armed = 1,
    /// Arm rejected by the scheduler (overlap, past-due, out-of-bounds duration).
    Rejected = 2,
    /// Plan was too stale to act on (spec §4.7).
    Stale = 3,
}

impl Default for ArmOutcome {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Last commanded angles and outcome for one cylinder (supplement to
/// spec §3's "Injection diagnostic").
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct CylinderDiagnostic {
    pub last_soi_deg: f32,
    pub last_eoi_deg: f32,
    pub last_arm_outcome: ArmOutcome,
}

/// Executor dispatch history (spec §3 "Injection diagnostic").
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct InjectionDiagnostic {
    pub per_cylinder: [CylinderDiagnostic; CYLINDER_COUNT],
    pub plans_dispatched: u32,
    pub plans_rejected_stale: u32,
    pub deadline_misses: u32,
}

impl InjectionDiagnostic {
    pub const fn zeroed() -> Self {
        Self {
            per_cylinder: [CylinderDiagnostic {
                last_soi_deg: 0.0,
                last_eoi_deg: 0.0,
                last_arm_outcome: ArmOutcome::Unknown,
            }; CYLINDER_COUNT],
            plans_dispatched: 0,
            plans_rejected_stale: 0,
            deadline_misses: 0,
        }
    }

    /// Record the outcome of arming `cylinder`'s injection window.
    pub fn record_arm(&mut self, cylinder: usize, soi_deg: f32, eoi_deg: f32, outcome: ArmOutcome) {
        if let Some(slot) = self.per_cylinder.get_mut(cylinder) {
            slot.last_soi_deg = soi_deg;
            slot.last_eoi_deg = eoi_deg;
            slot.last_arm_outcome = outcome;
        }
        match outcome {
            ArmOutcome::Armed => self.plans_dispatched = self.plans_dispatched.saturating_add(1),
            ArmOutcome::Stale => self.plans_rejected_stale = self.plans_rejected_stale.saturating_add(1),
            _ => {}
        }
    }

    pub fn record_deadline_miss(&mut self) {
        self.deadline_misses = self.deadline_misses.saturating_add(1);
    }
}

impl Default for InjectionDiagnostic {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Whole-engine runtime snapshot, published through the seqlock in
/// `ecu_core::snapshot` (spec §5).
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct RuntimeState {
    pub sync_state: SyncState,
    pub rpm: u32,
    pub trims: FuelTrims,
    /// Whether fail-safe has latched limp mode (spec §4.8).
    pub limp_active: bool,
    /// HW-Time tick at which the active fault condition was first
    /// observed, used by the recovery hysteresis timer.
    pub fault_since_tick: Option<u32>,
    pub last_tooth_tick: u32,
    pub injection: InjectionDiagnostic,
}

impl RuntimeState {
    pub const fn zeroed() -> Self {
        Self {
            sync_state: SyncState::Searching,
            rpm: 0,
            trims: FuelTrims::zeroed(),
            limp_active: false,
            fault_since_tick: None,
            last_tooth_tick: 0,
            injection: InjectionDiagnostic::zeroed(),
        }
    }

    /// Whether `rpm` currently sits within the plausible running band
    /// (spec §4.8 fail-safe gate).
    pub fn rpm_in_band(&self, rpm_min: u32, rpm_max: u32) -> bool {
        self.rpm >= rpm_min && self.rpm <= rpm_max
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::zeroed()
    }
}
