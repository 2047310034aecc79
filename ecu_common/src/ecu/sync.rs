//! Sync state (spec §3 "Sync state").
//!
//! Owned exclusively by the decoder. Shaped like a small lifecycle enum in
//! the style of `evo_common::control_unit::state::MachineState`, but
//! carrying the payload each state needs (gap-streak count, cam phase)
//! directly on the variant rather than in a side table.

/// Which half of the 720° cycle the cam edge was last observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamPhase {
    FirstRev,
    SecondRev,
}

/// Decoder synchronization state machine (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No gap observed yet, or sync was just lost.
    Searching,
    /// One well-formed gap seen; waiting for the confirming second gap.
    GapSeen { rev_count: u32 },
    /// Two consecutive gaps confirmed with the right tooth count between
    /// them; tooth index and rpm are valid, cam phase is still unknown.
    CrankLocked,
    /// Crank-locked plus a matching cam edge: full 720° position is known.
    FullySynced { cam_phase: CamPhase },
}

impl SyncState {
    /// True for any variant where tooth position/rpm may be trusted
    /// (`CrankLocked` or `FullySynced`) — spec §4.6 step 1 gate.
    pub const fn is_crank_valid(&self) -> bool {
        matches!(self, Self::CrankLocked | Self::FullySynced { .. })
    }

    /// True only once the full 720° cycle position is known.
    pub const fn is_fully_synced(&self) -> bool {
        matches!(self, Self::FullySynced { .. })
    }

    /// Angle-domain cycle length for this state: 360° in wasted-spark mode
    /// (crank-locked only), 720° once fully synced (spec §4.3).
    pub const fn cycle_deg(&self) -> f32 {
        if self.is_fully_synced() {
            720.0
        } else {
            360.0
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::Searching
    }
}
