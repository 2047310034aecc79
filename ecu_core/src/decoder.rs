//! Decoder: crank tooth/cam edge ingest and sync state machine (spec §4.2).
//!
//! Single-owner state machine in the style of
//! `evo_control_unit::state::machine::MachineStateMachine` —
//! `handle_event`/match-based transition table — but specialized to the
//! decoder's own event shape rather than the generic command lattice the
//! teacher's machine handles. `SyncState` (from `ecu_common`) carries the
//! per-state payload directly on the enum; this module owns the mutable
//! working state (median filter window, tooth index, gap streak) around
//! it.

use ecu_common::config::EcuConfig;
use ecu_common::consts::TOOTH_COUNT;
use ecu_common::ecu::sync::{CamPhase, SyncState};
use ecu_common::ecu::tooth::ToothEvent;

/// Depth of the median filter over recent tooth periods (spec §4.2 step 1).
const MEDIAN_WINDOW: usize = 7;

/// A single tooth edge ingested from the crank signal, before
/// classification.
#[derive(Debug, Clone, Copy)]
pub struct RawToothEdge {
    pub capture_tick: u32,
    pub period_us: u32,
}

/// A single cam edge ingested from the cam signal.
#[derive(Debug, Clone, Copy)]
pub struct RawCamEdge {
    pub capture_tick: u32,
}

/// Result of feeding one tooth edge to the decoder.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOutput {
    /// The event to publish/hand to the planner.
    pub event: ToothEvent,
    /// Current sync state after processing this edge.
    pub sync_state: SyncState,
    /// Current RPM estimate (0 if not yet crank-locked).
    pub rpm: u32,
    /// Crank angle at the emitted tooth [deg], domain per `sync_state.cycle_deg()`.
    pub crank_angle_deg: f32,
    /// Set on the tick the decoder declares the `SyncLost` fault (spec §4.2
    /// final paragraph) — distinct from an ordinary `Searching` demotion,
    /// which happens immediately on a single bad classification.
    pub sync_lost: bool,
}

/// Crank-tooth decoder and sync state machine.
pub struct DecoderStateMachine {
    state: SyncState,
    window: heapless::Deque<u32, MEDIAN_WINDOW>,
    last_period: u32,
    tooth_index: u32,
    revolution: u32,
    /// Teeth counted since the last gap, used for the "exactly
    /// TOOTH_COUNT-1 normal teeth between gaps" check (step 3).
    teeth_since_gap: u32,
    /// Tick of the most recent gap, for cam-edge window matching.
    last_gap_tick: u32,
    /// Consecutive classification failures, counted toward `SyncLost`.
    bad_tick_streak: u32,
    tooth_per_rev: u32,
    tdc_offset_deg: f32,
    cam_window_deg: f32,
    sync_loss_ticks: u32,
}

impl DecoderStateMachine {
    pub fn new(config: &EcuConfig) -> Self {
        Self {
            state: SyncState::Searching,
            window: heapless::Deque::new(),
            last_period: 0,
            tooth_index: 0,
            revolution: 0,
            teeth_since_gap: 0,
            last_gap_tick: 0,
            bad_tick_streak: 0,
            tooth_per_rev: config.tooth_per_rev,
            tdc_offset_deg: config.tdc_offset_deg,
            cam_window_deg: config.cam_window_deg,
            sync_loss_ticks: config.sync_loss_ticks,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        self.state
    }

    /// Current RPM estimate (spec §4.2 step 5). Zero until crank-locked.
    pub fn rpm(&self) -> u32 {
        if !self.state.is_crank_valid() || self.last_period == 0 {
            return 0;
        }
        60_000_000 / (self.last_period * self.tooth_per_rev)
    }

    /// Median of the filter window, or 0 if no samples yet.
    fn median_period(&self) -> u32 {
        if self.window.is_empty() {
            return 0;
        }
        let mut samples: heapless::Vec<u32, MEDIAN_WINDOW> = self.window.iter().copied().collect();
        samples.sort_unstable();
        samples[samples.len() / 2]
    }

    fn push_period(&mut self, period_us: u32) {
        if self.window.is_full() {
            self.window.pop_front();
        }
        let _ = self.window.push_back(period_us);
        self.last_period = self.median_period();
    }

    /// Demote to `Searching`. Returns whether this crosses the
    /// `sync_loss_ticks` threshold and should be reported as `SyncLost`.
    fn demote(&mut self) -> bool {
        self.state = SyncState::Searching;
        self.teeth_since_gap = 0;
        self.bad_tick_streak = self.bad_tick_streak.saturating_add(1);
        self.bad_tick_streak >= self.sync_loss_ticks
    }

    fn clear_bad_streak(&mut self) {
        self.bad_tick_streak = 0;
    }

    /// Crank angle at the current tooth index (spec §4.2 step 6).
    fn crank_angle_deg(&self) -> f32 {
        let deg_per_tooth = 360.0 / self.tooth_per_rev as f32;
        let mut angle = self.tooth_index as f32 * deg_per_tooth - self.tdc_offset_deg;

        let second_rev = matches!(
            self.state,
            SyncState::FullySynced {
                cam_phase: CamPhase::SecondRev
            }
        );
        if second_rev {
            angle += 360.0;
        }

        let cycle = self.state.cycle_deg();
        angle.rem_euclid(cycle)
    }

    /// Feed one crank tooth edge. Returns the emitted event and derived
    /// state, or `None` if this is the very first edge (no period yet).
    pub fn on_tooth_edge(&mut self, edge: RawToothEdge) -> Option<DecoderOutput> {
        // First edge: nothing to compare a ratio against yet.
        if self.last_period == 0 && self.window.is_empty() {
            self.push_period(edge.period_us);
            return None;
        }

        let reference = self.last_period;
        let gap_here = reference > 0
            && edge.period_us as f32 >= 1.75 * reference as f32
            && edge.period_us as f32 <= 3.5 * reference as f32;

        let mut sync_lost = false;

        if gap_here {
            let teeth_between = self.teeth_since_gap;
            let well_formed = teeth_between == TOOTH_COUNT - 1;

            self.revolution += 1;
            self.teeth_since_gap = 0;

            match self.state {
                SyncState::Searching if well_formed => {
                    self.state = SyncState::GapSeen { rev_count: 1 };
                    self.tooth_index = 0;
                }
                SyncState::GapSeen { .. } if well_formed => {
                    self.state = SyncState::CrankLocked;
                    self.tooth_index = 0;
                    self.clear_bad_streak();
                }
                SyncState::CrankLocked | SyncState::FullySynced { .. } if well_formed => {
                    // Ordinary gap while already locked: re-zero and stay.
                    self.tooth_index = 0;
                }
                _ => {
                    // Malformed gap spacing: classification failure.
                    sync_lost = self.demote();
                }
            }
            self.last_gap_tick = edge.capture_tick;
        } else {
            self.tooth_index += 1;
            self.teeth_since_gap += 1;
            if self.teeth_since_gap > TOOTH_COUNT - 1 && self.state.is_crank_valid() {
                // Overran the expected gap window without seeing one.
                sync_lost = self.demote();
            }
        }

        self.push_period(edge.period_us);

        let event = ToothEvent {
            capture_tick: edge.capture_tick,
            tooth_index: self.tooth_index,
            period_us: edge.period_us,
            gap_here,
            revolution: self.revolution,
        };

        Some(DecoderOutput {
            event,
            sync_state: self.state,
            rpm: self.rpm(),
            crank_angle_deg: self.crank_angle_deg(),
            sync_lost,
        })
    }

    /// Feed one cam edge (spec §4.2 step 4). No-op unless currently
    /// `CrankLocked` or `FullySynced` — a matching edge promotes the
    /// former and advances the latter's `cam_phase` to the other half of
    /// the 720° cycle, so repeated matches alternate `FirstRev`/
    /// `SecondRev` instead of pinning the phase to `FirstRev` forever.
    pub fn on_cam_edge(&mut self, edge: RawCamEdge) {
        if !self.state.is_crank_valid() {
            return;
        }

        let deg_per_tooth = 360.0 / self.tooth_per_rev as f32;
        let elapsed_deg = (edge.capture_tick.wrapping_sub(self.last_gap_tick)) as f32
            / self.last_period.max(1) as f32
            * deg_per_tooth;

        // Expected cam edge lands near the first-rev TDC reference; within
        // the configured window we call it a match and promote/advance.
        let expected_deg = 0.0f32;
        let diff = (elapsed_deg - expected_deg).abs();

        if diff <= self.cam_window_deg {
            let next_phase = match self.state {
                SyncState::FullySynced { cam_phase: CamPhase::FirstRev } => CamPhase::SecondRev,
                SyncState::FullySynced { cam_phase: CamPhase::SecondRev } => CamPhase::FirstRev,
                _ => CamPhase::FirstRev,
            };
            self.state = SyncState::FullySynced { cam_phase: next_phase };
            self.clear_bad_streak();
        }
        // Mismatch: remain at the current sync level (wasted-spark
        // fallback if not yet `FullySynced`), per spec.
    }
}
