//! Angle scheduler: per-channel absolute-tick arm primitive (spec §4.3).
//!
//! Owns no hardware itself — it is the bookkeeping layer in front of an
//! [`ecu_common::ecu::interfaces::ActuatorHardware`] implementation,
//! tracking each channel's pending window so overlap and bounds checks
//! can be enforced before ever touching the hardware trait. Shaped like
//! the teacher's `Watchdog`-adjacent channel-state tracking in
//! `evo_control_unit::cycle` — an array of small `Copy` structs indexed
//! by channel, no heap allocation.

use ecu_common::consts::{
    IGNITION_MAX_ON_TIME_US, IGNITION_MIN_ON_TIME_US, INJECTOR_MAX_ON_TIME_US, INJECTOR_MIN_ON_TIME_US, TOTAL_CHANNELS,
};
use ecu_common::ecu::interfaces::{ActuatorHardware, ArmError};

use crate::time::signed_delta;

/// Per-channel bookkeeping: the active window currently armed, if any.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    /// Absolute tick of the pending active edge, if armed.
    pending: Option<(u32, u32)>, // (fire_at_tick, inactive_tick)
}

/// Which family a channel belongs to, for bounds-check selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Injector,
    Ignition,
}

impl ChannelKind {
    fn bounds(self) -> (u32, u32) {
        match self {
            ChannelKind::Injector => (INJECTOR_MIN_ON_TIME_US, INJECTOR_MAX_ON_TIME_US),
            ChannelKind::Ignition => (IGNITION_MIN_ON_TIME_US, IGNITION_MAX_ON_TIME_US),
        }
    }
}

/// Returns the channel kind for channel index `ch` (spec §3: channels
/// 0..CYLINDER_COUNT are injectors, CYLINDER_COUNT..TOTAL_CHANNELS are
/// ignition coils).
pub fn kind_of(ch: u8) -> Option<ChannelKind> {
    let cylinder_count = ecu_common::consts::CYLINDER_COUNT as u8;
    if ch < cylinder_count {
        Some(ChannelKind::Injector)
    } else if (ch as usize) < TOTAL_CHANNELS {
        Some(ChannelKind::Ignition)
    } else {
        None
    }
}

/// Angle scheduler state tracked alongside a hardware backend.
pub struct AngleScheduler {
    channels: [ChannelState; TOTAL_CHANNELS],
}

impl AngleScheduler {
    pub fn new() -> Self {
        Self {
            channels: [ChannelState::default(); TOTAL_CHANNELS],
        }
    }

    /// Arm `channel` to fire at `fire_at_tick` for `duration_ticks` µs
    /// (spec §4.3). Delegates the actual hardware programming to `hw`
    /// only after every software-side bounds/overlap check passes.
    pub fn arm(
        &mut self,
        hw: &mut dyn ActuatorHardware,
        now: u32,
        channel: u8,
        fire_at_tick: u32,
        duration_ticks: u32,
    ) -> Result<(), ArmError> {
        let kind = kind_of(channel).ok_or(ArmError::InvalidChannel(channel))?;
        let (min_on, max_on) = kind.bounds();

        if signed_delta(fire_at_tick, now) <= 0 {
            return Err(ArmError::PastDue(fire_at_tick));
        }
        if duration_ticks < min_on || duration_ticks > max_on {
            return Err(ArmError::DurationOutOfBounds(duration_ticks));
        }

        let inactive_tick = fire_at_tick.wrapping_add(duration_ticks);
        let state = &mut self.channels[channel as usize];
        if let Some((_pending_fire, pending_inactive)) = state.pending {
            // Overlap unless the new active edge precedes the pending
            // window's inactive edge (spec §4.3 last bullet).
            if signed_delta(pending_inactive, fire_at_tick) > 0 {
                return Err(ArmError::Overlap(channel));
            }
        }

        hw.arm_absolute(channel, fire_at_tick, duration_ticks)?;
        state.pending = Some((fire_at_tick, inactive_tick));
        Ok(())
    }

    /// Cancel any pending window on `channel`.
    pub fn cancel(&mut self, hw: &mut dyn ActuatorHardware, channel: u8) {
        if let Some(state) = self.channels.get_mut(channel as usize) {
            state.pending = None;
        }
        hw.cancel(channel);
    }

    /// Cancel every channel. The fail-safe "all outputs off" entry point
    /// routes through this (spec §4.8).
    pub fn cancel_all(&mut self, hw: &mut dyn ActuatorHardware) {
        for ch in 0..TOTAL_CHANNELS as u8 {
            self.cancel(hw, ch);
        }
    }
}

impl Default for AngleScheduler {
    fn default() -> Self {
        Self::new()
    }
}
