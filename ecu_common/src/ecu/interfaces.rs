//! Collaborator trait contracts (spec §6 "External interfaces").
//!
//! Each trait is the seam a board-specific crate would implement against
//! real silicon; `ecu_core` additionally ships a reference/simulated
//! implementation of each one. Shaped like the teacher's `Watchdog` trait
//! plus its paired doc-example: a narrow trait, documented with the
//! contract the implementor must uphold rather than how to uphold it.

use thiserror::Error;

use crate::ecu::calibration::{ClosedLoopCfg, EoiConfig, EoitMapConfig, FuelMaps};
use crate::ecu::sensors::SensorSnapshot;
use crate::error::CoreError;

/// Reasons an actuator arm request can be refused (spec §4.3 "Angle
/// scheduler", §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArmError {
    #[error("channel {0} already armed for an overlapping window")]
    Overlap(u8),
    #[error("requested on-time {0} us is outside the channel's bounds")]
    DurationOutOfBounds(u32),
    #[error("requested tick {0} has already passed")]
    PastDue(u32),
    #[error("channel index {0} out of range")]
    InvalidChannel(u8),
}

impl From<ArmError> for CoreError {
    fn from(e: ArmError) -> Self {
        match e {
            ArmError::Overlap(_) => CoreError::Rejected("actuator arm overlap"),
            ArmError::DurationOutOfBounds(_) => CoreError::BadArg("actuator on-time out of bounds"),
            ArmError::PastDue(_) => CoreError::Rejected("actuator arm tick already passed"),
            ArmError::InvalidChannel(_) => CoreError::BadArg("actuator channel index out of range"),
        }
    }
}

/// Provides the most recent analog sensor snapshot (spec §6 "Sensor
/// provider"). Implementations must be safe to call from the planner
/// context (T2) without blocking.
pub trait SensorProvider: Send {
    /// Return the latest available snapshot, regardless of staleness —
    /// the caller decides freshness against [`SensorSnapshot::is_stale`].
    fn latest(&self) -> SensorSnapshot;
}

/// Provides the wideband lambda (air-fuel ratio) reading used by the
/// closed-loop fuel corrector (spec §4.5, §6 "Lambda provider").
pub trait LambdaProvider: Send {
    /// Current lambda value (1.0 = stoichiometric) and the tick it was
    /// sampled at, or `None` if the sensor has never reported.
    fn latest_lambda(&self) -> Option<(f32, u32)>;
}

/// Arms injector and ignition channels at an absolute HW-Time tick
/// (spec §4.3 "Angle scheduler", §6 "Actuator hardware").
pub trait ActuatorHardware: Send {
    /// Arm `channel` to assert at `at_tick` for `on_time_us`
    /// microseconds. Implementations must reject overlapping windows and
    /// out-of-bounds durations rather than silently clamping (spec §4.3
    /// invariant).
    fn arm_absolute(&mut self, channel: u8, at_tick: u32, on_time_us: u32) -> Result<(), ArmError>;

    /// Cancel a previously armed window on `channel`, if one is still
    /// pending. No-op if the channel is idle or already fired.
    fn cancel(&mut self, channel: u8);
}

/// Persists and reloads calibration data (spec §6 "Calibration store").
pub trait CalibrationStore: Send {
    fn load_fuel_maps(&self) -> Result<FuelMaps, CoreError>;
    fn save_fuel_maps(&mut self, maps: &FuelMaps) -> Result<(), CoreError>;

    fn load_eoi_config(&self) -> Result<EoiConfig, CoreError>;
    fn save_eoi_config(&mut self, cfg: &EoiConfig) -> Result<(), CoreError>;

    fn load_eoit_map_cfg(&self) -> Result<EoitMapConfig, CoreError>;
    fn save_eoit_map_cfg(&mut self, cfg: &EoitMapConfig) -> Result<(), CoreError>;

    fn load_closed_loop_cfg(&self) -> Result<ClosedLoopCfg, CoreError>;
    fn save_closed_loop_cfg(&mut self, cfg: &ClosedLoopCfg) -> Result<(), CoreError>;
}
