//! Simulated collaborators (spec §6): reference implementations of the
//! sensor/lambda/actuator traits for the non-`rt` build, standing in for
//! board-specific drivers. Grounded on the teacher's `run_sim_loop`
//! plant-stub pattern — deterministic, in-memory, no hardware access.

use parking_lot::Mutex;

use ecu_common::ecu::interfaces::{ActuatorHardware, ArmError, LambdaProvider, SensorProvider};
use ecu_common::ecu::sensors::SensorSnapshot;

/// An in-memory sensor snapshot a test harness or sim driver can update
/// directly.
pub struct SimSensorProvider {
    snapshot: Mutex<SensorSnapshot>,
}

impl SimSensorProvider {
    pub fn new(initial: SensorSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(initial),
        }
    }

    pub fn set(&self, snapshot: SensorSnapshot) {
        *self.snapshot.lock() = snapshot;
    }
}

impl SensorProvider for SimSensorProvider {
    fn latest(&self) -> SensorSnapshot {
        *self.snapshot.lock()
    }
}

/// An in-memory wideband lambda reading.
pub struct SimLambdaProvider {
    reading: Mutex<Option<(f32, u32)>>,
}

impl SimLambdaProvider {
    pub fn new() -> Self {
        Self {
            reading: Mutex::new(None),
        }
    }

    pub fn set(&self, lambda: f32, sampled_at: u32) {
        *self.reading.lock() = Some((lambda, sampled_at));
    }
}

impl Default for SimLambdaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LambdaProvider for SimLambdaProvider {
    fn latest_lambda(&self) -> Option<(f32, u32)> {
        *self.reading.lock()
    }
}

/// Records every arm/cancel call instead of driving real silicon — lets
/// integration tests assert on exactly what the scheduler asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmedWindow {
    pub channel: u8,
    pub at_tick: u32,
    pub on_time_us: u32,
}

pub struct SimActuatorHardware {
    armed: Vec<ArmedWindow>,
    cancelled: Vec<u8>,
}

impl SimActuatorHardware {
    pub fn new() -> Self {
        Self {
            armed: Vec::new(),
            cancelled: Vec::new(),
        }
    }

    pub fn armed_windows(&self) -> &[ArmedWindow] {
        &self.armed
    }

    pub fn cancelled_channels(&self) -> &[u8] {
        &self.cancelled
    }
}

impl Default for SimActuatorHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorHardware for SimActuatorHardware {
    fn arm_absolute(&mut self, channel: u8, at_tick: u32, on_time_us: u32) -> Result<(), ArmError> {
        self.armed.push(ArmedWindow {
            channel,
            at_tick,
            on_time_us,
        });
        Ok(())
    }

    fn cancel(&mut self, channel: u8) {
        self.cancelled.push(channel);
    }
}
