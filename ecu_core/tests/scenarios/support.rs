//! Shared test rig for the scenario tests: a `Core` wired to `sim`
//! collaborators plus the exact tooth/gap/cam sequence `decoder.rs`'s own
//! unit tests use to walk the state machine from `Searching` up to
//! `FullySynced`, reused here instead of duplicated per scenario.

#![allow(dead_code)]

use std::sync::Arc;

use ecu_common::config::EcuConfig;
use ecu_common::consts::TOOTH_COUNT;
use ecu_common::ecu::calibration::{ClosedLoopCfg, EoitMapConfig, FuelMaps};
use ecu_common::ecu::interfaces::{CalibrationStore, SensorProvider};
use ecu_common::ecu::sensors::SensorSnapshot;
use ecu_common::error::CoreError;

use ecu_core::core::{Collaborators, Core};
use ecu_core::decoder::{RawCamEdge, RawToothEdge};
use ecu_core::sim::{SimActuatorHardware, SimLambdaProvider, SimSensorProvider};

/// A calibration store with nothing persisted yet — every scenario here
/// cares about runtime behaviour, not calibration round-tripping (that's
/// `calibration_migration`'s job), so `Core::new` falls back to in-memory
/// defaults for all three keys.
pub struct NullCalibrationStore;

impl CalibrationStore for NullCalibrationStore {
    fn load_fuel_maps(&self) -> Result<FuelMaps, CoreError> {
        Err(CoreError::NotReady("test rig: no calibration store"))
    }
    fn save_fuel_maps(&mut self, _maps: &FuelMaps) -> Result<(), CoreError> {
        Ok(())
    }
    fn load_eoit_map_cfg(&self) -> Result<EoitMapConfig, CoreError> {
        Err(CoreError::NotReady("test rig: no calibration store"))
    }
    fn save_eoit_map_cfg(&mut self, _cfg: &EoitMapConfig) -> Result<(), CoreError> {
        Ok(())
    }
    fn load_closed_loop_cfg(&self) -> Result<ClosedLoopCfg, CoreError> {
        Err(CoreError::NotReady("test rig: no calibration store"))
    }
    fn save_closed_loop_cfg(&mut self, _cfg: &ClosedLoopCfg) -> Result<(), CoreError> {
        Ok(())
    }
}

/// `SensorProvider` over a shared, externally-mutable `SimSensorProvider`
/// handle. `Collaborators` takes ownership of its sensor box, so a
/// scenario that needs to change readings mid-run (tip-in acceleration)
/// keeps an `Arc` clone outside and hands this thin forwarding wrapper in.
pub struct SharedSensors(pub Arc<SimSensorProvider>);

impl SensorProvider for SharedSensors {
    fn latest(&self) -> SensorSnapshot {
        self.0.latest()
    }
}

pub fn healthy_warm_snapshot() -> SensorSnapshot {
    SensorSnapshot {
        map_x10_kpa: 400,
        tps_x10_pct: 20,
        clt_c: 90,
        iat_c: 25,
        vbat_x10_v: 140,
        o2_mv: 450,
        sampled_at: 0,
    }
}

pub fn build_core(config: EcuConfig, snapshot: SensorSnapshot) -> Core {
    let collaborators = Collaborators {
        sensors: Box::new(SimSensorProvider::new(snapshot)),
        lambda: Box::new(SimLambdaProvider::new()),
        hw: Box::new(SimActuatorHardware::new()),
        calibration: Box::new(NullCalibrationStore),
    };
    Core::new(config, collaborators)
}

/// Same as [`build_core`] but keeps an `Arc` handle to the sensor
/// provider so the caller can push new readings mid-run.
pub fn build_core_with_shared_sensors(config: EcuConfig, snapshot: SensorSnapshot) -> (Core, Arc<SimSensorProvider>) {
    let sensors = Arc::new(SimSensorProvider::new(snapshot));
    let collaborators = Collaborators {
        sensors: Box::new(SharedSensors(sensors.clone())),
        lambda: Box::new(SimLambdaProvider::new()),
        hw: Box::new(SimActuatorHardware::new()),
        calibration: Box::new(NullCalibrationStore),
    };
    (Core::new(config, collaborators), sensors)
}

/// Tooth period, in microseconds, that yields `rpm` for a given
/// `tooth_per_rev` — the inverse of `DecoderStateMachine::rpm`.
pub fn period_us_for_rpm(rpm: u32, tooth_per_rev: u32) -> u32 {
    60_000_000 / (rpm * tooth_per_rev)
}

/// Feeds the crank signal through the exact sequence `decoder.rs`'s own
/// `two_consecutive_well_formed_gaps_reach_crank_locked` test uses: a
/// throwaway first edge, a full lap of `TOOTH_COUNT - 1` steady teeth,
/// a gap edge, another full lap, a second gap edge (promotes to
/// `CrankLocked`), a matching cam edge (promotes to `FullySynced`), then
/// one more lap so the next `on_tooth_edge` call re-publishes the
/// runtime-state snapshot with the new sync state.
///
/// Returns the tick the cam edge landed on.
pub fn drive_to_fully_synced(core: &Core, tick: &mut u32, period_us: u32) -> u32 {
    let gap_period_us = period_us * 5 / 2;

    *tick += period_us;
    core.on_tooth_edge(RawToothEdge {
        capture_tick: *tick,
        period_us,
    });

    feed_steady_teeth(core, tick, TOOTH_COUNT - 1, period_us);
    *tick += gap_period_us;
    core.on_tooth_edge(RawToothEdge {
        capture_tick: *tick,
        period_us: gap_period_us,
    });

    feed_steady_teeth(core, tick, TOOTH_COUNT - 1, period_us);
    *tick += gap_period_us;
    core.on_tooth_edge(RawToothEdge {
        capture_tick: *tick,
        period_us: gap_period_us,
    });

    let cam_tick = *tick;
    core.on_cam_edge(RawCamEdge { capture_tick: cam_tick });

    feed_steady_teeth(core, tick, TOOTH_COUNT - 1, period_us);
    cam_tick
}

pub fn feed_steady_teeth(core: &Core, tick: &mut u32, count: u32, period_us: u32) {
    for _ in 0..count {
        *tick += period_us;
        core.on_tooth_edge(RawToothEdge {
            capture_tick: *tick,
            period_us,
        });
    }
}
