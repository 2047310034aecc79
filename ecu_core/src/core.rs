//! The `Core`: owns every subsystem and wires the T1-T4 execution
//! contexts together (spec §5).
//!
//! Decoder (T1), planner (T2) and executor (T3) are edge-triggered and
//! strictly sequential per tooth — the planner only ever wakes on a
//! tooth notification and the executor only ever wakes on the planner's
//! output, so a single synchronous call chain inside [`Core::on_tooth_edge`]
//! satisfies the "wakes on notification" requirement without a separate
//! thread per context. Fail-safe (T4) is the one genuinely independent,
//! periodic context, so it alone gets its own cooperatively-stoppable
//! thread, mirroring the teacher's `run_sim_loop` wall-clock pacing in
//! `evo_control_unit::cycle::CycleRunner::run_sim_loop`.

use std::sync::Mutex as StdMutex;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use ecu_common::config::EcuConfig;
use ecu_common::ecu::calibration::{ClosedLoopCfg, EoiConfig, EoitMapConfig, FuelMaps};
use ecu_common::ecu::diagnostics::{ArmOutcome, InjectionDiagnostic, RuntimeState};
use ecu_common::ecu::interfaces::{ActuatorHardware, CalibrationStore, LambdaProvider, SensorProvider};
use ecu_common::ecu::sync::SyncState;
use ecu_common::error::CoreError;

use crate::decoder::{DecoderStateMachine, RawCamEdge, RawToothEdge};
use crate::executor::{self, ExecutorOutcome};
use crate::failsafe::{FailsafeMonitor, FaultFlags};
use crate::plan_ring::PlanRing;
use crate::planner::{Planner, PlannerOutcome};
use crate::scheduler::AngleScheduler;
use crate::snapshot::SeqlockCell;
use crate::stop_token::StopToken;
use crate::time::HwClock;

/// Everything the core needs from the outside world: sensor/lambda
/// readings and the actual actuator silicon. A board-specific crate
/// supplies real implementations; [`crate::sim`] ships reference ones.
pub struct Collaborators {
    pub sensors: Box<dyn SensorProvider>,
    pub lambda: Box<dyn LambdaProvider>,
    pub hw: Box<dyn ActuatorHardware>,
    pub calibration: Box<dyn CalibrationStore>,
}

/// Owns every subsystem for one engine instance.
pub struct Core {
    clock: HwClock,
    config: EcuConfig,
    stop: StopToken,

    decoder: Mutex<DecoderStateMachine>,
    scheduler: Mutex<AngleScheduler>,
    ring: PlanRing,
    planner: Mutex<Planner>,
    failsafe: Mutex<FailsafeMonitor>,

    fuel_maps: Mutex<FuelMaps>,
    eoi_cfg: Mutex<EoiConfig>,
    eoit_cfg: Mutex<EoitMapConfig>,
    closed_loop_cfg: Mutex<ClosedLoopCfg>,

    sensors: Box<dyn SensorProvider>,
    lambda: Box<dyn LambdaProvider>,
    hw: StdMutex<Box<dyn ActuatorHardware>>,
    calibration: StdMutex<Box<dyn CalibrationStore>>,

    diagnostics: Mutex<InjectionDiagnostic>,
    runtime_state: SeqlockCell<RuntimeState>,
    /// Set once at startup if any calibration key failed its CRC/version
    /// check rather than simply being absent (spec §4.8 fault source
    /// "calibration load fails integrity").
    calibration_integrity_fault: std::sync::atomic::AtomicBool,
    /// Whether the decoder's sync state was crank-valid as of the
    /// previous tooth edge, so a transition into `Searching` can be
    /// caught and acted on immediately — on the very first classification
    /// failure, not only once the threshold-gated `sync_lost` fault
    /// fires a few teeth later (spec §4.2 step 4: "Any classification
    /// failure ... demotes the state to Searching and clears the plan
    /// ring", unconditionally).
    was_crank_valid: std::sync::atomic::AtomicBool,
}

impl Core {
    /// Build a new core. Loads calibration from `collaborators.calibration`,
    /// falling back to in-memory defaults when nothing has been persisted
    /// yet (first boot) rather than failing startup (spec §6: calibration
    /// store `NotFound` is an expected, not exceptional, case).
    pub fn new(config: EcuConfig, collaborators: Collaborators) -> Self {
        let mut integrity_fault = false;
        let mut note_integrity = |err: &CoreError| {
            if matches!(err, CoreError::Integrity(_)) {
                integrity_fault = true;
            }
        };

        let fuel_maps = collaborators.calibration.load_fuel_maps().unwrap_or_else(|e| {
            note_integrity(&e);
            info!(error = %e, "no persisted fuel maps, starting from defaults");
            FuelMaps::default()
        });
        let eoi_cfg = collaborators.calibration.load_eoi_config().unwrap_or_else(|e| {
            note_integrity(&e);
            info!(error = %e, "no persisted EOI config, starting from defaults");
            EoiConfig::default()
        });
        let eoit_cfg = collaborators.calibration.load_eoit_map_cfg().unwrap_or_else(|e| {
            note_integrity(&e);
            info!(error = %e, "no persisted EOI-normal map, starting from defaults");
            EoitMapConfig::default()
        });
        let closed_loop_cfg = collaborators.calibration.load_closed_loop_cfg().unwrap_or_else(|e| {
            note_integrity(&e);
            info!(error = %e, "no persisted closed-loop config, starting from defaults");
            ClosedLoopCfg::default()
        });

        Self {
            clock: HwClock::new(),
            decoder: Mutex::new(DecoderStateMachine::new(&config)),
            scheduler: Mutex::new(AngleScheduler::new()),
            ring: PlanRing::new(),
            planner: Mutex::new(Planner::new()),
            failsafe: Mutex::new(FailsafeMonitor::new()),
            fuel_maps: Mutex::new(fuel_maps),
            eoi_cfg: Mutex::new(eoi_cfg),
            eoit_cfg: Mutex::new(eoit_cfg),
            closed_loop_cfg: Mutex::new(closed_loop_cfg),
            sensors: collaborators.sensors,
            lambda: collaborators.lambda,
            hw: StdMutex::new(collaborators.hw),
            calibration: StdMutex::new(collaborators.calibration),
            diagnostics: Mutex::new(InjectionDiagnostic::default()),
            runtime_state: SeqlockCell::new(RuntimeState::zeroed()),
            calibration_integrity_fault: std::sync::atomic::AtomicBool::new(integrity_fault),
            was_crank_valid: std::sync::atomic::AtomicBool::new(false),
            config,
            stop: StopToken::new(),
        }
    }

    pub fn clock(&self) -> &HwClock {
        &self.clock
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Most recently published engine-wide snapshot. `None` only under
    /// pathological seqlock contention (spec §5 retry bound).
    pub fn runtime_state(&self) -> Option<RuntimeState> {
        self.runtime_state.read()
    }

    /// Feed one crank tooth edge through the decoder (T1), planner (T2)
    /// and executor (T3) in sequence. Called from whatever context owns
    /// edge capture — a real ISR handoff on hardware, or a sim driver
    /// thread in this build.
    pub fn on_tooth_edge(&self, edge: RawToothEdge) {
        let output = {
            let mut decoder = self.decoder.lock();
            decoder.on_tooth_edge(edge)
        };
        let Some(output) = output else {
            return;
        };

        // `sync_lost` only fires after `sync_loss_ticks` consecutive
        // failures; a demotion out of `Crank*` can happen on the very
        // first one (decoder.rs `demote()`), so both are checked here —
        // the ring must be cleared and actuators disarmed the instant
        // sync is lost, not only once the threshold trips.
        let now_crank_valid = output.sync_state.is_crank_valid();
        let was_crank_valid = self.was_crank_valid.swap(now_crank_valid, std::sync::atomic::Ordering::AcqRel);
        let demoted_this_edge = was_crank_valid && !now_crank_valid;

        if output.sync_lost || demoted_this_edge {
            warn!(sync_lost = output.sync_lost, demoted_this_edge, "crank sync lost, clearing plan ring");
            self.ring.clear();
            let mut scheduler = self.scheduler.lock();
            let mut hw = self.hw.lock().unwrap();
            scheduler.cancel_all(&mut **hw);
        }

        let narrowband_present = self.sensors.latest().o2_mv > 0;

        let limp = self.failsafe.lock().overrides(&self.config);

        let (outcome, trims) = {
            let mut planner = self.planner.lock();
            let closed_loop_cfg = *self.closed_loop_cfg.lock();
            let eoi_cfg = *self.eoi_cfg.lock();
            let mut diagnostics = self.diagnostics.lock();
            let outcome = planner.tick(
                &self.clock,
                output.sync_state,
                output.rpm,
                output.event,
                self.sensors.as_ref(),
                self.lambda.as_ref(),
                narrowband_present,
                &self.fuel_maps,
                &self.eoit_cfg,
                &eoi_cfg,
                &closed_loop_cfg,
                &self.config,
                &self.ring,
                &mut diagnostics,
                limp,
            );
            (outcome, planner.trims())
        };

        if let PlannerOutcome::Skipped(reason) = outcome {
            debug!(?reason, "planner skipped this tooth");
        }

        self.dispatch_executor(output.sync_state, output.crank_angle_deg);
        self.publish_runtime_state(output.sync_state, output.rpm, edge.capture_tick, trims);
    }

    /// Feed one cam edge through the decoder (spec §4.2 step 4).
    pub fn on_cam_edge(&self, edge: RawCamEdge) {
        self.decoder.lock().on_cam_edge(edge);
    }

    fn dispatch_executor(&self, sync_state: SyncState, crank_angle_deg: f32) {
        let mut scheduler = self.scheduler.lock();
        let mut hw = self.hw.lock().unwrap();
        let mut diagnostics = self.diagnostics.lock();
        let outcome = executor::tick(
            &self.ring,
            &mut scheduler,
            &mut **hw,
            self.clock.now(),
            crank_angle_deg,
            sync_state,
            &self.config,
            &mut diagnostics,
        );
        if matches!(outcome, ExecutorOutcome::DiscardedStale) {
            debug!("executor discarded a stale plan");
        }
    }

    fn publish_runtime_state(&self, sync_state: SyncState, rpm: u32, now: u32, trims: ecu_common::ecu::trims::FuelTrims) {
        let limp_active = self.failsafe.lock().is_limp_active();
        let diagnostics = *self.diagnostics.lock();
        self.runtime_state.write(RuntimeState {
            sync_state,
            rpm,
            trims,
            limp_active,
            fault_since_tick: None,
            last_tooth_tick: now,
            injection: diagnostics,
        });
    }

    /// One fail-safe evaluation (T4, spec §4.8). `now_ms` is a
    /// millisecond-domain tick, independent of HW-Time microseconds —
    /// callers typically derive it from a coarse periodic timer.
    pub fn failsafe_tick(&self, now_ms: u32) -> bool {
        let faults = self.current_faults();
        let mut fsm = self.failsafe.lock();
        let limp = fsm.tick(now_ms, faults, &self.config);

        if faults.contains(FaultFlags::WATCHDOG_TIMEOUT) {
            warn!("watchdog timeout, forcing all outputs off");
            let mut scheduler = self.scheduler.lock();
            let mut hw = self.hw.lock().unwrap();
            FailsafeMonitor::emergency_stop_all(&mut scheduler, &mut **hw);
        }

        limp
    }

    fn current_faults(&self) -> FaultFlags {
        let mut faults = FaultFlags::empty();
        let Some(state) = self.runtime_state() else {
            return faults;
        };

        if state.rpm >= self.config.rpm_max {
            faults |= FaultFlags::OVER_REV;
        }
        if !state.sync_state.is_crank_valid() {
            faults |= FaultFlags::SYNC_LOST;
        }

        let snapshot = self.sensors.latest();
        if snapshot.clt_c > self.config.clt_overheat_c {
            faults |= FaultFlags::OVERHEAT;
        }
        if snapshot.vbat_x10_v < self.config.vbat_safe_min_x10 || snapshot.vbat_x10_v > self.config.vbat_safe_max_x10 {
            faults |= FaultFlags::VBAT_OUT_OF_RANGE;
        }

        let rejected = state
            .injection
            .per_cylinder
            .iter()
            .any(|c| c.last_arm_outcome == ArmOutcome::Rejected);
        if rejected {
            faults |= FaultFlags::ARM_REJECTED;
        }

        if self.calibration_integrity_fault.load(std::sync::atomic::Ordering::Acquire) {
            faults |= FaultFlags::CALIBRATION_INTEGRITY;
        }

        faults
    }

    /// Limp-mode calibration overrides currently in effect, if any.
    pub fn limp_overrides(&self) -> Option<crate::failsafe::LimpOverrides> {
        self.failsafe.lock().overrides(&self.config)
    }

    /// Unconditional all-outputs-off, independent of fail-safe latch
    /// state or plan dispatch (spec §4.8's dedicated entry point).
    pub fn emergency_stop_all(&self) {
        let mut scheduler = self.scheduler.lock();
        let mut hw = self.hw.lock().unwrap();
        FailsafeMonitor::emergency_stop_all(&mut scheduler, &mut **hw);
    }

    /// Persist the current fuel maps, EOI-normal map and closed-loop
    /// config (spec §6 `MAP_SAVE_INTERVAL_MS`). Called periodically by
    /// the owning binary, not by the core's own loops.
    pub fn save_calibration(&self) -> Result<(), ecu_common::error::CoreError> {
        let mut store = self.calibration.lock().unwrap();
        store.save_fuel_maps(&self.fuel_maps.lock())?;
        store.save_eoi_config(&self.eoi_cfg.lock())?;
        store.save_eoit_map_cfg(&self.eoit_cfg.lock())?;
        store.save_closed_loop_cfg(&self.closed_loop_cfg.lock())?;
        Ok(())
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }
}
