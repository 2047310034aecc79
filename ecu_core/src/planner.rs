//! Tooth-triggered planner (spec §4.6).
//!
//! Runs once per tooth notification on a cooperatively-scheduled,
//! non-ISR context (T2). Pure orchestration: every actual computation
//! lives in `crate::math`/`crate::closed_loop`; this module only
//! sequences the seven steps and decides whether to emit.

use parking_lot::Mutex;
use tracing::warn;

use ecu_common::config::EcuConfig;
use ecu_common::consts::LTFT_STABILITY_DEADBAND;
use ecu_common::ecu::calibration::{ClosedLoopCfg, EoiConfig, EoitMapConfig, FuelMaps};
use ecu_common::ecu::diagnostics::{ArmOutcome, InjectionDiagnostic};
use ecu_common::ecu::interfaces::{LambdaProvider, SensorProvider};
use ecu_common::ecu::plan::Plan;
use ecu_common::ecu::sensors::SensorSnapshot;
use ecu_common::ecu::sync::SyncState;
use ecu_common::ecu::tables::LookupCache;
use ecu_common::ecu::tooth::ToothEvent;
use ecu_common::ecu::trims::FuelTrims;

use crate::closed_loop::{self, PiGains, PiState};
use crate::failsafe::LimpOverrides;
use crate::math::fuel::{self, AccelEnrichment, PulsewidthInputs};
use crate::math::ignition::{self, KnockRetard};
use crate::plan_ring::PlanRing;
use crate::time::{HwClock, elapsed_us};

/// Why the planner produced nothing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotCrankSynced,
    SensorsStale,
    FuelCut,
    Overheat,
    UnderVolt,
}

/// Outcome of one planner tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlannerOutcome {
    Emitted(Plan),
    Skipped(SkipReason),
}

/// Per-tick state the planner carries across invocations.
pub struct Planner {
    ve_cache: LookupCache,
    ignition_cache: LookupCache,
    lambda_cache: LookupCache,
    pi_state: PiState,
    trims: FuelTrims,
    accel: AccelEnrichment,
    knock: KnockRetard,
    last_map_x10_kpa: Option<u16>,
    last_rpm: Option<u32>,
    last_load: Option<u32>,
    last_tick_ms: Option<u32>,
}

/// RPM/load deadband the lookup caches tolerate before recomputing
/// (spec §9 performance note: deadband cache avoids redundant lookups
/// on back-to-back teeth within the same bin).
const RPM_DEADBAND: u32 = 25;
const LOAD_DEADBAND: u32 = 2;

impl Planner {
    pub fn new() -> Self {
        Self {
            ve_cache: LookupCache::default(),
            ignition_cache: LookupCache::default(),
            lambda_cache: LookupCache::default(),
            pi_state: PiState::default(),
            trims: FuelTrims::zeroed(),
            accel: AccelEnrichment::default(),
            knock: KnockRetard::default(),
            last_map_x10_kpa: None,
            last_rpm: None,
            last_load: None,
            last_tick_ms: None,
        }
    }

    /// Live STFT/LTFT state, for publication into `RuntimeState`.
    pub fn trims(&self) -> FuelTrims {
        self.trims
    }

    /// Run one planner cycle (spec §4.6 steps 1-7).
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        clock: &HwClock,
        sync_state: SyncState,
        rpm: u32,
        trigger: ToothEvent,
        sensors: &dyn SensorProvider,
        lambda: &dyn LambdaProvider,
        narrowband_present: bool,
        fuel_maps: &Mutex<FuelMaps>,
        eoit_cfg: &Mutex<EoitMapConfig>,
        eoi_cfg: &EoiConfig,
        closed_loop_cfg: &ClosedLoopCfg,
        config: &EcuConfig,
        ring: &PlanRing,
        diagnostics: &mut InjectionDiagnostic,
        limp: Option<LimpOverrides>,
    ) -> PlannerOutcome {
        let started_at = clock.now();

        // Step 1: gate on sync state.
        if !sync_state.is_crank_valid() {
            return PlannerOutcome::Skipped(SkipReason::NotCrankSynced);
        }

        // Step 2: sensor snapshot, tolerating staleness up to the bound.
        let snapshot = sensors.latest();
        if snapshot.is_stale(started_at, ecu_common::consts::SENSOR_STALE_MS * 1000) {
            return PlannerOutcome::Skipped(SkipReason::SensorsStale);
        }

        // Step 3: over-rev / over-heat / under-volt gate. While limp is
        // latched the cap tightens to `limp_rpm_limit` (spec §4.8 "rpm
        // cap") instead of the normal fuel-cut threshold.
        let rpm_cap = limp.map(|o| o.rpm_cap).unwrap_or(config.rpm_fuel_cut);
        if rpm >= rpm_cap {
            return PlannerOutcome::Skipped(SkipReason::FuelCut);
        }
        if snapshot.clt_c > config.clt_overheat_c {
            return PlannerOutcome::Skipped(SkipReason::Overheat);
        }
        if snapshot.vbat_x10_v < config.vbat_safe_min_x10 || snapshot.vbat_x10_v > config.vbat_safe_max_x10 {
            return PlannerOutcome::Skipped(SkipReason::UnderVolt);
        }

        // Step 4: table lookups under a single mutex each.
        let load = snapshot.map_x10_kpa as u32;
        let (ve, ignition_base, lambda_target, eoi_normal) = {
            let maps = fuel_maps.lock();
            let ve = self.ve_cache.lookup(&maps.ve, rpm, load, RPM_DEADBAND, LOAD_DEADBAND);
            // Ignition advance bins are stored as two's-complement bit
            // patterns in the otherwise-unsigned `MapTable` cell (same
            // reinterpretation `EoitMapConfig::from_payload` uses) since
            // advance can be negative near idle.
            let ignition_base = self
                .ignition_cache
                .lookup(&maps.ignition_advance, rpm, load, RPM_DEADBAND, LOAD_DEADBAND)
                as i16;
            let lambda_target_raw = self
                .lambda_cache
                .lookup(&maps.lambda_target, rpm, load, RPM_DEADBAND, LOAD_DEADBAND);
            drop(maps);
            let eoit = eoit_cfg.lock();
            let eoi_normal = if eoit.enabled {
                eoit.table.lookup(rpm, load) as f32 / 10.0
            } else {
                eoi_cfg.normal_deg
            };
            (ve, ignition_base, lambda_target_raw as f32 / 1000.0, eoi_normal)
        };

        // Limp mode forces VE and λ target to the calibrated limp values,
        // overriding the table lookup outright rather than blending with
        // it (spec §4.8 "VE forced to LIMP_VE ... λ target = 0.85").
        let ve = limp.map(|o| o.ve_pct_x10).unwrap_or(ve);
        let lambda_target = limp.map(|o| o.lambda_target).unwrap_or(lambda_target);

        // Step 5: closed-loop fuel, if a valid lambda reading is available.
        // STFT is the live PI output; LTFT is its slow EMA, folded into
        // the VE cell once it drifts past the apply threshold (spec §3
        // "Fuel trims"). Neither updates on an invalid reading — STFT
        // holds its last value and LTFT does not learn (spec §4.5).
        let dt_s = self.dt_seconds(started_at);
        let dt_ms = (dt_s.max(0.0) * 1000.0) as u32;
        let wideband = lambda.latest_lambda();
        let measured = closed_loop::lambda_is_valid(wideband, started_at, narrowband_present, config);

        let rpm_stable = self.last_rpm.map(|r| rpm.abs_diff(r) <= LTFT_STABILITY_DEADBAND).unwrap_or(false);
        let load_stable = self.last_load.map(|l| load.abs_diff(l) <= LTFT_STABILITY_DEADBAND).unwrap_or(false);
        let stable = rpm_stable && load_stable;
        self.last_rpm = Some(rpm);
        self.last_load = Some(load);

        if let Some(m) = measured {
            let gains = PiGains {
                kp: closed_loop_cfg.kp,
                ki: closed_loop_cfg.ki,
                integral_min: closed_loop_cfg.integral_min,
                integral_max: closed_loop_cfg.integral_max,
            };
            let raw_stft = closed_loop::pi_compute(&mut self.pi_state, &gains, lambda_target, m, dt_s);
            self.trims.update_stft(raw_stft, config.stft_limit, stable, dt_ms);

            if self.trims.ltft_may_learn(config.ltft_stable_ms) {
                self.trims.update_ltft(config.ltft_alpha, config.ltft_limit);
            }
            if self.trims.ltft_exceeds_threshold(config.ltft_apply_threshold) {
                fuel_maps.lock().ve.fold_correction(rpm, load, 1.0 + self.trims.ltft);
                self.trims.reset_ltft();
            }
        }

        let map_delta = load as f32 - self.last_map_x10_kpa.unwrap_or(load as u16) as f32;
        self.last_map_x10_kpa = Some(snapshot.map_x10_kpa);
        let accel_factor = self.accel.update(map_delta, dt_ms, config);

        let pw_inputs = PulsewidthInputs {
            ve_pct_x10: ve,
            map_x10_kpa: snapshot.map_x10_kpa,
            warmup_factor: fuel::warmup_factor(snapshot.clt_c, config),
            accel_factor,
            lambda_correction: self.trims.stft,
            vbat_x10_v: snapshot.vbat_x10_v,
            req_fuel_us: config.req_fuel_us,
        };
        let pulsewidth_us = fuel::compute_pulsewidth_us(&pw_inputs, config);
        // Forced advance bypasses knock retard entirely (spec §4.8: knock
        // retard is left untouched while limp is latched, not applied on
        // top of the forced timing).
        let advance_deg_x10 = match limp {
            Some(o) => (o.advance_deg * 10.0).round() as i16,
            None => ignition::compute_advance_deg_x10(ignition_base, &self.knock, config),
        };

        // Step 6: produce a plan and push it.
        let plan = Plan {
            cylinder: cylinder_for_tooth(&trigger),
            rpm,
            load_x10_kpa: snapshot.map_x10_kpa,
            advance_deg_x10,
            pulsewidth_us,
            eoi_deg: eoi_normal,
            fallback_eoi_deg: eoi_cfg.fallback_normal_deg,
            trigger,
            planned_at: started_at,
        };
        ring.push(plan);
        diagnostics.record_arm(plan.cylinder as usize, 0.0, plan.eoi_deg, ArmOutcome::Armed);

        // Step 7: soft deadline check, recorded but non-gating.
        let elapsed = elapsed_us(clock.now(), started_at);
        if elapsed > config.planner_deadline_us {
            warn!(elapsed_us = elapsed, deadline_us = config.planner_deadline_us, "planner deadline miss");
        }

        PlannerOutcome::Emitted(plan)
    }

    /// Seconds elapsed since the previous tick, given `now_us` in HW-Time
    /// microseconds. Zero on the very first call (no prior sample yet).
    fn dt_seconds(&mut self, now_us: u32) -> f32 {
        let dt = match self.last_tick_ms {
            Some(last) => now_us.wrapping_sub(last) as f32 / 1_000_000.0,
            None => 0.0,
        };
        self.last_tick_ms = Some(now_us);
        dt
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps the tooth index at the moment of the trigger to a cylinder
/// (spec §3/§4.7): wasted-spark/semi-sequential pairs 0°/180° resolve to
/// the same two cylinder groups regardless of sync level; full-sequential
/// disambiguates using tooth-relative quadrant once `FullySynced`.
fn cylinder_for_tooth(trigger: &ToothEvent) -> u8 {
    let quadrant = (trigger.tooth_index / (ecu_common::consts::TOOTH_COUNT / 4).max(1)) % 4;
    quadrant as u8
}

#[allow(dead_code)]
fn is_stale(snapshot: &SensorSnapshot, now: u32, stale_us: u32) -> bool {
    snapshot.is_stale(now, stale_us)
}
