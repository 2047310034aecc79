//! Executor: plan dispatch onto actuator channels (spec §4.7).
//!
//! Wakes on planner notification (T3). Pops the newest plan, checks its
//! age, and arms both the injector and ignition channel for the
//! triggering cylinder through the angle scheduler — full-sequential
//! when `FullySynced`, semi-sequential/wasted-spark otherwise.

use ecu_common::config::EcuConfig;
use ecu_common::consts::CYLINDER_COUNT;
use ecu_common::ecu::diagnostics::InjectionDiagnostic;
use ecu_common::ecu::interfaces::ActuatorHardware;
use ecu_common::ecu::plan::Plan;
use ecu_common::ecu::sync::SyncState;

use crate::plan_ring::PlanRing;
use crate::scheduler::AngleScheduler;
use crate::time::elapsed_us;

/// Outcome of one executor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorOutcome {
    /// Nothing queued.
    Idle,
    /// A plan was dispatched (channels armed; some may still have been
    /// individually rejected by the scheduler, see diagnostics).
    Dispatched,
    /// The newest plan was too old to act on.
    DiscardedStale,
}

/// Converts a target crank/cam angle plus the current angular rate into
/// an absolute HW-Time tick to arm at (spec §4.3's angle-to-tick
/// conversion, applied by the caller as the spec mandates).
fn angle_to_tick(now: u32, last_period_us: u32, tooth_per_rev: u32, current_deg: f32, target_deg: f32, cycle_deg: f32) -> u32 {
    let k = last_period_us as f32 * tooth_per_rev as f32 / 360.0; // us per degree
    let delta_deg = wrap_deg(target_deg - current_deg, cycle_deg);
    let delta_ticks = (k * delta_deg) as u32;
    now.wrapping_add(delta_ticks)
}

fn wrap_deg(deg: f32, cycle_deg: f32) -> f32 {
    let mut d = deg % cycle_deg;
    if d < 0.0 {
        d += cycle_deg;
    }
    d
}

/// Crank-angle phase offset of `cylinder`'s TDC relative to cylinder 0, in
/// the TDC-corrected angle domain the decoder publishes (spec §4.7).
/// Full-sequential firing spaces the four cylinders 180° apart across the
/// 720° cycle; `angle_to_tick`'s `wrap_deg` folds that back into the 360°
/// wasted-spark cycle, which naturally pairs cylinders 180° apart (0 & 2,
/// 1 & 3) onto the same semi-sequential target.
fn cylinder_phase_deg(cylinder: u8) -> f32 {
    cylinder as f32 * 180.0
}

/// Run one executor cycle against the newest queued plan.
#[allow(clippy::too_many_arguments)]
pub fn tick(
    ring: &PlanRing,
    scheduler: &mut AngleScheduler,
    hw: &mut dyn ActuatorHardware,
    now: u32,
    current_crank_deg: f32,
    sync_state: SyncState,
    config: &EcuConfig,
    diagnostics: &mut InjectionDiagnostic,
) -> ExecutorOutcome {
    let Some(plan) = ring.pop_newest() else {
        return ExecutorOutcome::Idle;
    };

    let age = elapsed_us(now, plan.planned_at);
    if age > config.executor_max_plan_age_us {
        diagnostics.record_deadline_miss();
        return ExecutorOutcome::DiscardedStale;
    }

    let cycle_deg = sync_state.cycle_deg();
    let target_eoi = if sync_state.is_fully_synced() {
        plan.eoi_deg
    } else {
        plan.fallback_eoi_deg
    };

    let injector_channel = plan.cylinder % CYLINDER_COUNT as u8;
    let ignition_channel = CYLINDER_COUNT as u8 + injector_channel;

    // The plan's EOI/advance are single scalars shared by every cylinder
    // at a given (rpm, load); the cylinder's own TDC offset within the
    // cycle has to be added here, at dispatch time, or all four channels
    // would target the same absolute angle (spec §4.7).
    let phase_deg = cylinder_phase_deg(plan.cylinder);
    let eoi_target_deg = target_eoi + phase_deg;
    let advance_deg = plan.advance_deg_x10 as f32 / 10.0;
    let ignition_target_deg = phase_deg - advance_deg;

    let injector_fire_tick = angle_to_tick(
        now,
        last_period_from_rpm(plan.rpm, config),
        config.tooth_per_rev,
        current_crank_deg,
        eoi_target_deg - microseconds_to_deg(plan.pulsewidth_us, plan.rpm, config),
        cycle_deg,
    );
    let injector_result = scheduler.arm(hw, now, injector_channel, injector_fire_tick, plan.pulsewidth_us);
    if injector_result.is_err() {
        diagnostics.record_arm(plan.cylinder as usize, 0.0, plan.eoi_deg, ecu_common::ecu::diagnostics::ArmOutcome::Rejected);
    }

    let ignition_on_time = config_ignition_on_time_us();
    let ignition_fire_tick = angle_to_tick(
        now,
        last_period_from_rpm(plan.rpm, config),
        config.tooth_per_rev,
        current_crank_deg,
        ignition_target_deg,
        cycle_deg,
    );
    let ignition_result = scheduler.arm(hw, now, ignition_channel, ignition_fire_tick, ignition_on_time);
    if ignition_result.is_err() {
        diagnostics.record_arm(plan.cylinder as usize, 0.0, plan.eoi_deg, ecu_common::ecu::diagnostics::ArmOutcome::Rejected);
    }

    ExecutorOutcome::Dispatched
}

fn last_period_from_rpm(rpm: u32, config: &EcuConfig) -> u32 {
    if rpm == 0 {
        return 0;
    }
    60_000_000 / (rpm * config.tooth_per_rev)
}

fn microseconds_to_deg(us: u32, rpm: u32, config: &EcuConfig) -> f32 {
    if rpm == 0 {
        return 0.0;
    }
    let period_us = last_period_from_rpm(rpm, config) as f32;
    us as f32 / period_us * (360.0 / config.tooth_per_rev as f32)
}

/// Fixed ignition coil dwell/on-time. A real calibration would vary this
/// with vbat; fixed here because the spec's ignition section never ties
/// dwell to a lookup table, unlike pulsewidth.
fn config_ignition_on_time_us() -> u32 {
    ecu_common::consts::IGNITION_MIN_ON_TIME_US + 500
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimActuatorHardware;
    use ecu_common::ecu::tooth::ToothEvent;

    fn sample_plan(planned_at: u32) -> Plan {
        Plan {
            cylinder: 0,
            rpm: 2000,
            load_x10_kpa: 600,
            advance_deg_x10: 150,
            pulsewidth_us: 3000,
            eoi_deg: 90.0,
            fallback_eoi_deg: 180.0,
            trigger: ToothEvent::zeroed(),
            planned_at,
        }
    }

    #[test]
    fn idle_when_ring_empty() {
        let ring = PlanRing::new();
        let mut scheduler = AngleScheduler::new();
        let mut hw = SimActuatorHardware::new();
        let mut diag = InjectionDiagnostic::default();
        let cfg = EcuConfig::default();
        let outcome = tick(&ring, &mut scheduler, &mut hw, 10_000, 0.0, SyncState::CrankLocked, &cfg, &mut diag);
        assert_eq!(outcome, ExecutorOutcome::Idle);
    }

    #[test]
    fn discards_stale_plan() {
        let ring = PlanRing::new();
        let cfg = EcuConfig::default();
        ring.push(sample_plan(0));
        let mut scheduler = AngleScheduler::new();
        let mut hw = SimActuatorHardware::new();
        let mut diag = InjectionDiagnostic::default();
        let now = cfg.executor_max_plan_age_us + 1000;
        let outcome = tick(&ring, &mut scheduler, &mut hw, now, 0.0, SyncState::CrankLocked, &cfg, &mut diag);
        assert_eq!(outcome, ExecutorOutcome::DiscardedStale);
        assert_eq!(diag.deadline_misses, 1);
    }

    #[test]
    fn dispatches_fresh_plan_and_arms_both_channels() {
        let ring = PlanRing::new();
        let cfg = EcuConfig::default();
        ring.push(sample_plan(1000));
        let mut scheduler = AngleScheduler::new();
        let mut hw = SimActuatorHardware::new();
        let mut diag = InjectionDiagnostic::default();
        let outcome = tick(
            &ring,
            &mut scheduler,
            &mut hw,
            1100,
            0.0,
            SyncState::FullySynced {
                cam_phase: ecu_common::ecu::sync::CamPhase::FirstRev,
            },
            &cfg,
            &mut diag,
        );
        assert_eq!(outcome, ExecutorOutcome::Dispatched);
        assert_eq!(hw.armed_windows().len(), 2);
    }

    #[test]
    fn ignition_fires_at_advance_angle_not_eoi() {
        let cfg = EcuConfig::default();
        let plan = sample_plan(0);
        let now = 0u32;
        let cycle_deg = 720.0;
        let last_period = last_period_from_rpm(plan.rpm, &cfg);
        let expected_ignition_tick = angle_to_tick(
            now,
            last_period,
            cfg.tooth_per_rev,
            0.0,
            0.0 - (plan.advance_deg_x10 as f32 / 10.0),
            cycle_deg,
        );

        let ring = PlanRing::new();
        ring.push(plan);
        let mut scheduler = AngleScheduler::new();
        let mut hw = SimActuatorHardware::new();
        let mut diag = InjectionDiagnostic::default();
        tick(
            &ring,
            &mut scheduler,
            &mut hw,
            now,
            0.0,
            SyncState::FullySynced {
                cam_phase: ecu_common::ecu::sync::CamPhase::FirstRev,
            },
            &cfg,
            &mut diag,
        );

        let ignition_window = hw
            .armed_windows()
            .iter()
            .find(|w| w.channel == CYLINDER_COUNT as u8)
            .expect("ignition channel armed");
        assert_eq!(ignition_window.at_tick, expected_ignition_tick);
        assert_ne!(ignition_window.at_tick, plan.eoi_deg as u32, "ignition must not target the EOI angle");
    }

    #[test]
    fn injector_targets_differ_by_cylinder_phase() {
        let cfg = EcuConfig::default();
        let mut plan0 = sample_plan(0);
        plan0.cylinder = 0;
        let mut plan1 = sample_plan(0);
        plan1.cylinder = 1;

        let fire_tick_for = |plan: Plan| {
            let ring = PlanRing::new();
            ring.push(plan);
            let mut scheduler = AngleScheduler::new();
            let mut hw = SimActuatorHardware::new();
            let mut diag = InjectionDiagnostic::default();
            tick(
                &ring,
                &mut scheduler,
                &mut hw,
                0,
                0.0,
                SyncState::FullySynced {
                    cam_phase: ecu_common::ecu::sync::CamPhase::FirstRev,
                },
                &cfg,
                &mut diag,
            );
            hw.armed_windows().iter().find(|w| w.channel == plan.cylinder).unwrap().at_tick
        };

        assert_ne!(fire_tick_for(plan0), fire_tick_for(plan1));
    }
}
