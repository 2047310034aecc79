//! Scenario: tip-in acceleration (spec §8). A fast MAP rise (throttle
//! tip-in) must engage acceleration enrichment above unity and decay
//! back to 1.00 once `accel_decay_ms` has elapsed, without ever
//! destabilizing the rest of the pipeline (no fail-safe fault, plans
//! keep flowing through the step).
//!
//! The enrichment curve itself is exercised directly against
//! `math::fuel::AccelEnrichment` (the same struct the planner carries
//! privately per-tooth) since `Core` doesn't expose dispatched
//! pulsewidths — `Plan`s live only inside the internal ring buffer.

use ecu_common::config::EcuConfig;
use ecu_common::ecu::sensors::SensorSnapshot;

use ecu_core::math::fuel::AccelEnrichment;

use super::support::{build_core_with_shared_sensors, drive_to_fully_synced, feed_steady_teeth, period_us_for_rpm};

fn cruise_snapshot(map_x10_kpa: u16) -> SensorSnapshot {
    SensorSnapshot {
        map_x10_kpa,
        tps_x10_pct: 150,
        clt_c: 90,
        iat_c: 25,
        vbat_x10_v: 140,
        o2_mv: 450,
        sampled_at: 0,
    }
}

#[test]
fn map_step_engages_enrichment_then_decays_to_unity() {
    let config = EcuConfig::default();
    let mut accel = AccelEnrichment::default();

    // A sharp MAP rise within one short tick reads as a steep slew rate.
    let engaged = accel.update(400.0, 5, &config);
    assert!(engaged > 1.0, "tip-in must enrich above unity");

    // Flat MAP afterward: enrichment decays back to 1.00 within
    // accel_decay_ms, never undershoots it.
    let mut factor = engaged;
    for _ in 0..(config.accel_decay_ms / 5 + 2) {
        factor = accel.update(0.0, 5, &config);
        assert!(factor >= 1.0);
    }
    assert_eq!(factor, 1.0);
}

#[test]
fn core_keeps_dispatching_through_a_map_step() {
    let config = EcuConfig::default();
    let period_us = period_us_for_rpm(2500, config.tooth_per_rev);
    let (core, sensors) = build_core_with_shared_sensors(config, cruise_snapshot(400));

    let mut tick = 0u32;
    drive_to_fully_synced(&core, &mut tick, period_us);
    let before = core.runtime_state().unwrap().injection.plans_dispatched;

    // Tip-in: MAP jumps from 40 kPa to 80 kPa.
    sensors.set(cruise_snapshot(800));
    feed_steady_teeth(&core, &mut tick, 10, period_us);

    let after = core.runtime_state().unwrap().injection.plans_dispatched;
    assert!(after > before, "plans must keep dispatching through the MAP step");
    assert!(!core.failsafe_tick(0), "a throttle tip-in alone is not a fail-safe fault");
}
