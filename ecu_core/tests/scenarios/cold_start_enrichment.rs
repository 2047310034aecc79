//! Scenario: cold start enrichment (spec §8). A cold coolant reading
//! must still produce dispatched plans (no overheat/undervolt gate
//! involved) while the warmup curve itself pushes pulsewidth upward
//! relative to a fully-warmed engine at the same rpm/load.

use ecu_common::config::EcuConfig;
use ecu_common::ecu::sensors::SensorSnapshot;

use ecu_core::math::fuel::warmup_factor;

use super::support::{build_core, drive_to_fully_synced, period_us_for_rpm};

fn cold_snapshot() -> SensorSnapshot {
    SensorSnapshot {
        map_x10_kpa: 400,
        tps_x10_pct: 20,
        clt_c: -10,
        iat_c: 5,
        vbat_x10_v: 140,
        o2_mv: 450,
        sampled_at: 0,
    }
}

#[test]
fn cold_engine_enriches_above_unity() {
    let config = EcuConfig::default();
    assert!(warmup_factor(-10, &config) > 1.0);
    assert!(warmup_factor(-10, &config) > warmup_factor(90, &config));
}

#[test]
fn cold_start_still_dispatches_plans() {
    let config = EcuConfig::default();
    let period_us = period_us_for_rpm(400, config.tooth_per_rev); // cranking speed
    let core = build_core(config, cold_snapshot());

    let mut tick = 0u32;
    drive_to_fully_synced(&core, &mut tick, period_us);

    let state = core.runtime_state().expect("runtime state published");
    assert!(state.injection.plans_dispatched > 0, "cold engine must still fire injectors");
    assert!(!core.failsafe_tick(0), "cold coolant alone is not a fail-safe fault");
}
