//! Scenario: warm idle (spec §8). Healthy, fully-warmed sensors at a
//! steady ~800 rpm should reach `FullySynced`, dispatch injection plans
//! every tooth and never trip a single fail-safe fault.

use ecu_common::config::EcuConfig;

use super::support::{build_core, drive_to_fully_synced, healthy_warm_snapshot, period_us_for_rpm};

#[test]
fn warm_idle_runs_clean_with_no_faults() {
    let config = EcuConfig::default();
    let period_us = period_us_for_rpm(800, config.tooth_per_rev);
    let core = build_core(config, healthy_warm_snapshot());

    let mut tick = 0u32;
    drive_to_fully_synced(&core, &mut tick, period_us);

    let state = core.runtime_state().expect("runtime state published");
    assert!(state.sync_state.is_fully_synced());
    assert!(state.rpm_in_band(200, 2000), "rpm {} not near idle", state.rpm);
    assert!(state.injection.plans_dispatched > 0);
    assert_eq!(state.injection.plans_rejected_stale, 0);

    assert!(!core.failsafe_tick(0), "warm idle must not latch limp mode");
    assert!(core.limp_overrides().is_none());
}
