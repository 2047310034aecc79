//! Scenario: over-rev fail-safe latch (spec §8). Once the decoder's rpm
//! estimate reaches `rpm_max`, the very next fail-safe tick must latch
//! limp mode and hand back limp calibration overrides, distinct from the
//! planner's own softer `rpm_fuel_cut` skip.

use ecu_common::config::EcuConfig;

use super::support::{build_core, drive_to_fully_synced, healthy_warm_snapshot, period_us_for_rpm};

#[test]
fn over_rev_latches_limp_mode() {
    let config = EcuConfig::default();
    assert!(
        config.rpm_max > config.rpm_fuel_cut,
        "over-rev threshold must sit above the planner's fuel-cut threshold"
    );

    // Comfortably past rpm_max, not just rpm_fuel_cut.
    let target_rpm = config.rpm_max + 500;
    let period_us = period_us_for_rpm(target_rpm, config.tooth_per_rev);
    let rpm_max = config.rpm_max;
    let limp_rpm_limit = config.limp_rpm_limit;
    let core = build_core(config, healthy_warm_snapshot());

    let mut tick = 0u32;
    drive_to_fully_synced(&core, &mut tick, period_us);

    let state = core.runtime_state().expect("runtime state published");
    assert!(state.rpm >= rpm_max, "rpm {} should have reached rpm_max", state.rpm);

    assert!(core.failsafe_tick(0), "over-rev must latch limp mode");
    let overrides = core.limp_overrides().expect("limp overrides while latched");
    assert_eq!(overrides.rpm_cap, limp_rpm_limit);
}
