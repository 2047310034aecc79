//! Scenario: sync loss at 3000 rpm (spec §8). Once `FullySynced`, a
//! tooth stream that overruns the expected gap window without producing
//! one (the decoder's own "overran... without seeing one" demotion path)
//! must drop straight back to `Searching` and have the very next
//! fail-safe tick latch `SYNC_LOST`.

use ecu_common::config::EcuConfig;

use super::support::{build_core, drive_to_fully_synced, feed_steady_teeth, healthy_warm_snapshot, period_us_for_rpm};

#[test]
fn sync_overrun_demotes_and_latches_sync_lost() {
    let config = EcuConfig::default();
    let period_us = period_us_for_rpm(3000, config.tooth_per_rev);
    let core = build_core(config, healthy_warm_snapshot());

    let mut tick = 0u32;
    drive_to_fully_synced(&core, &mut tick, period_us);
    assert!(core.runtime_state().unwrap().sync_state.is_fully_synced());
    assert!(!core.failsafe_tick(0), "synced and healthy must not be latched yet");

    // One tooth too many without the expected gap: overrun demotion.
    feed_steady_teeth(&core, &mut tick, 1, period_us);

    let state = core.runtime_state().expect("runtime state published");
    assert!(!state.sync_state.is_crank_valid(), "overrun must demote out of any synced state");

    assert!(core.failsafe_tick(0), "sync loss must latch limp mode on the very next tick");
}
