mod support;

mod calibration_migration;
mod cold_start_enrichment;
mod over_rev_latch;
mod sync_loss;
mod tip_in_acceleration;
mod warm_idle;
