//! System-wide constants for the ECU workspace.
//!
//! Single source of truth for all numeric limits. Imported by both crates —
//! no duplication permitted. Defaults mirror spec §6; anything tunable at
//! runtime additionally appears as a field of [`crate::config::EcuConfig`].

/// Teeth on the crank wheel, including the missing pair.
pub const TOOTH_PER_REV: u32 = 60;

/// Consecutive missing teeth forming the sync gap.
pub const MISSING_TEETH: u32 = 2;

/// Number of physically present teeth per revolution.
pub const TOOTH_COUNT: u32 = TOOTH_PER_REV - MISSING_TEETH;

/// Cylinders on the engine.
pub const CYLINDER_COUNT: usize = 4;

/// Injector channels (one per cylinder).
pub const INJECTOR_CHANNELS: usize = CYLINDER_COUNT;

/// Ignition channels (one per cylinder).
pub const IGNITION_CHANNELS: usize = CYLINDER_COUNT;

/// Total actuator channels (injector + ignition).
pub const TOTAL_CHANNELS: usize = INJECTOR_CHANNELS + IGNITION_CHANNELS;

/// Crank angle subtracted before normalizing tooth-index angle to TDC.
pub const TDC_OFFSET_DEG_DEFAULT: f32 = 114.0;

/// Idle speed lower bound used by fail-safe / diagnostics [rpm].
pub const RPM_MIN_DEFAULT: u32 = 300;

/// Redline upper bound [rpm].
pub const RPM_MAX_DEFAULT: u32 = 8000;

/// Fuel-cut threshold [rpm] (§4.8 over-rev fault).
pub const RPM_FUEL_CUT_DEFAULT: u32 = 7500;

/// Minimum pulsewidth clamp [µs].
pub const PW_MIN_US_DEFAULT: u32 = 500;

/// Maximum pulsewidth clamp [µs].
pub const PW_MAX_US_DEFAULT: u32 = 18_000;

/// Nominal fuel mass constant for speed-density calc [µs].
pub const REQ_FUEL_US_DEFAULT: u32 = 7730;

/// Minimum ignition advance [×0.1 deg].
pub const IGN_ADVANCE_MIN_DEG_X10_DEFAULT: i16 = -50;

/// Maximum ignition advance [×0.1 deg].
pub const IGN_ADVANCE_MAX_DEG_X10_DEFAULT: i16 = 450;

/// STFT symmetric clamp.
pub const STFT_LIMIT_DEFAULT: f32 = 0.25;

/// LTFT symmetric clamp.
pub const LTFT_LIMIT_DEFAULT: f32 = 0.20;

/// LTFT EMA coefficient.
pub const LTFT_ALPHA_DEFAULT: f32 = 0.01;

/// Minimum stable dwell before LTFT is allowed to learn [ms].
pub const LTFT_STABLE_MS_DEFAULT: u32 = 500;

/// `|ltft|` threshold above which the VE cell is folded in and LTFT resets.
pub const LTFT_APPLY_THRESHOLD_DEFAULT: f32 = 0.03;

/// Planner soft deadline [µs] (§4.6 step 7).
pub const PLANNER_DEADLINE_US_DEFAULT: u32 = 700;

/// Maximum plan age the executor will still dispatch [µs].
pub const EXECUTOR_MAX_PLAN_AGE_US_DEFAULT: u32 = 3_000;

/// Calibration map autosave interval [ms].
pub const MAP_SAVE_INTERVAL_MS_DEFAULT: u32 = 5_000;

/// Limp-mode rpm cap.
pub const LIMP_RPM_LIMIT_DEFAULT: u32 = 3_000;

/// Limp-mode forced VE [×0.1 %].
pub const LIMP_VE_DEFAULT: u16 = 800;

/// Limp-mode forced ignition advance [deg].
pub const LIMP_TIMING_DEG_DEFAULT: f32 = 10.0;

/// Limp-mode λ target (rich).
pub const LIMP_LAMBDA_TARGET_DEFAULT: f32 = 0.85;

/// Minimum time a fault condition must be absent before limp may clear [ms].
pub const RECOVERY_HYSTERESIS_MS_DEFAULT: u32 = 5_000;

/// Minimum time limp must remain latched regardless of fault clearing [ms].
pub const LIMP_MIN_MS_DEFAULT: u32 = 2_000;

/// Consecutive bad ticks before the decoder declares `SyncLost`.
pub const SYNC_LOSS_TICKS_DEFAULT: u32 = 3;

/// Tolerance window for cam-edge signature matching [crank deg].
/// Open Question in spec §9 — resolved in DESIGN.md.
pub const CAM_WINDOW_DEG_DEFAULT: f32 = 10.0;

/// Sensor snapshot staleness bound [ms].
pub const SENSOR_STALE_MS: u32 = 100;

/// Wideband λ freshness bound [ms].
pub const LAMBDA_FRESH_MS: u32 = 200;

/// Tick-to-tick rpm/load deadband LTFT requires to consider the engine
/// "stable" for learning purposes (spec §3 "Fuel trims").
pub const LTFT_STABILITY_DEADBAND: u32 = 50;

/// Injector arm duration bounds [µs].
pub const INJECTOR_MIN_ON_TIME_US: u32 = 500;
pub const INJECTOR_MAX_ON_TIME_US: u32 = 20_000;

/// Ignition arm duration bounds [µs].
pub const IGNITION_MIN_ON_TIME_US: u32 = 1_500;
pub const IGNITION_MAX_ON_TIME_US: u32 = 6_000;

/// Map table grid dimension (rpm bins × load bins).
pub const MAP_GRID: usize = 16;

/// Watchdog feed timeout (§4.8).
pub const WDG_TIMEOUT_MS_DEFAULT: u32 = 50;

/// Coolant temperature above which the fail-safe declares an overheat
/// fault [°C] (§4.8).
pub const CLT_OVERHEAT_C_DEFAULT: i16 = 118;

/// Narrower-than-sensor-range battery voltage window the fail-safe
/// treats as a fault, ×0.1 V (§4.8).
pub const VBAT_SAFE_MIN_X10_DEFAULT: u16 = 90;
pub const VBAT_SAFE_MAX_X10_DEFAULT: u16 = 160;

/// Warmup enrichment multiplier applied at/below `WARMUP_TEMP_MIN_C`
/// (§4.4), decaying linearly to 1.00 by `WARMUP_TEMP_MAX_C`.
pub const WARMUP_ENRICH_MAX_DEFAULT: f32 = 1.60;
pub const WARMUP_TEMP_MIN_C_DEFAULT: i16 = -20;
pub const WARMUP_TEMP_MAX_C_DEFAULT: i16 = 80;

/// MAP slew rate [kPa per tick] above which acceleration enrichment
/// triggers (§4.4).
pub const TPS_DOT_THRESHOLD_DEFAULT: f32 = 5.0;

/// Acceleration enrichment multiplier at the instant of trigger, decaying
/// linearly back to 1.00 over `ACCEL_DECAY_MS_DEFAULT`.
pub const TPS_DOT_ENRICH_MAX_DEFAULT: f32 = 1.30;
pub const ACCEL_DECAY_MS_DEFAULT: u32 = 200;
