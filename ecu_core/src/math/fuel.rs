//! Pulsewidth computation (spec §4.4).

use ecu_common::config::EcuConfig;

use super::lerp1d;

/// Fixed injector dead-time curve, battery voltage [×0.1 V] → dead-time
/// [µs]. Lower rail voltage means a slower injector opening time, so
/// dead-time grows as vbat drops. Interpolated rather than a constant,
/// per the pulsewidth formula in §4.4.
const DEAD_TIME_CURVE: [(u16, u32); 6] = [
    (80, 2200),
    (100, 1500),
    (120, 1100),
    (140, 900),
    (160, 800),
    (180, 750),
];

/// Interpolated injector dead-time for the given battery voltage.
pub fn dead_time_us(vbat_x10_v: u16) -> u32 {
    let v = vbat_x10_v as f32;
    if v <= DEAD_TIME_CURVE[0].0 as f32 {
        return DEAD_TIME_CURVE[0].1;
    }
    let last = DEAD_TIME_CURVE[DEAD_TIME_CURVE.len() - 1];
    if v >= last.0 as f32 {
        return last.1;
    }
    for window in DEAD_TIME_CURVE.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if v <= x1 as f32 {
            return lerp1d(v, x0 as f32, x1 as f32, y0 as f32, y1 as f32) as u32;
        }
    }
    last.1
}

/// Warmup enrichment multiplier for the given coolant temperature.
pub fn warmup_factor(clt_c: i16, config: &EcuConfig) -> f32 {
    lerp1d(
        clt_c as f32,
        config.warmup_temp_min_c as f32,
        config.warmup_temp_max_c as f32,
        config.warmup_enrich_max,
        1.0,
    )
}

/// Running acceleration-enrichment decay tracker (spec §4.4): triggers on
/// a MAP slew-rate spike, then decays linearly back to 1.00 over
/// `accel_decay_ms`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccelEnrichment {
    /// Remaining decay time [ms], 0 when inactive.
    remaining_ms: u32,
    total_ms: u32,
}

impl AccelEnrichment {
    /// Feed one tick's MAP delta. `dt_ms` is the elapsed time since the
    /// last tick, used both to detect the slew rate and to advance decay.
    pub fn update(&mut self, map_delta_kpa: f32, dt_ms: u32, config: &EcuConfig) -> f32 {
        if dt_ms > 0 && (map_delta_kpa / dt_ms as f32).abs() > config.tps_dot_threshold {
            self.remaining_ms = config.accel_decay_ms;
            self.total_ms = config.accel_decay_ms;
        } else if self.remaining_ms > 0 {
            self.remaining_ms = self.remaining_ms.saturating_sub(dt_ms);
        }

        if self.remaining_ms == 0 || self.total_ms == 0 {
            1.0
        } else {
            lerp1d(
                self.remaining_ms as f32,
                0.0,
                self.total_ms as f32,
                1.0,
                config.tps_dot_enrich_max,
            )
        }
    }
}

/// Every input the pulsewidth formula needs, already resolved by the
/// planner (table lookups, trims, sensor reads).
#[derive(Debug, Clone, Copy)]
pub struct PulsewidthInputs {
    pub ve_pct_x10: u16,
    pub map_x10_kpa: u16,
    pub warmup_factor: f32,
    pub accel_factor: f32,
    pub lambda_correction: f32,
    pub vbat_x10_v: u16,
    pub req_fuel_us: u32,
}

/// Injector pulsewidth, clamped to `[pw_min_us, pw_max_us]` (spec §4.4).
pub fn compute_pulsewidth_us(inputs: &PulsewidthInputs, config: &EcuConfig) -> u32 {
    let ve = inputs.ve_pct_x10 as f32 / 1000.0; // x10 % -> fraction
    let map = inputs.map_x10_kpa as f32 / 1000.0; // x10 kPa -> fraction of 100 kPa
    let base = inputs.req_fuel_us as f32
        * ve
        * map
        * inputs.warmup_factor
        * inputs.accel_factor
        * (1.0 + inputs.lambda_correction);

    let pw = base + dead_time_us(inputs.vbat_x10_v) as f32;
    let pw = pw.max(0.0) as u32;
    pw.clamp(config.pw_min_us, config.pw_max_us)
}
