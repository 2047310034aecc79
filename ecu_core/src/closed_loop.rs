//! Closed-loop fuel correction: PI with clamped anti-windup (spec §4.5).
//!
//! Same backward-Euler integration discipline as
//! `evo_control_unit::control::pid::pid_compute`, but the D-term is
//! dropped (lambda is too noisy per-tooth to differentiate usefully) and
//! anti-windup is a direct clamp on the integral rather than
//! back-calculation — the simpler of the two schemes the teacher
//! supports, chosen because the spec's own formula is stated as a plain
//! clamp rather than a tracking time constant.

use ecu_common::config::EcuConfig;

/// Integral accumulator, persisted across planner ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiState {
    integral: f32,
}

impl PiState {
    pub fn reset(&mut self) {
        self.integral = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}

/// PI gains, read from calibration (`ClosedLoopCfg`).
#[derive(Debug, Clone, Copy)]
pub struct PiGains {
    pub kp: f32,
    pub ki: f32,
    pub integral_min: f32,
    pub integral_max: f32,
}

/// One PI correction cycle (spec §4.5):
/// `err = target − measured`
/// `I ← clamp(I + ki·err·dt, min, max)`
/// `stft = clamp(kp·err + I, min, max)`
///
/// `dt_s` is the elapsed time since the last call, in seconds.
pub fn pi_compute(state: &mut PiState, gains: &PiGains, lambda_target: f32, lambda_measured: f32, dt_s: f32) -> f32 {
    if dt_s <= 0.0 {
        return state.integral.clamp(gains.integral_min, gains.integral_max);
    }

    let err = lambda_target - lambda_measured;

    state.integral = (state.integral + gains.ki * err * dt_s).clamp(gains.integral_min, gains.integral_max);

    (gains.kp * err + state.integral).clamp(gains.integral_min, gains.integral_max)
}

/// Whether a lambda reading is fresh enough to close the loop on (spec
/// §4.5): wideband age under [`ecu_common::consts::LAMBDA_FRESH_MS`], or a
/// narrowband O2 reading present as a fallback.
pub fn lambda_is_valid(wideband: Option<(f32, u32)>, now_tick: u32, narrowband_present: bool, config: &EcuConfig) -> Option<f32> {
    if let Some((value, sampled_at)) = wideband {
        let age_ms = now_tick.wrapping_sub(sampled_at) / 1000;
        if age_ms < ecu_common::consts::LAMBDA_FRESH_MS {
            return Some(value);
        }
    }
    if narrowband_present {
        return wideband.map(|(v, _)| v);
    }
    let _ = config;
    None
}
