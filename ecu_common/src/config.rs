//! TOML configuration schema and validation (spec §6 "Configuration knobs").
//!
//! Loaded once at startup (`ecu_core::config::load_config`). Every field
//! has a documented default and a bounds check in [`EcuConfig::validate`],
//! mirroring `evo_common::control_unit::config::ControlUnitConfig`.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Log level for configuration (kept independent of any particular
/// logging crate's own level type, matching `evo_common::config::LogLevel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

/// Top-level ECU configuration (spec §6).
///
/// Immutable after the decoder reaches `CrankLocked` for the first time —
/// hot-reload of timing-critical knobs mid-run is not supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcuConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default = "default_tooth_per_rev")]
    pub tooth_per_rev: u32,
    #[serde(default = "default_missing_teeth")]
    pub missing_teeth: u32,
    #[serde(default = "default_tdc_offset")]
    pub tdc_offset_deg: f32,
    #[serde(default = "default_cam_window")]
    pub cam_window_deg: f32,
    #[serde(default = "default_sync_loss_ticks")]
    pub sync_loss_ticks: u32,

    #[serde(default = "default_rpm_min")]
    pub rpm_min: u32,
    #[serde(default = "default_rpm_max")]
    pub rpm_max: u32,
    #[serde(default = "default_rpm_fuel_cut")]
    pub rpm_fuel_cut: u32,

    #[serde(default = "default_pw_min")]
    pub pw_min_us: u32,
    #[serde(default = "default_pw_max")]
    pub pw_max_us: u32,
    #[serde(default = "default_req_fuel")]
    pub req_fuel_us: u32,

    #[serde(default = "default_ign_min")]
    pub ign_advance_min_deg_x10: i16,
    #[serde(default = "default_ign_max")]
    pub ign_advance_max_deg_x10: i16,

    #[serde(default = "default_stft_limit")]
    pub stft_limit: f32,
    #[serde(default = "default_ltft_limit")]
    pub ltft_limit: f32,
    #[serde(default = "default_ltft_alpha")]
    pub ltft_alpha: f32,
    #[serde(default = "default_ltft_stable_ms")]
    pub ltft_stable_ms: u32,
    #[serde(default = "default_ltft_apply_threshold")]
    pub ltft_apply_threshold: f32,

    #[serde(default = "default_planner_deadline")]
    pub planner_deadline_us: u32,
    #[serde(default = "default_executor_max_age")]
    pub executor_max_plan_age_us: u32,

    #[serde(default = "default_map_save_interval")]
    pub map_save_interval_ms: u32,

    #[serde(default = "default_limp_rpm")]
    pub limp_rpm_limit: u32,
    #[serde(default = "default_limp_ve")]
    pub limp_ve: u16,
    #[serde(default = "default_limp_timing")]
    pub limp_timing_deg: f32,
    #[serde(default = "default_limp_lambda")]
    pub limp_lambda_target: f32,
    #[serde(default = "default_recovery_hysteresis")]
    pub recovery_hysteresis_ms: u32,
    #[serde(default = "default_limp_min_ms")]
    pub limp_min_ms: u32,

    #[serde(default = "default_wdg_timeout")]
    pub wdg_timeout_ms: u32,

    #[serde(default = "default_clt_overheat")]
    pub clt_overheat_c: i16,
    #[serde(default = "default_vbat_safe_min")]
    pub vbat_safe_min_x10: u16,
    #[serde(default = "default_vbat_safe_max")]
    pub vbat_safe_max_x10: u16,

    #[serde(default = "default_warmup_enrich_max")]
    pub warmup_enrich_max: f32,
    #[serde(default = "default_warmup_temp_min")]
    pub warmup_temp_min_c: i16,
    #[serde(default = "default_warmup_temp_max")]
    pub warmup_temp_max_c: i16,

    #[serde(default = "default_tps_dot_threshold")]
    pub tps_dot_threshold: f32,
    #[serde(default = "default_tps_dot_enrich_max")]
    pub tps_dot_enrich_max: f32,
    #[serde(default = "default_accel_decay_ms")]
    pub accel_decay_ms: u32,
}

fn default_tooth_per_rev() -> u32 {
    TOOTH_PER_REV
}
fn default_missing_teeth() -> u32 {
    MISSING_TEETH
}
fn default_tdc_offset() -> f32 {
    TDC_OFFSET_DEG_DEFAULT
}
fn default_cam_window() -> f32 {
    CAM_WINDOW_DEG_DEFAULT
}
fn default_sync_loss_ticks() -> u32 {
    SYNC_LOSS_TICKS_DEFAULT
}
fn default_rpm_min() -> u32 {
    RPM_MIN_DEFAULT
}
fn default_rpm_max() -> u32 {
    RPM_MAX_DEFAULT
}
fn default_rpm_fuel_cut() -> u32 {
    RPM_FUEL_CUT_DEFAULT
}
fn default_pw_min() -> u32 {
    PW_MIN_US_DEFAULT
}
fn default_pw_max() -> u32 {
    PW_MAX_US_DEFAULT
}
fn default_req_fuel() -> u32 {
    REQ_FUEL_US_DEFAULT
}
fn default_ign_min() -> i16 {
    IGN_ADVANCE_MIN_DEG_X10_DEFAULT
}
fn default_ign_max() -> i16 {
    IGN_ADVANCE_MAX_DEG_X10_DEFAULT
}
fn default_stft_limit() -> f32 {
    STFT_LIMIT_DEFAULT
}
fn default_ltft_limit() -> f32 {
    LTFT_LIMIT_DEFAULT
}
fn default_ltft_alpha() -> f32 {
    LTFT_ALPHA_DEFAULT
}
fn default_ltft_stable_ms() -> u32 {
    LTFT_STABLE_MS_DEFAULT
}
fn default_ltft_apply_threshold() -> f32 {
    LTFT_APPLY_THRESHOLD_DEFAULT
}
fn default_planner_deadline() -> u32 {
    PLANNER_DEADLINE_US_DEFAULT
}
fn default_executor_max_age() -> u32 {
    EXECUTOR_MAX_PLAN_AGE_US_DEFAULT
}
fn default_map_save_interval() -> u32 {
    MAP_SAVE_INTERVAL_MS_DEFAULT
}
fn default_limp_rpm() -> u32 {
    LIMP_RPM_LIMIT_DEFAULT
}
fn default_limp_ve() -> u16 {
    LIMP_VE_DEFAULT
}
fn default_limp_timing() -> f32 {
    LIMP_TIMING_DEG_DEFAULT
}
fn default_limp_lambda() -> f32 {
    LIMP_LAMBDA_TARGET_DEFAULT
}
fn default_recovery_hysteresis() -> u32 {
    RECOVERY_HYSTERESIS_MS_DEFAULT
}
fn default_limp_min_ms() -> u32 {
    LIMP_MIN_MS_DEFAULT
}
fn default_wdg_timeout() -> u32 {
    WDG_TIMEOUT_MS_DEFAULT
}
fn default_clt_overheat() -> i16 {
    CLT_OVERHEAT_C_DEFAULT
}
fn default_vbat_safe_min() -> u16 {
    VBAT_SAFE_MIN_X10_DEFAULT
}
fn default_vbat_safe_max() -> u16 {
    VBAT_SAFE_MAX_X10_DEFAULT
}
fn default_warmup_enrich_max() -> f32 {
    WARMUP_ENRICH_MAX_DEFAULT
}
fn default_warmup_temp_min() -> i16 {
    WARMUP_TEMP_MIN_C_DEFAULT
}
fn default_warmup_temp_max() -> i16 {
    WARMUP_TEMP_MAX_C_DEFAULT
}
fn default_tps_dot_threshold() -> f32 {
    TPS_DOT_THRESHOLD_DEFAULT
}
fn default_tps_dot_enrich_max() -> f32 {
    TPS_DOT_ENRICH_MAX_DEFAULT
}
fn default_accel_decay_ms() -> u32 {
    ACCEL_DECAY_MS_DEFAULT
}

impl Default for EcuConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            tooth_per_rev: default_tooth_per_rev(),
            missing_teeth: default_missing_teeth(),
            tdc_offset_deg: default_tdc_offset(),
            cam_window_deg: default_cam_window(),
            sync_loss_ticks: default_sync_loss_ticks(),
            rpm_min: default_rpm_min(),
            rpm_max: default_rpm_max(),
            rpm_fuel_cut: default_rpm_fuel_cut(),
            pw_min_us: default_pw_min(),
            pw_max_us: default_pw_max(),
            req_fuel_us: default_req_fuel(),
            ign_advance_min_deg_x10: default_ign_min(),
            ign_advance_max_deg_x10: default_ign_max(),
            stft_limit: default_stft_limit(),
            ltft_limit: default_ltft_limit(),
            ltft_alpha: default_ltft_alpha(),
            ltft_stable_ms: default_ltft_stable_ms(),
            ltft_apply_threshold: default_ltft_apply_threshold(),
            planner_deadline_us: default_planner_deadline(),
            executor_max_plan_age_us: default_executor_max_age(),
            map_save_interval_ms: default_map_save_interval(),
            limp_rpm_limit: default_limp_rpm(),
            limp_ve: default_limp_ve(),
            limp_timing_deg: default_limp_timing(),
            limp_lambda_target: default_limp_lambda(),
            recovery_hysteresis_ms: default_recovery_hysteresis(),
            limp_min_ms: default_limp_min_ms(),
            wdg_timeout_ms: default_wdg_timeout(),
            clt_overheat_c: default_clt_overheat(),
            vbat_safe_min_x10: default_vbat_safe_min(),
            vbat_safe_max_x10: default_vbat_safe_max(),
            warmup_enrich_max: default_warmup_enrich_max(),
            warmup_temp_min_c: default_warmup_temp_min(),
            warmup_temp_max_c: default_warmup_temp_max(),
            tps_dot_threshold: default_tps_dot_threshold(),
            tps_dot_enrich_max: default_tps_dot_enrich_max(),
            accel_decay_ms: default_accel_decay_ms(),
        }
    }
}

impl EcuConfig {
    /// Validate parameter bounds. Called once after TOML deserialization.
    pub fn validate(&self) -> Result<(), String> {
        if self.tooth_per_rev < self.missing_teeth + 4 {
            return Err(format!(
                "tooth_per_rev {} too small for missing_teeth {}",
                self.tooth_per_rev, self.missing_teeth
            ));
        }
        if !(0.0..360.0).contains(&self.tdc_offset_deg) {
            return Err(format!(
                "tdc_offset_deg {} out of range [0, 360)",
                self.tdc_offset_deg
            ));
        }
        if self.rpm_min == 0 || self.rpm_min >= self.rpm_fuel_cut {
            return Err(format!(
                "rpm_min {} must be > 0 and < rpm_fuel_cut {}",
                self.rpm_min, self.rpm_fuel_cut
            ));
        }
        if self.rpm_fuel_cut > self.rpm_max {
            return Err(format!(
                "rpm_fuel_cut {} must be <= rpm_max {}",
                self.rpm_fuel_cut, self.rpm_max
            ));
        }
        if self.pw_min_us >= self.pw_max_us {
            return Err(format!(
                "pw_min_us {} must be < pw_max_us {}",
                self.pw_min_us, self.pw_max_us
            ));
        }
        if self.ign_advance_min_deg_x10 >= self.ign_advance_max_deg_x10 {
            return Err(format!(
                "ign_advance_min_deg_x10 {} must be < ign_advance_max_deg_x10 {}",
                self.ign_advance_min_deg_x10, self.ign_advance_max_deg_x10
            ));
        }
        if !(0.0..=1.0).contains(&self.stft_limit) || !(0.0..=1.0).contains(&self.ltft_limit) {
            return Err("stft_limit/ltft_limit must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.ltft_alpha) {
            return Err(format!("ltft_alpha {} out of range [0, 1]", self.ltft_alpha));
        }
        if self.limp_rpm_limit == 0 || self.limp_rpm_limit > self.rpm_fuel_cut {
            return Err(format!(
                "limp_rpm_limit {} must be > 0 and <= rpm_fuel_cut {}",
                self.limp_rpm_limit, self.rpm_fuel_cut
            ));
        }
        if !(0.0..=1.0).contains(&self.limp_lambda_target) {
            return Err(format!(
                "limp_lambda_target {} out of plausible range (0, 1]",
                self.limp_lambda_target
            ));
        }
        if self.vbat_safe_min_x10 >= self.vbat_safe_max_x10 {
            return Err(format!(
                "vbat_safe_min_x10 {} must be < vbat_safe_max_x10 {}",
                self.vbat_safe_min_x10, self.vbat_safe_max_x10
            ));
        }
        if self.warmup_temp_min_c >= self.warmup_temp_max_c {
            return Err(format!(
                "warmup_temp_min_c {} must be < warmup_temp_max_c {}",
                self.warmup_temp_min_c, self.warmup_temp_max_c
            ));
        }
        if self.warmup_enrich_max < 1.0 {
            return Err(format!(
                "warmup_enrich_max {} must be >= 1.0",
                self.warmup_enrich_max
            ));
        }
        if self.tps_dot_enrich_max < 1.0 {
            return Err(format!(
                "tps_dot_enrich_max {} must be >= 1.0",
                self.tps_dot_enrich_max
            ));
        }

        Ok(())
    }

    /// Parse from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        let cfg: Self = toml::from_str(text).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
