//! Sensor snapshot (spec §3 "Sensor snapshot", §6 "Sensor provider").
//!
//! Plain numeric `#[repr(C)]` record, the same shape as the segment
//! payload structs in `evo_common::control_unit::shm` — published by the
//! sampling collaborator and read by the planner through the seqlock in
//! `ecu_core::snapshot`.

/// Atomic sensor record, fixed-point where the original signal is
/// naturally ×10 scaled (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct SensorSnapshot {
    /// Manifold absolute pressure [×10 kPa].
    pub map_x10_kpa: u16,
    /// Throttle position [×10 %].
    pub tps_x10_pct: u16,
    /// Coolant temperature [°C], signed for sub-zero cold starts.
    pub clt_c: i16,
    /// Intake air temperature [°C].
    pub iat_c: i16,
    /// Battery voltage [×10 V].
    pub vbat_x10_v: u16,
    /// Narrowband O2 sensor [mV].
    pub o2_mv: u16,
    /// Monotonic capture tick [HW-Time µs].
    pub sampled_at: u32,
}

impl SensorSnapshot {
    /// Whether this snapshot is older than the freshness bound (spec §3:
    /// 100 ms) relative to `now`, using wraparound-safe modular subtraction.
    pub fn is_stale(&self, now: u32, stale_us: u32) -> bool {
        now.wrapping_sub(self.sampled_at) > stale_us
    }

    pub fn map_kpa(&self) -> f32 {
        self.map_x10_kpa as f32 / 10.0
    }

    pub fn tps_pct(&self) -> f32 {
        self.tps_x10_pct as f32 / 10.0
    }

    pub fn vbat_v(&self) -> f32 {
        self.vbat_x10_v as f32 / 10.0
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            map_x10_kpa: 0,
            tps_x10_pct: 0,
            clt_c: 0,
            iat_c: 0,
            vbat_x10_v: 0,
            o2_mv: 0,
            sampled_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_uses_wrapping_subtraction() {
        let snap = SensorSnapshot {
            sampled_at: u32::MAX - 10,
            ..Default::default()
        };
        // now wraps past u32::MAX: elapsed should be small, not huge.
        let now = 5u32;
        assert!(!snap.is_stale(now, 100_000));
    }

    #[test]
    fn staleness_bound_is_exclusive_at_equality() {
        let snap = SensorSnapshot {
            sampled_at: 1_000,
            ..Default::default()
        };
        assert!(!snap.is_stale(1_100, 100));
        assert!(snap.is_stale(1_101, 100));
    }

    #[test]
    fn unit_conversions() {
        let snap = SensorSnapshot {
            map_x10_kpa: 400,
            tps_x10_pct: 25,
            vbat_x10_v: 138,
            ..Default::default()
        };
        assert_eq!(snap.map_kpa(), 40.0);
        assert_eq!(snap.tps_pct(), 2.5);
        assert!((snap.vbat_v() - 13.8).abs() < 1e-6);
    }
}
