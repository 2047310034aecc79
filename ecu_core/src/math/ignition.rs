//! Ignition advance computation (spec §4.4, §4.8).

use ecu_common::config::EcuConfig;

/// Knock retard accumulator (spec §4.8): saturating, 0.1° units, never
/// goes negative.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnockRetard {
    /// Accumulated retard, ×0.1 deg.
    deg_x10: u16,
}

impl KnockRetard {
    pub fn accumulate(&mut self, add_deg_x10: u16) {
        self.deg_x10 = self.deg_x10.saturating_add(add_deg_x10);
    }

    /// Relieve accumulated retard (knock-free running), saturating at zero.
    pub fn relieve(&mut self, remove_deg_x10: u16) {
        self.deg_x10 = self.deg_x10.saturating_sub(remove_deg_x10);
    }

    pub fn deg_x10(&self) -> u16 {
        self.deg_x10
    }

    pub fn reset(&mut self) {
        self.deg_x10 = 0;
    }
}

/// Final ignition advance: `base_from_table - knock_retard`, clamped to
/// the configured advance window (spec §4.4).
pub fn compute_advance_deg_x10(base_deg_x10: i16, knock: &KnockRetard, config: &EcuConfig) -> i16 {
    let retarded = base_deg_x10 as i32 - knock.deg_x10() as i32;
    retarded.clamp(
        config.ign_advance_min_deg_x10 as i32,
        config.ign_advance_max_deg_x10 as i32,
    ) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EcuConfig {
        EcuConfig::default()
    }

    #[test]
    fn knock_retard_never_goes_negative() {
        let mut k = KnockRetard::default();
        k.relieve(50);
        assert_eq!(k.deg_x10(), 0);
    }

    #[test]
    fn knock_retard_saturates_instead_of_overflowing() {
        let mut k = KnockRetard::default();
        k.accumulate(u16::MAX);
        k.accumulate(100);
        assert_eq!(k.deg_x10(), u16::MAX);
    }

    #[test]
    fn advance_is_clamped_to_configured_window() {
        let c = cfg();
        let mut knock = KnockRetard::default();
        assert_eq!(
            compute_advance_deg_x10(i16::MAX, &knock, &c),
            c.ign_advance_max_deg_x10
        );
        knock.accumulate(10_000);
        assert_eq!(
            compute_advance_deg_x10(0, &knock, &c),
            c.ign_advance_min_deg_x10
        );
    }

    #[test]
    fn advance_subtracts_retard_within_window() {
        let c = cfg();
        let mut knock = KnockRetard::default();
        knock.accumulate(20); // 2.0 deg
        assert_eq!(compute_advance_deg_x10(200, &knock, &c), 180);
    }
}
