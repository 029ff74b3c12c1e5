//! Stake sizing by the Kelly criterion.
//!
//! For a bet at decimal odds `o` with win probability `p`, the growth-optimal fraction of the
//! bankroll is `f* = (b·p − q) / b`, where `b = o − 1` and `q = 1 − p`. In practice a fraction
//! of `f*` is staked, subject to a hard cap.

use std::ops::RangeInclusive;

use anyhow::bail;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    /// Multiplier applied to the full Kelly stake; 0.25 is quarter-Kelly.
    pub fraction: f64,

    /// Upper bound on the staked fraction of the bankroll.
    pub cap: f64,
}
impl KellyConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        const FRACTION_RANGE: RangeInclusive<f64> = 0.0..=1.0;
        if !FRACTION_RANGE.contains(&self.fraction) {
            bail!("Kelly fraction ({}) outside of allowable range {FRACTION_RANGE:?}", self.fraction);
        }
        const CAP_RANGE: RangeInclusive<f64> = 0.0..=1.0;
        if !CAP_RANGE.contains(&self.cap) {
            bail!("Kelly cap ({}) outside of allowable range {CAP_RANGE:?}", self.cap);
        }
        Ok(())
    }

    #[inline]
    pub fn stake(&self, probability: f64, odds: f64) -> f64 {
        kelly_fraction(probability, odds, self.fraction, self.cap)
    }
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            cap: 0.10,
        }
    }
}

/// The unscaled, uncapped Kelly fraction. Negative when the bet has no edge.
#[inline]
pub fn full_kelly(probability: f64, odds: f64) -> f64 {
    let b = odds - 1.0;
    let q = 1.0 - probability;
    (b * probability - q) / b
}

/// Fractional Kelly stake, floored at zero and capped at `cap`. Returns zero for odds that do not
/// exceed 1.0 or a non-positive probability.
pub fn kelly_fraction(probability: f64, odds: f64, fraction: f64, cap: f64) -> f64 {
    if odds <= 1.0 || probability <= 0.0 {
        return 0.0;
    }
    let stake = f64::max(0.0, full_kelly(probability, odds) * fraction);
    f64::min(stake, cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;
    use edgefinder_testing::uniform;
    use tinyrand::StdRand;

    #[test]
    fn quarter_kelly_below_cap() {
        let full = full_kelly(0.55, 2.10);
        assert_float_absolute_eq!(0.1409091, full, 1e-6);
        let stake = kelly_fraction(0.55, 2.10, 0.25, 0.10);
        assert_float_absolute_eq!(0.25 * full, stake, 1e-12);
        assert_float_absolute_eq!(0.0352273, stake, 1e-6);
    }

    #[test]
    fn stake_is_capped() {
        assert_eq!(0.10, kelly_fraction(0.9, 3.0, 1.0, 0.10));
    }

    #[test]
    fn no_edge_yields_zero() {
        assert_eq!(0.0, kelly_fraction(0.4, 2.0, 0.25, 0.10));
        assert_eq!(0.0, kelly_fraction(0.5, 2.0, 0.25, 0.10));
    }

    #[test]
    fn invalid_inputs_yield_zero() {
        assert_eq!(0.0, kelly_fraction(0.6, 1.0, 0.25, 0.10));
        assert_eq!(0.0, kelly_fraction(0.6, 0.5, 0.25, 0.10));
        assert_eq!(0.0, kelly_fraction(0.0, 2.5, 0.25, 0.10));
        assert_eq!(0.0, kelly_fraction(-0.1, 2.5, 0.25, 0.10));
    }

    #[test]
    fn config_stake() {
        let config = KellyConfig::default();
        config.validate().unwrap();
        assert_float_absolute_eq!(kelly_fraction(0.55, 2.10, 0.25, 0.10), config.stake(0.55, 2.10));
    }

    #[test]
    fn config_validation() {
        let config = KellyConfig { fraction: 1.5, cap: 0.1 };
        assert_eq!(
            "Kelly fraction (1.5) outside of allowable range 0.0..=1.0",
            config.validate().unwrap_err().to_string()
        );
        let config = KellyConfig { fraction: 0.25, cap: -0.1 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn stake_bounded_and_monotonic_in_edge() {
        let mut rand = StdRand::default();
        for _ in 0..1_000 {
            let odds = uniform(&mut rand, 1.01..=15.0);
            let fraction = uniform(&mut rand, 0.0..=1.0);
            let cap = uniform(&mut rand, 0.0..=0.5);
            let p_1 = uniform(&mut rand, 0.0..=1.0);
            let p_2 = uniform(&mut rand, 0.0..=1.0);
            let (lower, higher) = if p_1 <= p_2 { (p_1, p_2) } else { (p_2, p_1) };
            let lower_stake = kelly_fraction(lower, odds, fraction, cap);
            let higher_stake = kelly_fraction(higher, odds, fraction, cap);
            assert!((0.0..=cap).contains(&lower_stake), "stake {lower_stake} outside [0, {cap}]");
            assert!((0.0..=cap).contains(&higher_stake), "stake {higher_stake} outside [0, {cap}]");
            assert!(
                higher_stake >= lower_stake,
                "stake not monotonic at odds {odds}: p={lower} → {lower_stake}, p={higher} → {higher_stake}"
            );
        }
    }
}
