//! A 0-100 confidence score for a value bet, combining its edge with auxiliary market signals.

use serde::{Deserialize, Serialize};

use edgefinder::probs::round_to;

const EDGE_WEIGHT: f64 = 0.30;
const CONVERGENCE_WEIGHT: f64 = 0.25;
const VOLUME_WEIGHT: f64 = 0.20;
const STABILITY_WEIGHT: f64 = 0.15;
const INEFFICIENCY_WEIGHT: f64 = 0.10;

/// Weighted sum of the five signals, each nominally in `[0, 1]`, scaled to `[0, 100]` and rounded
/// to two decimal places.
pub fn compute_confidence(edge: f64, convergence: f64, volume: f64, stability: f64, inefficiency: f64) -> f64 {
    let score = edge * EDGE_WEIGHT
        + convergence * CONVERGENCE_WEIGHT
        + volume * VOLUME_WEIGHT
        + stability * STABILITY_WEIGHT
        + inefficiency * INEFFICIENCY_WEIGHT;
    round_to((score * 100.0).clamp(0.0, 100.0), 2)
}

/// The signals other than the edge, which are supplied by the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSignals {
    pub convergence: f64,
    pub volume: f64,
    pub stability: f64,
    pub inefficiency: f64,
}
impl MarketSignals {
    pub fn confidence(&self, edge: f64) -> f64 {
        compute_confidence(edge, self.convergence, self.volume, self.stability, self.inefficiency)
    }
}

impl Default for MarketSignals {
    fn default() -> Self {
        Self {
            convergence: 0.7,
            volume: 0.6,
            stability: 0.65,
            inefficiency: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_score() {
        assert_eq!(47.25, compute_confidence(0.10, 0.7, 0.6, 0.65, 0.5));
        assert_eq!(47.25, MarketSignals::default().confidence(0.10));
        assert_eq!(100.0, compute_confidence(1.0, 1.0, 1.0, 1.0, 1.0));
        assert_eq!(30.0, compute_confidence(1.0, 0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn clamped() {
        assert_eq!(0.0, compute_confidence(-5.0, 0.0, 0.0, 0.0, 0.0));
        assert_eq!(100.0, compute_confidence(2.0, 1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn rounded_to_two_places() {
        assert_eq!(0.33, compute_confidence(0.011111, 0.0, 0.0, 0.0, 0.0));
    }
}
