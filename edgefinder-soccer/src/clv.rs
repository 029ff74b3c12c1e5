//! Closing-line value: how the price a bet was taken at compares with the closing price.

use serde::{Deserialize, Serialize};

use edgefinder::probs::{round_to, SliceExt};

/// Relative difference between the `closing` and `taken` prices. Zero if the taken price is
/// non-positive.
#[inline]
pub fn closing_line_value(taken: f64, closing: f64) -> f64 {
    if taken > 0.0 {
        (closing - taken) / taken
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClvStats {
    pub count: usize,

    /// Mean closing-line value, in percent.
    pub avg_clv: f64,

    /// Share of bets with a positive closing-line value, in percent.
    pub positive_rate: f64,
}
impl ClvStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let positive = values.iter().filter(|&&value| value > 0.0).count();
        Self {
            count: values.len(),
            avg_clv: round_to(values.mean() * 100.0, 2),
            positive_rate: round_to(positive as f64 / values.len() as f64 * 100.0, 2),
        }
    }
}
