//! Utilities for working with probabilities and samples.

pub trait SliceExt {
    fn sum(&self) -> f64;
    fn normalise(&mut self, target: f64) -> f64;
    fn scale(&mut self, factor: f64);
    fn invert(&self) -> impl Iterator<Item = f64> + '_;
    fn mean(&self) -> f64;
    fn sample_stdev(&self) -> f64;
}
impl SliceExt for [f64] {
    fn sum(&self) -> f64 {
        self.iter().sum()
    }

    /// Scales the elements so that they sum to `target`, returning the original sum.
    fn normalise(&mut self, target: f64) -> f64 {
        let sum = self.sum();
        self.scale(target / sum);
        sum
    }

    fn scale(&mut self, factor: f64) {
        for element in self {
            *element *= factor;
        }
    }

    fn invert(&self) -> impl Iterator<Item = f64> + '_ {
        self.iter().map(|element| 1.0 / element)
    }

    /// Arithmetic mean; `NaN` for an empty slice.
    fn mean(&self) -> f64 {
        self.sum() / self.len() as f64
    }

    /// Standard deviation with Bessel's correction; zero when fewer than two samples.
    fn sample_stdev(&self) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq = self.iter().map(|element| (element - mean).powi(2)).sum::<f64>();
        (sum_sq / (self.len() - 1) as f64).sqrt()
    }
}

/// Rounds `value` to the given number of decimal `places`.
pub fn round_to(value: f64, places: u8) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
