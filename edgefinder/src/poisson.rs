//! Poisson probability mass functions.

use crate::factorial::Factorial;

/// Probability of exactly `k` events under a Poisson distribution with rate `lambda`.
///
/// # Panics
/// If `lambda` is negative or not finite. A zero rate is admitted, placing all mass on `k = 0`.
#[inline]
pub fn univariate(k: u8, lambda: f64, factorial: &impl Factorial) -> f64 {
    assert!(
        lambda >= 0.0 && lambda.is_finite(),
        "Poisson rate must be a non-negative finite number, got {lambda}"
    );
    lambda.powi(k as i32) * f64::exp(-lambda) / factorial.get(k) as f64
}

/// Joint probability of `k_1` and `k_2` events under a bivariate Poisson distribution, expressed as
/// a mixture over the shared component:
///
/// `Σ_{i=0}^{min(k_1, k_2)} P(k_1 − i; λ_1) · P(k_2 − i; λ_2) · P(i; λ_3)`
///
/// where `λ_3` is the covariance (shared) rate. With `λ_3 = 0`, this degenerates to the product
/// of two independent univariate distributions.
#[inline]
pub fn bivariate(
    k_1: u8,
    k_2: u8,
    lambda_1: f64,
    lambda_2: f64,
    lambda_3: f64,
    factorial: &impl Factorial,
) -> f64 {
    (0..=u8::min(k_1, k_2))
        .map(|i| {
            univariate(k_1 - i, lambda_1, factorial)
                * univariate(k_2 - i, lambda_2, factorial)
                * univariate(i, lambda_3, factorial)
        })
        .sum()
}
