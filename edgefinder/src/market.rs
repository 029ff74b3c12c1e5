//! Bookmaker markets: conversion between decimal prices and probabilities, and the removal of
//! the bookmaker's margin (overround).

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::probs::SliceExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverroundMethod {
    /// Implied probabilities are scaled uniformly so that they sum to the fair booksum.
    Multiplicative,
    /// Implied probabilities are taken as-is. Used when the book is incomplete and its margin
    /// cannot be apportioned.
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overround {
    pub method: OverroundMethod,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub probs: Vec<f64>,
    pub prices: Vec<f64>,
    pub overround: Overround,
}
impl Market {
    /// Fits a market to a set of decimal `prices`, deriving probabilities whose sum equals
    /// `fair_sum` (under [`OverroundMethod::Multiplicative`]).
    pub fn fit(method: OverroundMethod, prices: Vec<f64>, fair_sum: f64) -> Self {
        match method {
            OverroundMethod::Multiplicative => Self::fit_multiplicative(prices, fair_sum),
            OverroundMethod::Raw => Self::fit_raw(prices, fair_sum),
        }
    }

    fn fit_multiplicative(prices: Vec<f64>, fair_sum: f64) -> Self {
        let mut probs: Vec<_> = prices.invert().collect();
        let overround = probs.normalise(fair_sum) / fair_sum;
        Self {
            probs,
            prices,
            overround: Overround {
                method: OverroundMethod::Multiplicative,
                value: overround,
            },
        }
    }

    fn fit_raw(prices: Vec<f64>, fair_sum: f64) -> Self {
        let probs: Vec<_> = prices.invert().collect();
        let overround = probs.sum() / fair_sum;
        Self {
            probs,
            prices,
            overround: Overround {
                method: OverroundMethod::Raw,
                value: overround,
            },
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.probs.len() != self.prices.len() {
            bail!(
                "{} probabilities do not align with {} prices",
                self.probs.len(),
                self.prices.len()
            );
        }
        if let Some(price) = self.prices.iter().find(|&&price| !is_valid_price(price)) {
            bail!("price {price} is not a valid decimal price");
        }
        Ok(())
    }
}

/// A decimal price is valid if it is finite and strictly greater than 1.0, i.e., it returns more
/// than the stake.
#[inline]
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 1.0
}

/// Expected value per unit staked when backing an outcome of probability `prob` at decimal `price`.
#[inline]
pub fn expected_value(prob: f64, price: f64) -> f64 {
    price * prob - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;
    use edgefinder_testing::assert_slice_f64_relative;

    #[test]
    fn fit_multiplicative() {
        {
            let prices = vec![10.0, 5.0, 3.333, 2.5];
            let market = Market::fit(OverroundMethod::Multiplicative, prices, 1.0);
            assert_slice_f64_relative(&[0.1, 0.2, 0.3, 0.4], &market.probs, 0.001);
            assert_float_absolute_eq!(1.0, market.overround.value, 0.001);
        }
        {
            let prices = vec![9.0909, 4.5454, 3.0303, 2.273];
            let market = Market::fit(OverroundMethod::Multiplicative, prices, 1.0);
            assert_slice_f64_relative(&[0.1, 0.2, 0.3, 0.4], &market.probs, 0.001);
            assert_float_absolute_eq!(1.1, market.overround.value, 0.001);
        }
        {
            let prices = vec![1.90, 1.90];
            let market = Market::fit(OverroundMethod::Multiplicative, prices, 1.0);
            assert_slice_f64_relative(&[0.5, 0.5], &market.probs, 1e-9);
            assert_float_absolute_eq!(2.0 / 1.9, market.overround.value, 1e-9);
        }
    }

    #[test]
    fn fit_raw() {
        let prices = vec![2.0, 4.0];
        let market = Market::fit(OverroundMethod::Raw, prices, 1.0);
        assert_slice_f64_relative(&[0.5, 0.25], &market.probs, 1e-12);
        assert_float_absolute_eq!(0.75, market.overround.value);
        assert_eq!(OverroundMethod::Raw, market.overround.method);
    }

    #[test]
    fn validate() {
        let market = Market::fit(OverroundMethod::Multiplicative, vec![2.0, 2.0], 1.0);
        assert!(market.validate().is_ok());

        let market = Market::fit(OverroundMethod::Raw, vec![2.0, 1.0], 1.0);
        assert_eq!(
            "price 1 is not a valid decimal price",
            market.validate().unwrap_err().to_string()
        );
    }

    #[test]
    fn price_validity() {
        assert!(is_valid_price(1.01));
        assert!(!is_valid_price(1.0));
        assert!(!is_valid_price(f64::INFINITY));
        assert!(!is_valid_price(f64::NAN));
    }

    #[test]
    fn expected_value_of_fair_bet_is_zero() {
        assert_float_absolute_eq!(0.0, expected_value(0.5, 2.0));
        assert_float_absolute_eq!(0.2, expected_value(0.6, 2.0));
    }
}
