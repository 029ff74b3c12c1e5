//! Blending of model and market probabilities, and detection of value against quoted prices.

use std::ops::RangeInclusive;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use edgefinder::kelly::KellyConfig;
use edgefinder::market::{expected_value, is_valid_price, Market, OverroundMethod};

use crate::domain::{MarketOdds, MarketType, OutcomeProbs, OutcomeType};

/// Prices above this are considered illiquid and never bet.
pub const MAX_RELIABLE_ODDS: f64 = 15.0;
pub const DEFAULT_BLEND_WEIGHT: f64 = 0.5;
pub const DEFAULT_THRESHOLD: f64 = 0.03;
pub const DEFAULT_EDGE_CAP: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Weight of the model probability in the blend; the market takes the remainder.
    pub blend_weight: f64,

    /// Minimum edge for a bet to qualify. The comparison is strict.
    pub threshold: f64,

    /// Ceiling applied to the edge before thresholding.
    pub edge_cap: Option<f64>,

    pub max_odds: f64,

    pub kelly: KellyConfig,
}
impl EdgeConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        const WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=1.0;
        if !WEIGHT_RANGE.contains(&self.blend_weight) {
            bail!("blend weight ({}) outside of allowable range {WEIGHT_RANGE:?}", self.blend_weight);
        }
        if !self.threshold.is_finite() {
            bail!("edge threshold ({}) must be finite", self.threshold);
        }
        if let Some(edge_cap) = self.edge_cap {
            if !edge_cap.is_finite() || edge_cap <= 0.0 {
                bail!("edge cap ({edge_cap}) must be a positive finite number");
            }
        }
        if !is_valid_price(self.max_odds) {
            bail!("max odds ({}) must be a valid decimal price", self.max_odds);
        }
        self.kelly.validate()
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blend_weight: DEFAULT_BLEND_WEIGHT,
            threshold: DEFAULT_THRESHOLD,
            edge_cap: Some(DEFAULT_EDGE_CAP),
            max_odds: MAX_RELIABLE_ODDS,
            kelly: KellyConfig::default(),
        }
    }
}

/// A priced outcome with its model, market and blended probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedOutcome {
    pub outcome: OutcomeType,
    pub odds: f64,
    pub model_prob: f64,
    pub market_prob: f64,
    pub blended_prob: f64,
}
impl BlendedOutcome {
    /// Expected return per unit staked at the quoted price, uncapped.
    pub fn edge(&self) -> f64 {
        expected_value(self.blended_prob, self.odds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBet {
    pub outcome: OutcomeType,
    pub probability: f64,
    pub odds: f64,
    pub edge: f64,

    /// Whether the edge was reduced to the configured cap.
    pub capped: bool,

    /// Fraction of the bankroll to stake.
    pub kelly: f64,
}

/// Margin-free probabilities implied by `odds`, by market. A market whose every outcome is
/// validly priced has its overround removed; otherwise the raw inverse prices are taken, since
/// the margin of an incomplete book cannot be apportioned. Invalid prices are ignored.
pub fn implied_probabilities(odds: &MarketOdds) -> OutcomeProbs {
    let mut implied = OutcomeProbs::default();
    for market_type in MarketType::iter() {
        let priced: Vec<_> = market_type
            .outcomes()
            .iter()
            .filter_map(|outcome| {
                odds.get(outcome)
                    .filter(|&&price| is_valid_price(price))
                    .map(|&price| (*outcome, price))
            })
            .collect();
        if priced.is_empty() {
            continue;
        }
        let method = if priced.len() == market_type.outcomes().len() {
            OverroundMethod::Multiplicative
        } else {
            OverroundMethod::Raw
        };
        let market = Market::fit(method, priced.iter().map(|(_, price)| *price).collect(), 1.0);
        for ((outcome, _), prob) in priced.into_iter().zip(market.probs) {
            implied.insert(outcome, prob);
        }
    }
    implied
}

/// Blends model and market probabilities for every outcome that has both a model probability and
/// a valid price. Outcomes are returned in canonical order.
pub fn blend(model_probs: &OutcomeProbs, odds: &MarketOdds, blend_weight: f64) -> Vec<BlendedOutcome> {
    let implied = implied_probabilities(odds);
    OutcomeType::iter()
        .filter_map(|outcome| {
            let model_prob = *model_probs.get(&outcome)?;
            let market_prob = *implied.get(&outcome)?;
            let odds = odds[&outcome];
            Some(BlendedOutcome {
                outcome,
                odds,
                model_prob,
                market_prob,
                blended_prob: blend_weight * model_prob + (1.0 - blend_weight) * market_prob,
            })
        })
        .collect()
}

/// Applies the optional cap to an edge, returning the capped edge and whether the cap bound.
#[inline]
pub fn cap_edge(edge: f64, edge_cap: Option<f64>) -> (f64, bool) {
    match edge_cap {
        Some(edge_cap) if edge > edge_cap => (edge_cap, true),
        _ => (edge, false),
    }
}

/// Outcomes whose blended edge, after capping, strictly exceeds the threshold. Outcomes priced
/// above the configured maximum are never returned.
pub fn detect_value_bets(model_probs: &OutcomeProbs, odds: &MarketOdds, config: &EdgeConfig) -> Vec<ValueBet> {
    blend(model_probs, odds, config.blend_weight)
        .into_iter()
        .filter(|blended| blended.odds <= config.max_odds)
        .filter_map(|blended| {
            let (edge, capped) = cap_edge(blended.edge(), config.edge_cap);
            if edge > config.threshold {
                Some(ValueBet {
                    outcome: blended.outcome,
                    probability: blended.blended_prob,
                    odds: blended.odds,
                    edge,
                    capped,
                    kelly: config.kelly.stake(blended.blended_prob, blended.odds),
                })
            } else {
                None
            }
        })
        .collect()
}
