//! Betting signals for upcoming fixtures.
//!
//! A fixture is priced from team ratings when the [`RatingBook`] holds both sides, falling back to
//! goal expectations implied by the head-to-head prices otherwise. Value bets found against the
//! quoted prices are issued as [`Signal`]s carrying a confidence score.

use std::fmt::Write;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, trace};

use edgefinder::factorial::MAX_N;

use crate::confidence::MarketSignals;
use crate::domain::{MarketOdds, MarketType, OutcomeProbs, OutcomeType};
use crate::rating::{expected_goals, from_market_odds, MatchStrengths, RatingBook, DEFAULT_HFA};
use crate::scoregrid::{ModelOutput, ScorelineModel, DEFAULT_MAX_GOALS};
use crate::value::{detect_value_bets, EdgeConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub season: u16,
    pub kickoff: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Model used when both teams are rated.
    pub rated_model: ScorelineModel,

    /// Model used with market-implied goal expectations.
    pub fallback_model: ScorelineModel,

    pub max_goals: u8,
    pub hfa: f64,
    pub edge: EdgeConfig,
    pub market_signals: MarketSignals,
}
impl SignalConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.rated_model.validate()?;
        self.fallback_model.validate()?;
        if self.max_goals == 0 {
            anyhow::bail!("max goals must be positive");
        }
        if self.max_goals > MAX_N {
            anyhow::bail!("max goals ({}) cannot exceed {MAX_N}", self.max_goals);
        }
        if !self.hfa.is_finite() || self.hfa <= 0.0 {
            anyhow::bail!("home-field advantage ({}) must be a positive finite number", self.hfa);
        }
        self.edge.validate()
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rated_model: ScorelineModel::dixon_coles(),
            fallback_model: ScorelineModel::bivariate_poisson(),
            max_goals: DEFAULT_MAX_GOALS,
            hfa: DEFAULT_HFA,
            edge: EdgeConfig::default(),
            market_signals: MarketSignals::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RatingSource {
    TeamRatings,
    MarketImplied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub outcome: OutcomeType,
    pub market: MarketType,
    pub probability: f64,
    pub odds: f64,
    pub edge: f64,
    pub capped: bool,
    pub kelly: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct SignalSet {
    pub source: RatingSource,
    pub model: ModelOutput,
    pub signals: Vec<Signal>,
}

pub fn generate(fixture: &Fixture, odds: &MarketOdds, book: &RatingBook, config: &SignalConfig) -> SignalSet {
    let home_rating = book.get(&fixture.home_team, &fixture.league, fixture.season);
    let away_rating = book.get(&fixture.away_team, &fixture.league, fixture.season);

    let (source, model) = match (home_rating, away_rating) {
        (Some(home_rating), Some(away_rating)) => {
            let averages = book
                .league_averages(&fixture.league, fixture.season)
                .copied()
                .unwrap_or_default();
            let strengths = MatchStrengths::from_ratings(home_rating, away_rating);
            let goals = expected_goals(&strengths, &averages, config.hfa);
            (
                RatingSource::TeamRatings,
                config.rated_model.run(goals.home, goals.away, config.max_goals),
            )
        }
        _ => {
            trace!(
                "no ratings for {} v {}, pricing from the market",
                fixture.home_team,
                fixture.away_team
            );
            let goals = from_market_odds(odds);
            (
                RatingSource::MarketImplied,
                config.fallback_model.run(goals.home, goals.away, config.max_goals),
            )
        }
    };

    // market-implied expectations only say anything about the market they came from
    let model_probs: OutcomeProbs = match source {
        RatingSource::TeamRatings => model.probabilities(),
        RatingSource::MarketImplied => MarketType::H2h
            .outcomes()
            .iter()
            .map(|outcome| (*outcome, model.probability(outcome)))
            .collect(),
    };

    let signals: Vec<_> = detect_value_bets(&model_probs, odds, &config.edge)
        .into_iter()
        .map(|bet| Signal {
            outcome: bet.outcome,
            market: bet.outcome.market(),
            probability: bet.probability,
            odds: bet.odds,
            edge: bet.edge,
            capped: bet.capped,
            kelly: bet.kelly,
            confidence: config.market_signals.confidence(bet.edge),
        })
        .collect();
    debug!(
        "{} v {}: {} signal(s) from {source}",
        fixture.home_team,
        fixture.away_team,
        signals.len()
    );
    SignalSet { source, model, signals }
}

/// A one-paragraph summary of the fixture, its model probabilities and any signals.
pub fn describe(fixture: &Fixture, odds: &MarketOdds, set: &SignalSet, threshold: f64) -> String {
    let kickoff = fixture
        .kickoff
        .map(|kickoff| kickoff.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "TBD".to_string());
    let mut summary = format!(
        "{} v {} ({}), kickoff {kickoff}. Model: {:.1}% home, {:.1}% draw, {:.1}% away.",
        fixture.home_team,
        fixture.away_team,
        fixture.league,
        set.model.home_win * 100.0,
        set.model.draw * 100.0,
        set.model.away_win * 100.0
    );

    let mut priced: Vec<_> = odds.iter().collect();
    priced.sort_by_key(|(outcome, _)| **outcome);
    if !priced.is_empty() {
        summary.push_str(" Market:");
        for (index, (outcome, price)) in priced.iter().enumerate() {
            let separator = if index == 0 { " " } else { ", " };
            let _ = write!(summary, "{separator}{} {price}", outcome.display_label());
        }
        summary.push('.');
    }

    if set.signals.is_empty() {
        let _ = write!(summary, " No value above {:.1}% edge.", threshold * 100.0);
    } else {
        summary.push_str(" Value:");
        for (index, signal) in set.signals.iter().enumerate() {
            let separator = if index == 0 { " " } else { "; " };
            let _ = write!(
                summary,
                "{separator}{} edge {:.1}%, Kelly {:.1}%",
                signal.outcome.display_label(),
                signal.edge * 100.0,
                signal.kelly * 100.0
            );
        }
        summary.push('.');
        let confidence = set
            .signals
            .iter()
            .map(|signal| signal.confidence)
            .fold(0.0, f64::max);
        let _ = write!(summary, " Confidence: {confidence:.1}/100.");
    }
    summary
}
