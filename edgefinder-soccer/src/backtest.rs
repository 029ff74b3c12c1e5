//! Historical replay of the strategy with hyperparameter selection.
//!
//! Matches are replayed in date order. Each match is priced from the [`tracker::Trackers`] as
//! they stood before its date, and only then is its result folded in, so no match is ever
//! priced with knowledge of its own outcome or of later ones. A grid of hyperparameters is
//! searched on a training split and the winner is evaluated on a held-out test split.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info, trace};

use edgefinder::comb::Combinator;
use edgefinder::factorial::MAX_N;
use edgefinder::kelly::KellyConfig;
use edgefinder::market::is_valid_price;

use crate::backtest::metrics::{
    calibration, edge_distribution, equity_curve, roi_by_group, CalibrationBin, EdgeBucket, EquityPoint, GroupRoi,
    Staking, StrategyMetrics,
};
use crate::backtest::tracker::Trackers;
use crate::clv::{closing_line_value, ClvStats};
use crate::domain::{MarketOdds, MarketType, OutcomeType};
use crate::feed::{league_code, sort_chronologically, MatchRecord};
use crate::rating::{expected_goals, DEFAULT_HFA, DEFAULT_SHRINKAGE_K};
use crate::scoregrid::{ScorelineModel, DEFAULT_MAX_GOALS};
use crate::value::{blend, cap_edge, DEFAULT_BLEND_WEIGHT, MAX_RELIABLE_ODDS};

pub mod metrics;
pub mod tracker;


/// Fewest bets a trial must place to be eligible for selection.
pub const MIN_QUALIFYING_BETS: usize = 30;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(#[from] pub anyhow::Error);

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no historical matches")]
    NoMatches,

    #[error("no parameter combination yielded at least {min_bets} bets")]
    NoQualifyingTrial { min_bets: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchGrid {
    pub shrinkage_k: Vec<f64>,
    pub blend_weight: Vec<f64>,
    pub hfa: Vec<f64>,
    pub edge_threshold: Vec<f64>,
}
impl SearchGrid {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, values) in [
            ("shrinkage k", &self.shrinkage_k),
            ("blend weight", &self.blend_weight),
            ("hfa", &self.hfa),
            ("edge threshold", &self.edge_threshold),
        ] {
            if values.is_empty() {
                bail!("no {name} values to search");
            }
            if let Some(value) = values.iter().find(|value| !value.is_finite()) {
                bail!("{name} value {value} is not finite");
            }
        }
        const WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=1.0;
        if let Some(weight) = self.blend_weight.iter().find(|weight| !WEIGHT_RANGE.contains(weight)) {
            bail!("blend weight ({weight}) outside of allowable range {WEIGHT_RANGE:?}");
        }
        if let Some(k) = self.shrinkage_k.iter().find(|&&k| k < 0.0) {
            bail!("shrinkage k ({k}) cannot be negative");
        }
        if let Some(threshold) = self.edge_threshold.iter().find(|&&threshold| threshold < 0.0) {
            bail!("edge threshold ({threshold}) cannot be negative");
        }
        Ok(())
    }

    pub fn trials(&self) -> usize {
        self.shrinkage_k.len() * self.blend_weight.len() * self.hfa.len() * self.edge_threshold.len()
    }
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            shrinkage_k: vec![30.0, 50.0, 70.0],
            blend_weight: vec![0.45, 0.50, 0.55],
            hfa: vec![1.05, 1.08, 1.11],
            edge_threshold: vec![0.05, 0.07, 0.10],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitPolicy {
    pub train_seasons: Vec<u16>,
    pub test_seasons: Vec<u16>,

    /// Share of matches used for training when the seasons do not cover both groups.
    pub train_ratio: f64,
}
impl SplitPolicy {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            bail!("train ratio ({}) must lie strictly between 0 and 1", self.train_ratio);
        }
        Ok(())
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            train_seasons: vec![2021, 2022],
            test_seasons: vec![2023],
            train_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Seasons to replay, by starting year; empty for all.
    pub seasons: Vec<u16>,

    /// Leagues to replay, by name or feed code; empty for all.
    pub leagues: Vec<String>,

    pub shrinkage_k: f64,
    pub blend_weight: f64,
    pub hfa: f64,
    pub edge_threshold: f64,
    pub edge_cap: Option<f64>,
    pub max_odds: f64,

    /// Matches a team must have played at the venue before its fixtures are priced.
    pub min_matches: u32,

    pub bankroll: f64,
    pub flat_stake_pct: f64,
    pub kelly: KellyConfig,
    pub markets: Vec<MarketType>,
    pub model: ScorelineModel,
    pub max_goals: u8,
    pub grid: SearchGrid,
    pub split: SplitPolicy,
    pub min_bets: usize,
    pub calibration_bins: usize,
    pub edge_bins: usize,
}
impl BacktestConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        const WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=1.0;
        if !WEIGHT_RANGE.contains(&self.blend_weight) {
            bail!("blend weight ({}) outside of allowable range {WEIGHT_RANGE:?}", self.blend_weight);
        }
        if !self.shrinkage_k.is_finite() || self.shrinkage_k < 0.0 {
            bail!("shrinkage k ({}) must be a non-negative finite number", self.shrinkage_k);
        }
        if !self.hfa.is_finite() || self.hfa <= 0.0 {
            bail!("home-field advantage ({}) must be a positive finite number", self.hfa);
        }
        if !self.edge_threshold.is_finite() {
            bail!("edge threshold ({}) must be finite", self.edge_threshold);
        }
        if let Some(edge_cap) = self.edge_cap {
            if !edge_cap.is_finite() || edge_cap <= 0.0 {
                bail!("edge cap ({edge_cap}) must be a positive finite number");
            }
        }
        if !is_valid_price(self.max_odds) {
            bail!("max odds ({}) must be a valid decimal price", self.max_odds);
        }
        if !self.bankroll.is_finite() || self.bankroll <= 0.0 {
            bail!("bankroll ({}) must be a positive finite number", self.bankroll);
        }
        const STAKE_RANGE: RangeInclusive<f64> = 0.0..=1.0;
        if !STAKE_RANGE.contains(&self.flat_stake_pct) {
            bail!("flat stake ({}) outside of allowable range {STAKE_RANGE:?}", self.flat_stake_pct);
        }
        if self.markets.is_empty() {
            bail!("no markets selected");
        }
        if self.max_goals == 0 {
            bail!("max goals must be positive");
        }
        if self.max_goals > MAX_N {
            bail!("max goals ({}) cannot exceed {MAX_N}", self.max_goals);
        }
        if self.calibration_bins == 0 || self.edge_bins == 0 {
            bail!("bin counts must be positive");
        }
        self.kelly.validate()?;
        self.model.validate()?;
        self.grid.validate()?;
        self.split.validate()
    }

    pub fn params(&self) -> TrialParams {
        TrialParams {
            shrinkage_k: self.shrinkage_k,
            blend_weight: self.blend_weight,
            hfa: self.hfa,
            edge_threshold: self.edge_threshold,
        }
    }

    /// A copy of this config with the hyperparameters replaced.
    pub fn with_params(&self, params: &TrialParams) -> Self {
        Self {
            shrinkage_k: params.shrinkage_k,
            blend_weight: params.blend_weight,
            hfa: params.hfa,
            edge_threshold: params.edge_threshold,
            ..self.clone()
        }
    }

    fn selects(&self, record: &MatchRecord) -> bool {
        (self.seasons.is_empty() || self.seasons.contains(&record.season()))
            && (self.leagues.is_empty()
                || self
                    .leagues
                    .iter()
                    .any(|league| league == &record.league || league_code(league) == record.league))
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            seasons: vec![2021, 2022, 2023],
            leagues: vec!["EPL".into()],
            shrinkage_k: DEFAULT_SHRINKAGE_K,
            blend_weight: DEFAULT_BLEND_WEIGHT,
            hfa: DEFAULT_HFA,
            edge_threshold: 0.05,
            edge_cap: None,
            max_odds: MAX_RELIABLE_ODDS,
            min_matches: 5,
            bankroll: 1_000.0,
            flat_stake_pct: 0.01,
            kelly: KellyConfig {
                fraction: 0.25,
                cap: 0.15,
            },
            markets: vec![MarketType::Totals],
            model: ScorelineModel::bivariate_poisson(),
            max_goals: DEFAULT_MAX_GOALS,
            grid: SearchGrid::default(),
            split: SplitPolicy::default(),
            min_bets: MIN_QUALIFYING_BETS,
            calibration_bins: 10,
            edge_bins: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialParams {
    pub shrinkage_k: f64,
    pub blend_weight: f64,
    pub hfa: f64,
    pub edge_threshold: f64,
}

/// A simulated bet and how it settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub date: NaiveDate,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub market: MarketType,
    pub outcome: OutcomeType,

    /// Blended probability the bet was sized on.
    pub probability: f64,
    pub odds: f64,
    pub edge: f64,
    pub won: bool,

    /// Closing-line value against the reference closing price, where one exists.
    pub clv: Option<f64>,
}

/// A blended probability alongside whether the outcome occurred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub probability: f64,
    pub hit: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Simulation {
    /// Bets in settlement order.
    pub bets: Vec<BetRecord>,

    /// Predictions for every priced outcome of each active market, including those too long to
    /// bet.
    pub predictions: BTreeMap<MarketType, Vec<Prediction>>,

    /// Matches for which a price was produced.
    pub priced: usize,
}

/// Replays `matches` under the config's hyperparameters. Matches are taken in date order; those
/// sharing a date are all priced before any of their results is recorded.
pub fn simulate(matches: &[MatchRecord], config: &BacktestConfig) -> Simulation {
    let mut chronological: Vec<_> = matches.iter().collect();
    chronological.sort_by_key(|record| record.date);

    let mut trackers = Trackers::default();
    let mut simulation = Simulation {
        predictions: config.markets.iter().map(|market| (*market, vec![])).collect(),
        ..Simulation::default()
    };
    let mut start = 0;
    while start < chronological.len() {
        let date = chronological[start].date;
        let end = start
            + chronological[start..]
                .iter()
                .take_while(|record| record.date == date)
                .count();
        let day = &chronological[start..end];
        for record in day {
            simulate_match(record, &trackers, config, &mut simulation);
        }
        for record in day {
            trackers.update(record);
        }
        start = end;
    }
    simulation
}

fn simulate_match(record: &MatchRecord, trackers: &Trackers, config: &BacktestConfig, simulation: &mut Simulation) {
    let Some((strengths, averages)) = trackers.strengths(record, config.min_matches, config.shrinkage_k) else {
        trace!(
            "insufficient history for {} v {} on {}",
            record.home_team,
            record.away_team,
            record.date
        );
        return;
    };
    simulation.priced += 1;
    let goals = expected_goals(&strengths, &averages, config.hfa);
    let model_probs = config.model.run(goals.home, goals.away, config.max_goals).probabilities();

    for market in &config.markets {
        let market_odds: MarketOdds = market
            .outcomes()
            .iter()
            .filter_map(|outcome| {
                record
                    .odds
                    .get(outcome)
                    .filter(|&&price| is_valid_price(price))
                    .map(|&price| (*outcome, price))
            })
            .collect();
        if market_odds.len() != market.outcomes().len() {
            continue;
        }

        for blended in blend(&model_probs, &market_odds, config.blend_weight) {
            let won = blended.outcome.won(&record.score);
            if let Some(predictions) = simulation.predictions.get_mut(market) {
                predictions.push(Prediction {
                    probability: blended.blended_prob,
                    hit: won,
                });
            }
            if blended.odds > config.max_odds {
                continue;
            }
            let (edge, _) = cap_edge(blended.edge(), config.edge_cap);
            if edge > config.edge_threshold {
                simulation.bets.push(BetRecord {
                    date: record.date,
                    league: record.league.clone(),
                    home_team: record.home_team.clone(),
                    away_team: record.away_team.clone(),
                    market: *market,
                    outcome: blended.outcome,
                    probability: blended.blended_prob,
                    odds: blended.odds,
                    edge,
                    won,
                    clv: record
                        .closing
                        .get(&blended.outcome)
                        .map(|&closing| closing_line_value(blended.odds, closing)),
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub params: TrialParams,
    pub metrics: StrategyMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: Trial,

    /// Every trial, in grid order.
    pub trials: Vec<Trial>,
    pub qualifying: usize,
}

/// Evaluates every combination of the search grid on `train`, selecting the one with the highest
/// fractional-Kelly ROI among those placing at least `min_bets` bets. The first of equally good
/// trials in grid order wins.
///
/// Each combination of shrinkage, blend weight and home advantage is simulated once with a zero
/// edge threshold; the bets for each candidate threshold are then a filter of that ledger.
pub fn search(train: &[MatchRecord], config: &BacktestConfig) -> Result<SearchOutcome, BacktestError> {
    let grid = &config.grid;
    let cardinalities = [grid.hfa.len(), grid.blend_weight.len(), grid.shrinkage_k.len()];
    let bases: Vec<_> = Combinator::new(&cardinalities)
        .into_iter()
        .map(|ordinals| TrialParams {
            shrinkage_k: grid.shrinkage_k[ordinals[2]],
            blend_weight: grid.blend_weight[ordinals[1]],
            hfa: grid.hfa[ordinals[0]],
            edge_threshold: 0.0,
        })
        .collect();

    let trials: Vec<Trial> = bases
        .par_iter()
        .map(|base| {
            let base_config = config.with_params(base);
            let simulation = simulate(train, &base_config);
            grid.edge_threshold
                .iter()
                .map(|&edge_threshold| {
                    let params = TrialParams {
                        edge_threshold,
                        ..base.clone()
                    };
                    let bets: Vec<_> = simulation
                        .bets
                        .iter()
                        .filter(|bet| bet.edge > edge_threshold)
                        .cloned()
                        .collect();
                    let (_, metrics) = equity_curve(&bets, Staking::FractionalKelly, &base_config);
                    Trial { params, metrics }
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    let mut best: Option<&Trial> = None;
    let mut qualifying = 0;
    for trial in &trials {
        debug!(
            "trial {:?}: {} bets, ROI {}%",
            trial.params, trial.metrics.bets, trial.metrics.roi
        );
        if trial.metrics.bets < config.min_bets {
            continue;
        }
        qualifying += 1;
        if best.map_or(true, |best| trial.metrics.roi > best.metrics.roi) {
            best = Some(trial);
        }
    }
    let best = best
        .cloned()
        .ok_or(BacktestError::NoQualifyingTrial {
            min_bets: config.min_bets,
        })?;
    info!(
        "selected {:?} with training ROI {}% over {} bets ({qualifying} of {} trials qualified)",
        best.params,
        best.metrics.roi,
        best.metrics.bets,
        trials.len()
    );
    Ok(SearchOutcome {
        best,
        trials,
        qualifying,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    Seasons,
    Chronological,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDescription {
    pub method: SplitMethod,
    pub train_seasons: Vec<u16>,
    pub test_seasons: Vec<u16>,
    pub train_matches: usize,
    pub test_matches: usize,
}

/// Splits chronologically ordered matches into training and test sets: by season where the
/// replayed seasons cover both the policy's training and test seasons, otherwise by position.
pub fn split(matches: &[MatchRecord], config: &BacktestConfig) -> (Vec<MatchRecord>, Vec<MatchRecord>, SplitDescription) {
    let replayed = |season: &&u16| config.seasons.is_empty() || config.seasons.contains(season);
    let train_seasons: Vec<u16> = config.split.train_seasons.iter().filter(replayed).copied().collect();
    let test_seasons: Vec<u16> = config.split.test_seasons.iter().filter(replayed).copied().collect();

    let in_seasons = |seasons: &[u16]| -> Vec<MatchRecord> {
        matches
            .iter()
            .filter(|record| seasons.contains(&record.season()))
            .cloned()
            .collect()
    };
    let (train, test) = (in_seasons(&train_seasons), in_seasons(&test_seasons));
    if !train.is_empty() && !test.is_empty() {
        let description = SplitDescription {
            method: SplitMethod::Seasons,
            train_seasons,
            test_seasons,
            train_matches: train.len(),
            test_matches: test.len(),
        };
        return (train, test, description);
    }

    let boundary = (matches.len() as f64 * config.split.train_ratio) as usize;
    let (train, test) = matches.split_at(boundary);
    let description = SplitDescription {
        method: SplitMethod::Chronological,
        train_seasons,
        test_seasons,
        train_matches: train.len(),
        test_matches: test.len(),
    };
    (train.to_vec(), test.to_vec(), description)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub matches: usize,

    /// Fractional-Kelly performance on the training split.
    pub train: StrategyMetrics,

    /// Fractional-Kelly performance on the test split.
    pub test: StrategyMetrics,

    /// Mean closing-line value of test bets with a closing reference, in percent.
    pub avg_clv: f64,
    pub clv: ClvStats,
    pub best_params: TrialParams,
    pub split: SplitDescription,
    pub trials: usize,
    pub qualifying_trials: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub summary: BacktestSummary,
    pub strategies: BTreeMap<Staking, StrategyMetrics>,
    pub equity_curves: BTreeMap<Staking, Vec<EquityPoint>>,
    pub calibration: BTreeMap<MarketType, Vec<CalibrationBin>>,
    pub edge_distribution: Vec<EdgeBucket>,
    pub roi_by_league: Vec<GroupRoi>,
    pub roi_by_market: Vec<GroupRoi>,

    /// Every trial of the search, in grid order.
    pub trials: Vec<Trial>,
    pub bets: usize,
    pub generated_at: DateTime<Utc>,
    pub market_labels: BTreeMap<OutcomeType, String>,

    /// Test bets in settlement order.
    #[serde(skip)]
    pub ledger: Vec<BetRecord>,
}

/// Backtests the strategy over `matches`: selects hyperparameters on the training split, then
/// reports on the test split under each staking strategy.
pub fn run(config: &BacktestConfig, matches: Vec<MatchRecord>) -> Result<BacktestReport, BacktestError> {
    config.validate().map_err(ValidationError)?;

    let mut matches: Vec<_> = matches.into_iter().filter(|record| config.selects(record)).collect();
    if matches.is_empty() {
        return Err(BacktestError::NoMatches);
    }
    sort_chronologically(&mut matches);

    let (train, test, split_description) = split(&matches, config);
    info!("split {split_description:?}");
    let outcome = search(&train, config)?;
    let optimized = config.with_params(&outcome.best.params);

    let train_simulation = simulate(&train, &optimized);
    let test_simulation = simulate(&test, &optimized);
    info!(
        "priced {} training and {} test matches, placing {} and {} bets",
        train_simulation.priced,
        test_simulation.priced,
        train_simulation.bets.len(),
        test_simulation.bets.len()
    );
    let (_, train_metrics) = equity_curve(&train_simulation.bets, Staking::FractionalKelly, &optimized);

    let mut strategies = BTreeMap::new();
    let mut equity_curves = BTreeMap::new();
    for staking in Staking::iter() {
        let (equity, metrics) = equity_curve(&test_simulation.bets, staking, &optimized);
        strategies.insert(staking, metrics);
        equity_curves.insert(staking, equity);
    }

    let calibration = test_simulation
        .predictions
        .iter()
        .map(|(market, predictions)| (*market, calibration(predictions, config.calibration_bins)))
        .collect();

    let test_bets = test_simulation.bets;
    let clv_values: Vec<_> = test_bets.iter().filter_map(|bet| bet.clv).collect();
    let clv = ClvStats::from_values(&clv_values);

    let summary = BacktestSummary {
        matches: matches.len(),
        train: train_metrics,
        test: strategies.get(&Staking::FractionalKelly).cloned().unwrap_or_default(),
        avg_clv: clv.avg_clv,
        clv,
        best_params: outcome.best.params,
        split: split_description,
        trials: outcome.trials.len(),
        qualifying_trials: outcome.qualifying,
    };
    Ok(BacktestReport {
        summary,
        strategies,
        equity_curves,
        calibration,
        edge_distribution: edge_distribution(&test_bets, config.edge_bins),
        roi_by_league: roi_by_group(&test_bets, |bet| bet.league.clone()),
        roi_by_market: roi_by_group(&test_bets, |bet| bet.market.to_string()),
        trials: outcome.trials,
        bets: test_bets.len(),
        generated_at: Utc::now(),
        market_labels: OutcomeType::iter()
            .map(|outcome| (outcome, outcome.display_label().to_string()))
            .collect(),
        ledger: test_bets,
    })
}
