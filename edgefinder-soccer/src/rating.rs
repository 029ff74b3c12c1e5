//! Team strength ratings and their conversion into expected goals.
//!
//! A team's attack and defence are rated separately at home and away, as average goals (or xG)
//! scored and conceded per match. Raw averages are shrunk toward the league average in proportion
//! to the number of matches observed, so that a handful of results cannot produce an extreme
//! rating. Two adapters turn ratings into an [`ExpectedGoals`] pair: [`expected_goals`] from team
//! strengths, and [`from_market_odds`] from the goal shares implied by head-to-head prices.

use std::ops::RangeInclusive;

use anyhow::bail;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use edgefinder::market::{is_valid_price, Market, OverroundMethod};

use crate::domain::{MarketOdds, OutcomeType};

pub const EXPECTED_GOALS_RANGE: RangeInclusive<f64> = 0.2..=5.0;
pub const DEFAULT_HOME_GOALS: f64 = 1.4;
pub const DEFAULT_AWAY_GOALS: f64 = 1.1;
pub const DEFAULT_HFA: f64 = 1.07;
pub const DEFAULT_SHRINKAGE_K: f64 = 50.0;
pub const DEFAULT_DECAY_ALPHA: f64 = 0.01;
pub const FORM_WINDOW: usize = 5;
pub const NEUTRAL_FORM: f64 = 0.5;

/// Total goals assumed by the market-implied adapter.
const MARKET_TOTAL_GOALS: f64 = 2.6;

/// Maximum proportional swing of a rate due to form, reached at either end of the form range.
const FORM_SWING: f64 = 0.10;

/// A side 'wins' on xG only when it out-creates the other by more than this margin.
const XG_DRAW_MARGIN: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}
impl ExpectedGoals {
    /// Expected goals with each rate clamped to [`EXPECTED_GOALS_RANGE`].
    pub fn clamped(home: f64, away: f64) -> Self {
        Self {
            home: clamp_rate(home),
            away: clamp_rate(away),
        }
    }
}

fn clamp_rate(rate: f64) -> f64 {
    rate.clamp(*EXPECTED_GOALS_RANGE.start(), *EXPECTED_GOALS_RANGE.end())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueAverages {
    /// Mean goals scored by the home side.
    pub home_goals: f64,

    /// Mean goals scored by the away side.
    pub away_goals: f64,
}
impl LeagueAverages {
    /// Averages over a set of (home goals, away goals) results, or the defaults if there are none.
    pub fn from_history(results: &[(f64, f64)]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let count = results.len() as f64;
        let (home_total, away_total) = results
            .iter()
            .fold((0.0, 0.0), |(home, away), result| (home + result.0, away + result.1));
        Self {
            home_goals: home_total / count,
            away_goals: away_total / count,
        }
    }

    /// Mean goals per side across home and away.
    pub fn overall(&self) -> f64 {
        (self.home_goals + self.away_goals) / 2.0
    }

    /// Substitutes defaults for any non-positive average.
    fn sanitised(&self) -> Self {
        Self {
            home_goals: if self.home_goals > 0.0 { self.home_goals } else { DEFAULT_HOME_GOALS },
            away_goals: if self.away_goals > 0.0 { self.away_goals } else { DEFAULT_AWAY_GOALS },
        }
    }
}

impl Default for LeagueAverages {
    fn default() -> Self {
        Self {
            home_goals: DEFAULT_HOME_GOALS,
            away_goals: DEFAULT_AWAY_GOALS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Pseudo-count of league-average matches blended into every rating.
    pub shrinkage_k: f64,

    /// Exponential decay rate per match of recency weighting.
    pub decay_alpha: f64,
}
impl RatingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.shrinkage_k.is_finite() || self.shrinkage_k < 0.0 {
            bail!("shrinkage k ({}) must be a non-negative finite number", self.shrinkage_k);
        }
        if !self.decay_alpha.is_finite() || self.decay_alpha < 0.0 {
            bail!("decay alpha ({}) must be a non-negative finite number", self.decay_alpha);
        }
        Ok(())
    }
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            shrinkage_k: DEFAULT_SHRINKAGE_K,
            decay_alpha: DEFAULT_DECAY_ALPHA,
        }
    }
}

/// Shrinks a raw average observed over `n` matches toward `league_avg`, treating the league
/// average as `k` additional observations.
#[inline]
pub fn shrink(raw_avg: f64, league_avg: f64, n: u32, k: f64) -> f64 {
    let n = n as f64;
    if n + k == 0.0 {
        return league_avg;
    }
    (n * raw_avg + k * league_avg) / (n + k)
}

/// Mean of `values` under weights `e^(-alpha·i)`, where `i = 0` is the most recent value.
/// Zero for an empty slice.
pub fn decay_weighted_avg(values: &[f64], alpha: f64) -> f64 {
    let (weighted_sum, total_weight) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(weighted_sum, total_weight), (index, value)| {
            let weight = f64::exp(-alpha * index as f64);
            (weighted_sum + value * weight, total_weight + weight)
        });
    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

/// Points ratio earned over (scored, conceded) xG pairs, most recent first. Only the most recent
/// [`FORM_WINDOW`] pairs are counted.
pub fn xg_form(pairs: &[(f64, f64)]) -> f64 {
    let window = &pairs[..pairs.len().min(FORM_WINDOW)];
    if window.is_empty() {
        return NEUTRAL_FORM;
    }
    let points: u32 = window
        .iter()
        .map(|&(scored, conceded)| {
            if scored > conceded + XG_DRAW_MARGIN {
                3
            } else if conceded > scored + XG_DRAW_MARGIN {
                0
            } else {
                1
            }
        })
        .sum();
    points as f64 / (3 * window.len()) as f64
}

/// Multiplier applied to a rate for the given form in `[0, 1]`.
#[inline]
pub fn form_factor(form: f64) -> f64 {
    1.0 + FORM_SWING * (form - NEUTRAL_FORM) / NEUTRAL_FORM
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub team: String,
    pub league: String,
    pub season: u16,
    pub attack_home: f64,
    pub attack_away: f64,
    pub defence_home: f64,
    pub defence_away: f64,
    pub matches_home: u32,
    pub matches_away: u32,
    pub form_home: f64,
    pub form_away: f64,
}
impl TeamRating {
    /// Rates a team from its (scored, conceded) pairs at home and away, each ordered most recent
    /// first. A venue without matches takes the league average.
    pub fn from_history(
        team: &str,
        league: &str,
        season: u16,
        home_pairs: &[(f64, f64)],
        away_pairs: &[(f64, f64)],
        averages: &LeagueAverages,
        config: &RatingConfig,
    ) -> Self {
        let raw = |pairs: &[(f64, f64)], pick: fn(&(f64, f64)) -> f64, fallback: f64| {
            if pairs.is_empty() {
                fallback
            } else {
                let values: Vec<_> = pairs.iter().map(pick).collect();
                decay_weighted_avg(&values, config.decay_alpha)
            }
        };
        let scored = |pair: &(f64, f64)| pair.0;
        let conceded = |pair: &(f64, f64)| pair.1;
        let (matches_home, matches_away) = (home_pairs.len() as u32, away_pairs.len() as u32);
        let k = config.shrinkage_k;

        Self {
            team: team.to_string(),
            league: league.to_string(),
            season,
            attack_home: shrink(raw(home_pairs, scored, averages.home_goals), averages.home_goals, matches_home, k),
            defence_home: shrink(raw(home_pairs, conceded, averages.away_goals), averages.away_goals, matches_home, k),
            attack_away: shrink(raw(away_pairs, scored, averages.away_goals), averages.away_goals, matches_away, k),
            defence_away: shrink(raw(away_pairs, conceded, averages.home_goals), averages.home_goals, matches_away, k),
            matches_home,
            matches_away,
            form_home: xg_form(home_pairs),
            form_away: xg_form(away_pairs),
        }
    }
}

/// Strengths of the two sides of a fixture, each in goals per match for the venue played.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchStrengths {
    pub home_attack: f64,
    pub home_defence: f64,
    pub away_attack: f64,
    pub away_defence: f64,
    pub home_form: f64,
    pub away_form: f64,
}
impl MatchStrengths {
    pub fn from_ratings(home: &TeamRating, away: &TeamRating) -> Self {
        Self {
            home_attack: home.attack_home,
            home_defence: home.defence_home,
            away_attack: away.attack_away,
            away_defence: away.defence_away,
            home_form: home.form_home,
            away_form: away.form_away,
        }
    }
}

/// Expected goals from team strengths. Attack and defence are expressed as ratios to the league
/// average for the venue, scaled by the mean goals per side. Home advantage applies to the home
/// rate alone; form adjusts each rate independently.
pub fn expected_goals(strengths: &MatchStrengths, averages: &LeagueAverages, hfa: f64) -> ExpectedGoals {
    let averages = averages.sanitised();
    let base = averages.overall();

    let home_attack_ratio = strengths.home_attack / averages.home_goals;
    let away_defence_ratio = strengths.away_defence / averages.home_goals;
    let away_attack_ratio = strengths.away_attack / averages.away_goals;
    let home_defence_ratio = strengths.home_defence / averages.away_goals;

    let home = home_attack_ratio * away_defence_ratio * base * hfa * form_factor(strengths.home_form);
    let away = away_attack_ratio * home_defence_ratio * base * form_factor(strengths.away_form);
    ExpectedGoals::clamped(home, away)
}

/// Expected goals from head-to-head prices alone, apportioning a fixed goal total by the home
/// side's share: its win probability plus half the draw probability. Missing prices take the
/// defaults of 0.45 for the home win and 0.25 for the draw.
pub fn from_market_odds(odds: &MarketOdds) -> ExpectedGoals {
    let priced: Vec<_> = [OutcomeType::Home, OutcomeType::Draw, OutcomeType::Away]
        .into_iter()
        .filter_map(|outcome| {
            odds.get(&outcome)
                .filter(|&&price| is_valid_price(price))
                .map(|&price| (outcome, price))
        })
        .collect();
    let market = Market::fit(
        OverroundMethod::Multiplicative,
        priced.iter().map(|(_, price)| *price).collect(),
        1.0,
    );
    let implied = |outcome: OutcomeType, default: f64| {
        priced
            .iter()
            .position(|(priced_outcome, _)| *priced_outcome == outcome)
            .map(|index| market.probs[index])
            .unwrap_or(default)
    };
    let home_share = implied(OutcomeType::Home, 0.45) + 0.5 * implied(OutcomeType::Draw, 0.25);
    ExpectedGoals::clamped(MARKET_TOTAL_GOALS * home_share, MARKET_TOTAL_GOALS * (1.0 - home_share))
}

/// A historical result used to build ratings: goals or xG for each side.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalResult {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: f64,
    pub away_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RatingKey {
    team: String,
    league: String,
    season: u16,
}

/// In-memory store of team ratings and league averages, keyed by team, league and season.
#[derive(Debug, Default)]
pub struct RatingBook {
    ratings: FxHashMap<RatingKey, TeamRating>,
    averages: FxHashMap<(String, u16), LeagueAverages>,
}
impl RatingBook {
    /// Inserts the rating, replacing any existing one for the same team, league and season.
    /// Returns the replaced rating.
    pub fn upsert(&mut self, rating: TeamRating) -> Option<TeamRating> {
        let key = RatingKey {
            team: rating.team.clone(),
            league: rating.league.clone(),
            season: rating.season,
        };
        self.ratings.insert(key, rating)
    }

    pub fn get(&self, team: &str, league: &str, season: u16) -> Option<&TeamRating> {
        self.ratings.get(&RatingKey {
            team: team.to_string(),
            league: league.to_string(),
            season,
        })
    }

    pub fn set_league_averages(&mut self, league: &str, season: u16, averages: LeagueAverages) {
        self.averages.insert((league.to_string(), season), averages);
    }

    pub fn league_averages(&self, league: &str, season: u16) -> Option<&LeagueAverages> {
        self.averages.get(&(league.to_string(), season))
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Recomputes the league averages and the rating of every team appearing in `results`,
    /// returning the number of teams rated.
    pub fn refresh_league(
        &mut self,
        league: &str,
        season: u16,
        results: &[HistoricalResult],
        config: &RatingConfig,
    ) -> usize {
        let mut recent_first: Vec<_> = results.iter().collect();
        recent_first.sort_by(|a, b| b.date.cmp(&a.date));

        let averages = LeagueAverages::from_history(
            &recent_first
                .iter()
                .map(|result| (result.home_score, result.away_score))
                .collect::<Vec<_>>(),
        );

        let mut home_pairs: FxHashMap<&str, Vec<(f64, f64)>> = FxHashMap::default();
        let mut away_pairs: FxHashMap<&str, Vec<(f64, f64)>> = FxHashMap::default();
        for result in &recent_first {
            home_pairs
                .entry(&result.home_team)
                .or_default()
                .push((result.home_score, result.away_score));
            away_pairs
                .entry(&result.away_team)
                .or_default()
                .push((result.away_score, result.home_score));
        }

        let mut teams: Vec<&str> = home_pairs.keys().chain(away_pairs.keys()).copied().collect();
        teams.sort_unstable();
        teams.dedup();

        for &team in &teams {
            let rating = TeamRating::from_history(
                team,
                league,
                season,
                home_pairs.get(team).map(Vec::as_slice).unwrap_or_default(),
                away_pairs.get(team).map(Vec::as_slice).unwrap_or_default(),
                &averages,
                config,
            );
            debug!("rated {team}: {rating:?}");
            self.upsert(rating);
        }
        self.set_league_averages(league, season, averages);
        info!("rated {} teams in {league} {season} from {} results", teams.len(), results.len());
        teams.len()
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    #[test]
    fn shrinkage() {
        assert_float_absolute_eq!(1.4, shrink(2.0, 1.4, 0, 50.0));
        assert_float_absolute_eq!((10.0 * 2.0 + 50.0 * 1.4) / 60.0, shrink(2.0, 1.4, 10, 50.0));
        assert_float_absolute_eq!(2.0, shrink(2.0, 1.4, 10, 0.0));
        assert_float_absolute_eq!(1.4, shrink(2.0, 1.4, 0, 0.0));
    }

    #[test]
    fn decay_weighting() {
        assert_eq!(0.0, decay_weighted_avg(&[], DEFAULT_DECAY_ALPHA));
        assert_float_absolute_eq!(2.0, decay_weighted_avg(&[2.0, 2.0, 2.0], DEFAULT_DECAY_ALPHA));
        assert_float_absolute_eq!(1.5, decay_weighted_avg(&[1.0, 2.0], 0.0));

        let weighted = decay_weighted_avg(&[3.0, 1.0], 0.5);
        let w = f64::exp(-0.5);
        assert_float_absolute_eq!((3.0 + w) / (1.0 + w), weighted);
        assert!(weighted > 2.0, "recent values should dominate");
    }

    #[test]
    fn form_from_xg() {
        assert_eq!(NEUTRAL_FORM, xg_form(&[]));
        assert_float_absolute_eq!(1.0, xg_form(&[(2.0, 0.5), (1.5, 1.0)]));
        assert_float_absolute_eq!(1.0 / 3.0, xg_form(&[(1.2, 1.0), (1.0, 1.2)]));
        assert_float_absolute_eq!(0.0, xg_form(&[(0.5, 2.0)]));

        // only the five most recent matches count
        let pairs = [(2.0, 0.0), (2.0, 0.0), (2.0, 0.0), (2.0, 0.0), (2.0, 0.0), (0.0, 2.0)];
        assert_float_absolute_eq!(1.0, xg_form(&pairs));
    }

    #[test]
    fn form_factor_bounds() {
        assert_float_absolute_eq!(1.0, form_factor(NEUTRAL_FORM));
        assert_float_absolute_eq!(1.1, form_factor(1.0));
        assert_float_absolute_eq!(0.9, form_factor(0.0));
    }

    #[test]
    fn league_averages_from_history() {
        assert_eq!(LeagueAverages::default(), LeagueAverages::from_history(&[]));
        let averages = LeagueAverages::from_history(&[(2.0, 1.0), (1.0, 1.0), (0.0, 1.0)]);
        assert_float_absolute_eq!(1.0, averages.home_goals);
        assert_float_absolute_eq!(1.0, averages.away_goals);
        assert_float_absolute_eq!(1.25, LeagueAverages::default().overall());
    }

    #[test]
    fn average_team_yields_league_rates() {
        let averages = LeagueAverages::default();
        let strengths = MatchStrengths {
            home_attack: 1.4,
            home_defence: 1.1,
            away_attack: 1.1,
            away_defence: 1.4,
            home_form: NEUTRAL_FORM,
            away_form: NEUTRAL_FORM,
        };
        let goals = expected_goals(&strengths, &averages, 1.0);
        assert_float_absolute_eq!(1.25, goals.home);
        assert_float_absolute_eq!(1.25, goals.away);

        let goals = expected_goals(&strengths, &averages, DEFAULT_HFA);
        assert_float_absolute_eq!(1.25 * DEFAULT_HFA, goals.home);
        assert_float_absolute_eq!(1.25, goals.away);
    }

    #[test]
    fn strong_home_side_in_form() {
        let averages = LeagueAverages::default();
        let strengths = MatchStrengths {
            home_attack: 2.1,
            home_defence: 0.88,
            away_attack: 1.1,
            away_defence: 1.4,
            home_form: 1.0,
            away_form: 0.0,
        };
        let goals = expected_goals(&strengths, &averages, 1.1);
        assert_float_absolute_eq!(1.5 * 1.0 * 1.25 * 1.1 * 1.1, goals.home, 1e-9);
        assert_float_absolute_eq!(1.0 * 0.8 * 1.25 * 0.9, goals.away, 1e-9);
    }

    #[test]
    fn expected_goals_clamped() {
        let averages = LeagueAverages::default();
        let strengths = MatchStrengths {
            home_attack: 6.0,
            home_defence: 0.01,
            away_attack: 0.01,
            away_defence: 6.0,
            home_form: 1.0,
            away_form: 0.0,
        };
        let goals = expected_goals(&strengths, &averages, DEFAULT_HFA);
        assert_eq!(5.0, goals.home);
        assert_eq!(0.2, goals.away);
    }

    #[test]
    fn non_positive_league_averages_fall_back_to_defaults() {
        let strengths = MatchStrengths {
            home_attack: 1.4,
            home_defence: 1.1,
            away_attack: 1.1,
            away_defence: 1.4,
            home_form: NEUTRAL_FORM,
            away_form: NEUTRAL_FORM,
        };
        let averages = LeagueAverages {
            home_goals: 0.0,
            away_goals: -1.0,
        };
        assert_eq!(
            expected_goals(&strengths, &LeagueAverages::default(), 1.0),
            expected_goals(&strengths, &averages, 1.0)
        );
    }

    #[test]
    fn market_implied_even_book() {
        let odds = MarketOdds::from_iter([
            (OutcomeType::Home, 3.0),
            (OutcomeType::Draw, 3.0),
            (OutcomeType::Away, 3.0),
        ]);
        let goals = from_market_odds(&odds);
        assert_float_absolute_eq!(1.3, goals.home);
        assert_float_absolute_eq!(1.3, goals.away);
    }

    #[test]
    fn market_implied_favourite() {
        let odds = MarketOdds::from_iter([
            (OutcomeType::Home, 1.8),
            (OutcomeType::Draw, 3.8),
            (OutcomeType::Away, 4.6),
        ]);
        let implied: Vec<f64> = [1.8, 3.8, 4.6].iter().map(|price| 1.0 / price).collect();
        let booksum: f64 = implied.iter().sum();
        let home_share = implied[0] / booksum + 0.5 * implied[1] / booksum;
        let goals = from_market_odds(&odds);
        assert_float_absolute_eq!(2.6 * home_share, goals.home, 1e-9);
        assert_float_absolute_eq!(2.6 * (1.0 - home_share), goals.away, 1e-9);
        assert!(goals.home > goals.away);
    }

    #[test]
    fn market_implied_defaults_without_prices() {
        let goals = from_market_odds(&MarketOdds::default());
        assert_float_absolute_eq!(2.6 * 0.575, goals.home, 1e-9);
        assert_float_absolute_eq!(2.6 * 0.425, goals.away, 1e-9);
    }

    #[test]
    fn team_rating_from_history() {
        let averages = LeagueAverages::default();
        let config = RatingConfig {
            shrinkage_k: 10.0,
            decay_alpha: 0.0,
        };
        let home_pairs = [(2.0, 1.0); 10];
        let rating = TeamRating::from_history("Arsenal", "E0", 2023, &home_pairs, &[], &averages, &config);
        assert_eq!(10, rating.matches_home);
        assert_eq!(0, rating.matches_away);
        assert_float_absolute_eq!((20.0 + 14.0) / 20.0, rating.attack_home);
        assert_float_absolute_eq!((10.0 + 11.0) / 20.0, rating.defence_home);
        assert_float_absolute_eq!(1.1, rating.attack_away);
        assert_float_absolute_eq!(1.4, rating.defence_away);
        assert_float_absolute_eq!(1.0, rating.form_home);
        assert_eq!(NEUTRAL_FORM, rating.form_away);
    }

    fn result(day: u32, home_team: &str, away_team: &str, home_score: f64, away_score: f64) -> HistoricalResult {
        HistoricalResult {
            date: NaiveDate::from_ymd_opt(2023, 9, day).unwrap(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_score,
            away_score,
        }
    }

    #[test]
    fn rating_book_refresh_and_upsert() {
        let mut book = RatingBook::default();
        assert!(book.is_empty());
        let results = vec![
            result(2, "Arsenal", "Chelsea", 2.0, 0.0),
            result(9, "Chelsea", "Fulham", 1.0, 1.0),
            result(16, "Fulham", "Arsenal", 0.0, 3.0),
        ];
        let rated = book.refresh_league("E0", 2023, &results, &RatingConfig::default());
        assert_eq!(3, rated);
        assert_eq!(3, book.len());

        let averages = book.league_averages("E0", 2023).unwrap();
        assert_float_absolute_eq!(1.0, averages.home_goals);
        assert_float_absolute_eq!(4.0 / 3.0, averages.away_goals);

        let arsenal = book.get("Arsenal", "E0", 2023).unwrap();
        assert_eq!(1, arsenal.matches_home);
        assert_eq!(1, arsenal.matches_away);
        assert_float_absolute_eq!(1.0, arsenal.form_home);
        assert!(book.get("Arsenal", "E0", 2022).is_none());
        assert!(book.get("Arsenal", "SP1", 2023).is_none());

        let mut replacement = arsenal.clone();
        replacement.attack_home = 9.9;
        let replaced = book.upsert(replacement).unwrap();
        assert_eq!(1, replaced.matches_home);
        assert_eq!(3, book.len());
        assert_eq!(9.9, book.get("Arsenal", "E0", 2023).unwrap().attack_home);
    }

    #[test]
    fn config_validation() {
        assert!(RatingConfig::default().validate().is_ok());
        let config = RatingConfig {
            shrinkage_k: -1.0,
            ..RatingConfig::default()
        };
        assert_eq!(
            "shrinkage k (-1) must be a non-negative finite number",
            config.validate().unwrap_err().to_string()
        );
    }
}
