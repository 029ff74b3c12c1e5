//! Performance of a bet ledger under a staking strategy, and the breakdowns of a ledger reported
//! alongside.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use edgefinder::kelly::kelly_fraction;
use edgefinder::probs::{round_to, SliceExt};

use crate::backtest::{BacktestConfig, BetRecord, Prediction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Staking {
    /// A fixed percentage of the current bankroll.
    Flat,

    /// The configured fraction of the Kelly stake.
    FractionalKelly,

    FullKelly,
}
impl Staking {
    /// Fraction of the current bankroll staked on `bet`.
    pub fn stake_fraction(&self, bet: &BetRecord, config: &BacktestConfig) -> f64 {
        match self {
            Staking::Flat => config.flat_stake_pct,
            Staking::FractionalKelly => kelly_fraction(bet.probability, bet.odds, config.kelly.fraction, config.kelly.cap),
            Staking::FullKelly => kelly_fraction(bet.probability, bet.odds, 1.0, config.kelly.cap),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// Settlement date of the bet; `None` for the starting bankroll.
    pub date: Option<NaiveDate>,
    pub bankroll: f64,
}

/// Ledger performance. Percentages are rounded to two decimal places.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    /// Profit over turnover, in percent.
    pub roi: f64,
    pub profit: f64,
    pub staked: f64,

    /// Share of bets won, in percent.
    pub hit_rate: f64,

    /// Mean over standard deviation of per-bet returns, scaled by the square root of the count.
    pub sharpe: f64,

    /// Largest peak-to-trough decline of the bankroll, in percent.
    pub max_drawdown: f64,

    pub bets: usize,
    pub ending_bankroll: f64,
}

/// Replays `bets` in order against the starting bankroll, compounding stakes. Bets for which the
/// strategy stakes nothing are skipped.
pub fn equity_curve(bets: &[BetRecord], staking: Staking, config: &BacktestConfig) -> (Vec<EquityPoint>, StrategyMetrics) {
    let mut bankroll = config.bankroll;
    let mut equity = vec![EquityPoint {
        date: None,
        bankroll,
    }];
    let (mut total_profit, mut total_staked, mut wins) = (0.0, 0.0, 0);
    let mut returns = Vec::with_capacity(bets.len());
    for bet in bets {
        let stake = bankroll * staking.stake_fraction(bet, config);
        if stake <= 0.0 {
            continue;
        }
        let profit = if bet.won {
            wins += 1;
            stake * (bet.odds - 1.0)
        } else {
            -stake
        };
        total_staked += stake;
        total_profit += profit;
        bankroll += profit;
        returns.push(profit / stake);
        equity.push(EquityPoint {
            date: Some(bet.date),
            bankroll,
        });
    }

    let roi = if total_staked > 0.0 {
        total_profit / total_staked * 100.0
    } else {
        0.0
    };
    let hit_rate = if returns.is_empty() {
        0.0
    } else {
        wins as f64 / returns.len() as f64 * 100.0
    };
    let metrics = StrategyMetrics {
        roi: round_to(roi, 2),
        profit: round_to(total_profit, 2),
        staked: round_to(total_staked, 2),
        hit_rate: round_to(hit_rate, 2),
        sharpe: round_to(sharpe(&returns), 2),
        max_drawdown: round_to(max_drawdown(&equity) * 100.0, 2),
        bets: returns.len(),
        ending_bankroll: round_to(bankroll, 2),
    };
    (equity, metrics)
}

/// Zero for fewer than two returns or no dispersion.
pub fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let stdev = returns.sample_stdev();
    if stdev == 0.0 {
        return 0.0;
    }
    returns.mean() / stdev * (returns.len() as f64).sqrt()
}

/// Largest relative decline from a running peak, as a fraction.
pub fn max_drawdown(equity: &[EquityPoint]) -> f64 {
    let mut peak = match equity.first() {
        None => return 0.0,
        Some(point) => point.bankroll,
    };
    let mut max_drawdown = 0.0;
    for point in equity {
        peak = peak.max(point.bankroll);
        if peak > 0.0 {
            let drawdown = (peak - point.bankroll) / peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }
    max_drawdown
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bin: usize,

    /// Mean predicted probability in the bin.
    pub predicted: f64,

    /// Observed frequency of the predicted outcome.
    pub observed: f64,
    pub count: usize,
}

/// Buckets predictions into `bins` equal-width probability ranges, reporting the non-empty ones.
pub fn calibration(predictions: &[Prediction], bins: usize) -> Vec<CalibrationBin> {
    let mut totals = vec![(0.0, 0, 0); bins];
    for prediction in predictions {
        let index = ((prediction.probability * bins as f64).max(0.0) as usize).min(bins - 1);
        let (prob_sum, hits, count) = &mut totals[index];
        *prob_sum += prediction.probability;
        *hits += prediction.hit as usize;
        *count += 1;
    }
    totals
        .into_iter()
        .enumerate()
        .filter(|(_, (_, _, count))| *count > 0)
        .map(|(bin, (prob_sum, hits, count))| CalibrationBin {
            bin,
            predicted: round_to(prob_sum / count as f64, 3),
            observed: round_to(hits as f64 / count as f64, 3),
            count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRoi {
    pub label: String,

    /// Mean profit per unit staked, in percent.
    pub roi: f64,
    pub bets: usize,
}

/// Level-stakes ROI per group, best first. Groups with equal ROI keep the order in which they
/// first appear.
pub fn roi_by_group(bets: &[BetRecord], group: impl Fn(&BetRecord) -> String) -> Vec<GroupRoi> {
    let mut positions: FxHashMap<String, usize> = FxHashMap::default();
    let mut profits: Vec<(String, Vec<f64>)> = vec![];
    for bet in bets {
        let label = group(bet);
        let position = *positions.entry(label.clone()).or_insert_with(|| {
            profits.push((label, vec![]));
            profits.len() - 1
        });
        profits[position].1.push(if bet.won { bet.odds - 1.0 } else { -1.0 });
    }
    let mut groups: Vec<_> = profits
        .into_iter()
        .map(|(label, profits)| GroupRoi {
            label,
            roi: round_to(profits.mean() * 100.0, 2),
            bets: profits.len(),
        })
        .collect();
    groups.sort_by(|a, b| b.roi.total_cmp(&a.roi));
    groups
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeBucket {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Histogram of bet edges over `bins` equal-width buckets spanning the observed range. A single
/// bucket is returned when all edges are equal.
pub fn edge_distribution(bets: &[BetRecord], bins: usize) -> Vec<EdgeBucket> {
    if bets.is_empty() {
        return vec![];
    }
    let (min_edge, max_edge) = bets.iter().fold((f64::MAX, f64::MIN), |(min, max), bet| {
        (min.min(bet.edge), max.max(bet.edge))
    });
    if min_edge == max_edge {
        return vec![EdgeBucket {
            min: round_to(min_edge, 3),
            max: round_to(max_edge, 3),
            count: bets.len(),
        }];
    }
    let step = (max_edge - min_edge) / bins as f64;
    let mut counts = vec![0; bins];
    for bet in bets {
        let index = (((bet.edge - min_edge) / step) as usize).min(bins - 1);
        counts[index] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(index, count)| EdgeBucket {
            min: round_to(min_edge + step * index as f64, 3),
            max: round_to(min_edge + step * (index + 1) as f64, 3),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::domain::{MarketType, OutcomeType};

    fn bet(day: u32, league: &str, outcome: OutcomeType, probability: f64, odds: f64, won: bool) -> BetRecord {
        BetRecord {
            date: NaiveDate::from_ymd_opt(2023, 9, day).unwrap(),
            league: league.into(),
            home_team: "Home".into(),
            away_team: "Away".into(),
            market: outcome.market(),
            outcome,
            probability,
            odds,
            edge: probability * odds - 1.0,
            won,
            clv: None,
        }
    }

    #[test]
    fn flat_staking() {
        let config = BacktestConfig::default();
        let bets = vec![
            bet(1, "E0", OutcomeType::Over25, 0.55, 2.0, true),
            bet(2, "E0", OutcomeType::Over25, 0.55, 2.0, false),
        ];
        let (equity, metrics) = equity_curve(&bets, Staking::Flat, &config);
        assert_eq!(3, equity.len());
        assert_eq!(None, equity[0].date);
        assert_float_absolute_eq!(1000.0, equity[0].bankroll);
        assert_float_absolute_eq!(1010.0, equity[1].bankroll);
        assert_float_absolute_eq!(999.9, equity[2].bankroll, 1e-9);
        assert_eq!(2, metrics.bets);
        assert_eq!(50.0, metrics.hit_rate);
        assert_eq!(20.1, metrics.staked);
        assert_eq!(-0.1, metrics.profit);
        assert_eq!(-0.5, metrics.roi);
        assert_eq!(999.9, metrics.ending_bankroll);
        assert_eq!(1.0, metrics.max_drawdown);
        // returns of +1 and -1 have zero mean
        assert_eq!(0.0, metrics.sharpe);
    }

    #[test]
    fn kelly_staking_skips_negative_stakes() {
        let config = BacktestConfig::default();
        let bets = vec![
            bet(1, "E0", OutcomeType::Home, 0.3, 2.0, true),
            bet(2, "E0", OutcomeType::Home, 0.6, 2.0, true),
        ];
        let (equity, metrics) = equity_curve(&bets, Staking::FractionalKelly, &config);
        assert_eq!(1, metrics.bets);
        assert_eq!(2, equity.len());
        assert_float_absolute_eq!(1050.0, equity[1].bankroll, 1e-9);
        assert_eq!(100.0, metrics.roi);

        let (_, metrics) = equity_curve(&bets, Staking::FullKelly, &config);
        assert_eq!(1, metrics.bets);
        // full Kelly of 0.2 is capped at 0.15
        assert_eq!(150.0, metrics.staked);
        assert_eq!(1150.0, metrics.ending_bankroll);
    }

    #[test]
    fn empty_ledger() {
        let config = BacktestConfig::default();
        for staking in Staking::iter() {
            let (equity, metrics) = equity_curve(&[], staking, &config);
            assert_eq!(1, equity.len());
            assert_eq!(0, metrics.bets);
            assert_eq!(0.0, metrics.roi);
            assert_eq!(0.0, metrics.hit_rate);
            assert_eq!(1000.0, metrics.ending_bankroll);
        }
    }

    #[test]
    fn sharpe_ratio() {
        assert_eq!(0.0, sharpe(&[]));
        assert_eq!(0.0, sharpe(&[1.0]));
        assert_eq!(0.0, sharpe(&[0.5, 0.5, 0.5]));
        let returns = [1.0, -1.0, 1.0, 1.0];
        let mean = 0.5;
        let stdev = f64::sqrt((0.25 + 2.25 + 0.25 + 0.25) / 3.0);
        assert_float_absolute_eq!(mean / stdev * 2.0, sharpe(&returns), 1e-12);
    }

    #[test]
    fn drawdown() {
        let points = |bankrolls: &[f64]| -> Vec<EquityPoint> {
            bankrolls
                .iter()
                .map(|&bankroll| EquityPoint { date: None, bankroll })
                .collect()
        };
        assert_eq!(0.0, max_drawdown(&[]));
        assert_eq!(0.0, max_drawdown(&points(&[100.0, 110.0, 120.0])));
        assert_float_absolute_eq!(0.25, max_drawdown(&points(&[100.0, 120.0, 90.0, 110.0, 100.0])));
    }

    #[test]
    fn calibration_bins() {
        let predictions = [
            Prediction { probability: 0.05, hit: false },
            Prediction { probability: 0.55, hit: true },
            Prediction { probability: 0.58, hit: false },
            Prediction { probability: 1.0, hit: true },
        ];
        let bins = calibration(&predictions, 10);
        assert_eq!(
            vec![
                CalibrationBin { bin: 0, predicted: 0.05, observed: 0.0, count: 1 },
                CalibrationBin { bin: 5, predicted: 0.565, observed: 0.5, count: 2 },
                CalibrationBin { bin: 9, predicted: 1.0, observed: 1.0, count: 1 },
            ],
            bins
        );
        assert!(calibration(&[], 10).is_empty());
    }

    #[test]
    fn roi_groups_sorted_descending() {
        let bets = vec![
            bet(1, "E0", OutcomeType::Home, 0.6, 2.0, false),
            bet(2, "SP1", OutcomeType::Over25, 0.6, 2.5, true),
            bet(3, "E0", OutcomeType::Home, 0.6, 2.0, true),
            bet(4, "D1", OutcomeType::BttsYes, 0.6, 1.9, false),
        ];
        let by_league = roi_by_group(&bets, |bet| bet.league.clone());
        assert_eq!(
            vec![
                GroupRoi { label: "SP1".into(), roi: 150.0, bets: 1 },
                GroupRoi { label: "E0".into(), roi: 0.0, bets: 2 },
                GroupRoi { label: "D1".into(), roi: -100.0, bets: 1 },
            ],
            by_league
        );
        let by_market = roi_by_group(&bets, |bet| bet.market.to_string());
        assert_eq!(vec!["totals", "h2h", "btts"], by_market.iter().map(|g| g.label.as_str()).collect::<Vec<_>>());
        assert_eq!(MarketType::Totals, bets[1].market);
    }

    #[test]
    fn edge_histogram() {
        assert!(edge_distribution(&[], 8).is_empty());

        let same = vec![bet(1, "E0", OutcomeType::Home, 0.6, 2.0, true); 3];
        let buckets = edge_distribution(&same, 8);
        assert_eq!(1, buckets.len());
        assert_eq!(3, buckets[0].count);

        let bets: Vec<_> = [0.51, 0.52, 0.53, 0.55, 0.59]
            .into_iter()
            .map(|probability| bet(1, "E0", OutcomeType::Home, probability, 2.0, true))
            .collect();
        let buckets = edge_distribution(&bets, 8);
        assert_eq!(8, buckets.len());
        assert_eq!(5, buckets.iter().map(|bucket| bucket.count).sum::<usize>());
        assert_eq!(1, buckets[0].count);
        assert_eq!(1, buckets[7].count);
        assert_float_absolute_eq!(0.02, buckets[0].min, 1e-9);
        assert_float_absolute_eq!(0.18, buckets[7].max, 1e-9);
    }
}
