use stanza::style::HAlign::{Left, Right};
use stanza::style::{Header, MinWidth, Styles};
use stanza::table::{Cell, Col, Row, Table};
use strum::IntoEnumIterator;

use crate::backtest::metrics::{CalibrationBin, EdgeBucket, GroupRoi, Staking, StrategyMetrics};
use crate::backtest::Trial;
use crate::domain::{MarketOdds, OutcomeType};
use crate::scoregrid::{ModelOutput, ScoreMatrix};
use crate::signal::Signal;

fn label_col() -> Col {
    Col::new(Styles::default().with(MinWidth(12)).with(Left))
}

fn number_col() -> Col {
    Col::new(Styles::default().with(MinWidth(8)).with(Right))
}

fn header_row(labels: &[&str]) -> Row {
    Row::new(
        Styles::default().with(Header(true)),
        labels.iter().map(|&label| label.into()).collect(),
    )
}

pub fn tabulate_model_output(output: &ModelOutput, odds: &MarketOdds) -> Table {
    let mut table = Table::default()
        .with_cols(vec![label_col(), number_col(), number_col(), number_col()])
        .with_row(header_row(&["Outcome", "Prob", "Fair", "Odds"]));
    for outcome in OutcomeType::iter() {
        let prob = output.probability(&outcome);
        table.push_row(Row::new(
            Styles::default(),
            vec![
                outcome.display_label().into(),
                format!("{prob:.3}").into(),
                format!("{:.2}", 1.0 / prob).into(),
                odds.get(&outcome)
                    .map(|price| format!("{price:.2}"))
                    .unwrap_or_default()
                    .into(),
            ],
        ));
    }
    table
}

/// Scoreline probabilities in percent, home goals down and away goals across, with the goal
/// distribution of each side in the margins.
pub fn tabulate_score_matrix(matrix: &ScoreMatrix) -> Table {
    let goals = matrix.grid().cols();
    let (home_marginal, away_marginal) = matrix.marginals();
    let percent = |prob: f64| Cell::from(format!("{:.2}", prob * 100.0));

    let mut cols = vec![Col::new(Styles::default().with(MinWidth(5)).with(Left))];
    cols.extend((0..=goals).map(|_| Col::new(Styles::default().with(MinWidth(6)).with(Right))));
    let mut table = Table::default().with_cols(cols).with_row(Row::new(
        Styles::default().with(Header(true)),
        std::iter::once(Cell::from("H\\A"))
            .chain((0..goals).map(|away| Cell::from(away.to_string())))
            .chain(std::iter::once(Cell::from("Σ")))
            .collect(),
    ));
    for (home, marginal) in home_marginal.iter().enumerate() {
        table.push_row(Row::new(
            Styles::default(),
            std::iter::once(Cell::from(home.to_string()))
                .chain(matrix.grid().row_slice(home).iter().map(|&prob| percent(prob)))
                .chain(std::iter::once(percent(*marginal)))
                .collect(),
        ));
    }
    table.push_row(Row::new(
        Styles::default().with(Header(true)),
        std::iter::once(Cell::from("Σ"))
            .chain(away_marginal.iter().map(|&prob| percent(prob)))
            .chain(std::iter::once(Cell::from("")))
            .collect(),
    ));
    table
}

pub fn tabulate_signals(signals: &[Signal]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            label_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
        ])
        .with_row(header_row(&["Outcome", "Prob", "Odds", "Edge", "Kelly", "Conf"]));
    for signal in signals {
        let edge = if signal.capped {
            format!("{:.3}*", signal.edge)
        } else {
            format!("{:.3}", signal.edge)
        };
        table.push_row(Row::new(
            Styles::default(),
            vec![
                signal.outcome.display_label().into(),
                format!("{:.3}", signal.probability).into(),
                format!("{:.2}", signal.odds).into(),
                edge.into(),
                format!("{:.4}", signal.kelly).into(),
                format!("{:.2}", signal.confidence).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_strategies<'a>(strategies: impl IntoIterator<Item = (&'a Staking, &'a StrategyMetrics)>) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            label_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
        ])
        .with_row(header_row(&[
            "Staking", "Bets", "Staked", "Profit", "ROI %", "Hit %", "Sharpe", "MaxDD %",
        ]));
    for (staking, metrics) in strategies {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                staking.to_string().into(),
                metrics.bets.to_string().into(),
                format!("{:.2}", metrics.staked).into(),
                format!("{:.2}", metrics.profit).into(),
                format!("{:.2}", metrics.roi).into(),
                format!("{:.2}", metrics.hit_rate).into(),
                format!("{:.2}", metrics.sharpe).into(),
                format!("{:.2}", metrics.max_drawdown).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_trials(trials: &[&Trial]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            number_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
            number_col(),
        ])
        .with_row(header_row(&["k", "Blend", "HFA", "Edge", "Bets", "ROI %"]));
    for trial in trials {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{:.0}", trial.params.shrinkage_k).into(),
                format!("{:.2}", trial.params.blend_weight).into(),
                format!("{:.2}", trial.params.hfa).into(),
                format!("{:.2}", trial.params.edge_threshold).into(),
                trial.metrics.bets.to_string().into(),
                format!("{:.2}", trial.metrics.roi).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_calibration(bins: &[CalibrationBin]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![number_col(), number_col(), number_col(), number_col()])
        .with_row(header_row(&["Bin", "Predicted", "Observed", "Count"]));
    for bin in bins {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                bin.bin.to_string().into(),
                format!("{:.3}", bin.predicted).into(),
                format!("{:.3}", bin.observed).into(),
                bin.count.to_string().into(),
            ],
        ));
    }
    table
}

pub fn tabulate_group_roi(heading: &str, groups: &[GroupRoi]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![label_col(), number_col(), number_col()])
        .with_row(header_row(&[heading, "Bets", "ROI %"]));
    for group in groups {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                group.label.clone().into(),
                group.bets.to_string().into(),
                format!("{:.2}", group.roi).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_edge_distribution(buckets: &[EdgeBucket]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![label_col(), number_col()])
        .with_row(header_row(&["Edge", "Bets"]));
    for bucket in buckets {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{:.3}..{:.3}", bucket.min, bucket.max).into(),
                bucket.count.to_string().into(),
            ],
        ));
    }
    table
}
