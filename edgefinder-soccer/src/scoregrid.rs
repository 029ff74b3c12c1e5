//! Scoreline distributions over a bounded grid of (home goals, away goals), and the summary
//! probabilities derived from them.

use std::ops::RangeInclusive;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use edgefinder::factorial::{Factorial, Lookup, MAX_N};
use edgefinder::linear::Matrix;
use edgefinder::poisson;
use edgefinder::probs::SliceExt;

use crate::domain::{OutcomeProbs, OutcomeType, Score};
use crate::rating::ExpectedGoals;

pub const DEFAULT_MAX_GOALS: u8 = 7;
pub const DEFAULT_SHARED_RATE: f64 = 0.1;
pub const DEFAULT_RHO: f64 = -0.05;

/// Values of rho that keep every Dixon-Coles correction non-negative for rates within
/// [`crate::rating::EXPECTED_GOALS_RANGE`].
pub const RHO_RANGE: RangeInclusive<f64> = -0.2..=0.04;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScorelineModel {
    /// Bivariate Poisson with a shared component that correlates home and away goals.
    BivariatePoisson { shared_rate: f64 },

    /// Independent Poisson with the Dixon-Coles low-score correction.
    DixonColes { rho: f64 },
}
impl ScorelineModel {
    pub fn bivariate_poisson() -> Self {
        Self::BivariatePoisson {
            shared_rate: DEFAULT_SHARED_RATE,
        }
    }

    pub fn dixon_coles() -> Self {
        Self::DixonColes { rho: DEFAULT_RHO }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self {
            ScorelineModel::BivariatePoisson { shared_rate } => {
                if !shared_rate.is_finite() || *shared_rate < 0.0 {
                    bail!("shared rate ({shared_rate}) must be a non-negative finite number");
                }
            }
            ScorelineModel::DixonColes { rho } => {
                if !RHO_RANGE.contains(rho) {
                    bail!("rho ({rho}) outside of allowable range {RHO_RANGE:?}");
                }
            }
        }
        Ok(())
    }

    pub fn score_matrix(&self, home_rate: f64, away_rate: f64, max_goals: u8) -> ScoreMatrix {
        match self {
            ScorelineModel::BivariatePoisson { shared_rate } => {
                ScoreMatrix::from_bivariate_poisson(home_rate, away_rate, *shared_rate, max_goals)
            }
            ScorelineModel::DixonColes { rho } => {
                ScoreMatrix::from_dixon_coles(home_rate, away_rate, *rho, max_goals)
            }
        }
    }

    /// Goal expectations implied by the model's rates. The shared component of the bivariate
    /// model adds to both sides.
    pub fn expected_goals(&self, home_rate: f64, away_rate: f64) -> ExpectedGoals {
        match self {
            ScorelineModel::BivariatePoisson { shared_rate } => ExpectedGoals {
                home: home_rate + shared_rate,
                away: away_rate + shared_rate,
            },
            ScorelineModel::DixonColes { .. } => ExpectedGoals {
                home: home_rate,
                away: away_rate,
            },
        }
    }

    /// Builds the score matrix for the given rates and summarises it.
    pub fn run(&self, home_rate: f64, away_rate: f64, max_goals: u8) -> ModelOutput {
        let score_matrix = self.score_matrix(home_rate, away_rate, max_goals);
        ModelOutput::summarise(score_matrix, self.expected_goals(home_rate, away_rate))
    }
}

/// Square grid of scoreline probabilities, indexed by home goals (rows) and away goals (columns).
/// Entries are non-negative and sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    grid: Matrix,
}
impl ScoreMatrix {
    pub fn from_bivariate_poisson(home_rate: f64, away_rate: f64, shared_rate: f64, max_goals: u8) -> Self {
        validate_rates(home_rate, away_rate, max_goals);
        let factorial = Lookup::default();
        let mut grid = allocate(max_goals);
        for home_goals in 0..=max_goals {
            for away_goals in 0..=max_goals {
                grid[(home_goals as usize, away_goals as usize)] =
                    poisson::bivariate(home_goals, away_goals, home_rate, away_rate, shared_rate, &factorial);
            }
        }
        Self::normalised(grid)
    }

    /// # Panics
    /// If `rho` drives a corrected cell negative. Any rho in [`RHO_RANGE`] is safe for rates within
    /// [`crate::rating::EXPECTED_GOALS_RANGE`].
    pub fn from_dixon_coles(home_rate: f64, away_rate: f64, rho: f64, max_goals: u8) -> Self {
        validate_rates(home_rate, away_rate, max_goals);
        let factorial = Lookup::default();
        let home_probs = univariate_probs(home_rate, max_goals, &factorial);
        let away_probs = univariate_probs(away_rate, max_goals, &factorial);
        let mut grid = allocate(max_goals);
        for (home_goals, home_prob) in home_probs.iter().enumerate() {
            for (away_goals, away_prob) in away_probs.iter().enumerate() {
                let tau = tau(home_goals as u8, away_goals as u8, home_rate, away_rate, rho);
                assert!(tau >= 0.0, "rho {rho} yields a negative correction at {home_goals}:{away_goals}");
                grid[(home_goals, away_goals)] = home_prob * away_prob * tau;
            }
        }
        Self::normalised(grid)
    }

    fn normalised(mut grid: Matrix) -> Self {
        grid.flatten_mut().normalise(1.0);
        Self { grid }
    }

    pub fn max_goals(&self) -> u8 {
        (self.grid.rows() - 1) as u8
    }

    /// Probability of the given scoreline; zero for scores beyond the grid.
    pub fn probability(&self, score: &Score) -> f64 {
        let (home, away) = (score.home as usize, score.away as usize);
        if home < self.grid.rows() && away < self.grid.cols() {
            self.grid[(home, away)]
        } else {
            0.0
        }
    }

    /// Aggregate probability of all scorelines on which `outcome` wins.
    pub fn gather(&self, outcome: &OutcomeType) -> f64 {
        self.grid
            .sum_where(|home, away| outcome.won(&Score::new(home as u8, away as u8)))
    }

    pub fn scores(&self) -> impl Iterator<Item = (Score, f64)> + '_ {
        self.grid
            .cells()
            .map(|(home, away, prob)| (Score::new(home as u8, away as u8), prob))
    }

    pub fn grid(&self) -> &Matrix {
        &self.grid
    }

    /// Distributions of home and away goals.
    pub fn marginals(&self) -> (Vec<f64>, Vec<f64>) {
        (self.grid.row_sums(), self.grid.col_sums())
    }

    /// The most likely scoreline. Ties resolve to the first in row-major order.
    pub fn most_likely(&self) -> (Score, f64) {
        self.grid
            .argmax()
            .map(|(home, away, prob)| (Score::new(home as u8, away as u8), prob))
            .unwrap_or((Score::new(0, 0), 0.0))
    }
}

fn validate_rates(home_rate: f64, away_rate: f64, max_goals: u8) {
    assert!(home_rate > 0.0, "home rate must be positive, got {home_rate}");
    assert!(away_rate > 0.0, "away rate must be positive, got {away_rate}");
    assert!(max_goals <= MAX_N, "max goals ({max_goals}) cannot exceed {MAX_N}");
}

fn allocate(max_goals: u8) -> Matrix {
    let dim = max_goals as usize + 1;
    Matrix::allocate(dim, dim)
}

fn univariate_probs(rate: f64, max_goals: u8, factorial: &impl Factorial) -> Vec<f64> {
    (0..=max_goals)
        .map(|goals| poisson::univariate(goals, rate, factorial))
        .collect()
}

/// Dixon-Coles correction factor. Only the four scorelines with at most one goal per side are
/// adjusted; every other cell is left as is.
#[inline]
pub fn tau(home_goals: u8, away_goals: u8, home_rate: f64, away_rate: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - home_rate * away_rate * rho,
        (0, 1) => 1.0 + home_rate * rho,
        (1, 0) => 1.0 + away_rate * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

/// Summary probabilities of a scoreline distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub expected_goals: ExpectedGoals,
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
    pub over_25: f64,
    pub under_25: f64,
    pub btts_yes: f64,
    pub btts_no: f64,
    pub score_matrix: ScoreMatrix,
}
impl ModelOutput {
    pub fn summarise(score_matrix: ScoreMatrix, expected_goals: ExpectedGoals) -> Self {
        let (mut home_win, mut draw, mut away_win, mut over_25, mut btts_yes) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (score, prob) in score_matrix.scores() {
            match score.home.cmp(&score.away) {
                std::cmp::Ordering::Greater => home_win += prob,
                std::cmp::Ordering::Equal => draw += prob,
                std::cmp::Ordering::Less => away_win += prob,
            }
            if score.total() > 2 {
                over_25 += prob;
            }
            if score.home > 0 && score.away > 0 {
                btts_yes += prob;
            }
        }
        Self {
            expected_goals,
            home_win,
            draw,
            away_win,
            over_25,
            under_25: 1.0 - over_25,
            btts_yes,
            btts_no: 1.0 - btts_yes,
            score_matrix,
        }
    }

    pub fn probability(&self, outcome: &OutcomeType) -> f64 {
        match outcome {
            OutcomeType::Home => self.home_win,
            OutcomeType::Draw => self.draw,
            OutcomeType::Away => self.away_win,
            OutcomeType::Over25 => self.over_25,
            OutcomeType::Under25 => self.under_25,
            OutcomeType::BttsYes => self.btts_yes,
            OutcomeType::BttsNo => self.btts_no,
        }
    }

    pub fn probabilities(&self) -> OutcomeProbs {
        use strum::IntoEnumIterator;
        OutcomeType::iter()
            .map(|outcome| (outcome, self.probability(&outcome)))
            .collect()
    }
}
