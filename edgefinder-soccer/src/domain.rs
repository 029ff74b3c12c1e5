use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}
impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    pub fn total(&self) -> u16 {
        self.home as u16 + self.away as u16
    }

    /// League points earned by the given side: three for a win, one for a draw.
    pub fn points(&self, side: Side) -> u8 {
        let (scored, conceded) = match side {
            Side::Home => (self.home, self.away),
            Side::Away => (self.away, self.home),
        };
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => 3,
            std::cmp::Ordering::Equal => 1,
            std::cmp::Ordering::Less => 0,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketType {
    H2h,
    Totals,
    Btts,
}
impl MarketType {
    pub fn outcomes(&self) -> &'static [OutcomeType] {
        match self {
            MarketType::H2h => &[OutcomeType::Home, OutcomeType::Draw, OutcomeType::Away],
            MarketType::Totals => &[OutcomeType::Over25, OutcomeType::Under25],
            MarketType::Btts => &[OutcomeType::BttsYes, OutcomeType::BttsNo],
        }
    }
}

#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeType {
    Home,
    Draw,
    Away,
    #[serde(rename = "over_25")]
    #[strum(serialize = "over_25")]
    Over25,
    #[serde(rename = "under_25")]
    #[strum(serialize = "under_25")]
    Under25,
    BttsYes,
    BttsNo,
}
impl OutcomeType {
    pub fn market(&self) -> MarketType {
        match self {
            OutcomeType::Home | OutcomeType::Draw | OutcomeType::Away => MarketType::H2h,
            OutcomeType::Over25 | OutcomeType::Under25 => MarketType::Totals,
            OutcomeType::BttsYes | OutcomeType::BttsNo => MarketType::Btts,
        }
    }

    /// Whether a bet on this outcome wins given the final `score`.
    pub fn won(&self, score: &Score) -> bool {
        match self {
            OutcomeType::Home => score.home > score.away,
            OutcomeType::Draw => score.home == score.away,
            OutcomeType::Away => score.away > score.home,
            OutcomeType::Over25 => score.total() > 2,
            OutcomeType::Under25 => score.total() <= 2,
            OutcomeType::BttsYes => score.home > 0 && score.away > 0,
            OutcomeType::BttsNo => score.home == 0 || score.away == 0,
        }
    }

    /// Short label shown to punters.
    pub fn display_label(&self) -> &'static str {
        match self {
            OutcomeType::Home => "1",
            OutcomeType::Draw => "X",
            OutcomeType::Away => "2",
            OutcomeType::Over25 => "O2.5",
            OutcomeType::Under25 => "U2.5",
            OutcomeType::BttsYes => "BTTS Yes",
            OutcomeType::BttsNo => "BTTS No",
        }
    }
}

/// Decimal prices keyed by outcome.
pub type MarketOdds = FxHashMap<OutcomeType, f64>;

/// Probabilities keyed by outcome.
pub type OutcomeProbs = FxHashMap<OutcomeType, f64>;
