//! Football match modelling: scoreline distributions from team strength ratings, blending with
//! bookmaker prices, value detection, Kelly staking and a parameter-searching historical backtest.

pub mod backtest;
pub mod clv;
pub mod confidence;
pub mod domain;
pub mod feed;
pub mod print;
pub mod rating;
pub mod scoregrid;
pub mod signal;
pub mod value;

#[doc = include_str!("../../README.md")]
#[cfg(doc)]
fn readme() {}
