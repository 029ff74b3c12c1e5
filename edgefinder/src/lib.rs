//! Sport-agnostic numerical core: Poisson mass functions, probability utilities, CSV and JSON files, bookmaker
//! market fitting, Kelly stake sizing and exhaustive grid enumeration.

#![allow(clippy::too_many_arguments)]

pub mod comb;
pub mod csv;
pub mod factorial;
pub mod file;
pub mod kelly;
pub mod linear;
pub mod market;
pub mod poisson;
pub mod probs;
pub mod timed;

#[doc = include_str!("../../README.md")]
#[cfg(doc)]
fn readme() {}
