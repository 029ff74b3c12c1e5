//! Historical match feed in the football-data.co.uk CSV layout.

use std::io;
use std::io::BufRead;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use edgefinder::csv::{CsvReader, Header};

use crate::domain::{MarketOdds, OutcomeType, Score};

const DATE_FORMATS: [&str; 3] = ["%d/%m/%y", "%d/%m/%Y", "%Y-%m-%d"];
const MISSING_VALUES: [&str; 3] = ["", "NA", "N/A"];

/// Candidate price columns per outcome, in order of preference.
const ODDS_COLUMNS: [(OutcomeType, &[&str]); 7] = [
    (OutcomeType::Home, &["B365H", "BWH", "PSH", "AvgH"]),
    (OutcomeType::Draw, &["B365D", "BWD", "PSD", "AvgD"]),
    (OutcomeType::Away, &["B365A", "BWA", "PSA", "AvgA"]),
    (OutcomeType::Over25, &["B365>2.5", "B365O25", "Avg>2.5", "AvgO25"]),
    (OutcomeType::Under25, &["B365<2.5", "B365U25", "Avg<2.5", "AvgU25"]),
    (OutcomeType::BttsYes, &["B365BTTSY", "B365Y", "AvgBTTSY", "AvgY"]),
    (OutcomeType::BttsNo, &["B365BTTSN", "B365N", "AvgBTTSN", "AvgN"]),
];

/// Market-average prices taken as the closing reference.
const CLOSING_COLUMNS: [(OutcomeType, &str); 3] = [
    (OutcomeType::Home, "AvgH"),
    (OutcomeType::Draw, "AvgD"),
    (OutcomeType::Away, "AvgA"),
];

static LEAGUE_CODES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    FxHashMap::from_iter([
        ("EPL", "E0"),
        ("La Liga", "SP1"),
        ("Bundesliga", "D1"),
        ("Serie A", "I1"),
        ("Ligue 1", "F1"),
        ("Eredivisie", "N1"),
        ("Primeira Liga", "P1"),
        ("Championship", "E1"),
        ("Superliga", "DK1"),
        ("Allsvenskan", "S1"),
    ])
});

static LEAGUE_NAMES: Lazy<FxHashMap<&'static str, &'static str>> =
    Lazy::new(|| LEAGUE_CODES.iter().map(|(&name, &code)| (code, name)).collect());

/// The feed's code for a league name, or the input itself if it is not a known name (it may
/// already be a code).
pub fn league_code(league: &str) -> &str {
    LEAGUE_CODES.get(league).copied().unwrap_or(league)
}

pub fn league_name(code: &str) -> Option<&'static str> {
    LEAGUE_NAMES.get(code).copied()
}

/// The starting year of the season in which `date` falls; seasons turn over in July.
pub fn season_of(date: NaiveDate) -> u16 {
    let year = if date.month() >= 7 { date.year() } else { date.year() - 1 };
    year as u16
}

/// Four-digit directory code of a season, e.g., `2324` for the season starting in 2023.
pub fn season_code(season: u16) -> String {
    format!("{:02}{:02}", season % 100, (season + 1) % 100)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub score: Score,

    /// Prices available before kick-off.
    pub odds: MarketOdds,

    /// Reference closing prices, where the feed has them.
    pub closing: MarketOdds,
}
impl MatchRecord {
    pub fn season(&self) -> u16 {
        season_of(self.date)
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("missing column {0}")]
    MissingColumn(&'static str),

    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },
}

struct Columns {
    league: Option<usize>,
    date: usize,
    home_team: usize,
    away_team: usize,
    home_goals: usize,
    away_goals: usize,
    odds: Vec<(OutcomeType, Vec<usize>)>,
    closing: Vec<(OutcomeType, usize)>,
}
impl Columns {
    fn locate(header: &Header) -> Result<Self, FeedError> {
        let required = |name: &'static str| header.position(name).ok_or(FeedError::MissingColumn(name));
        Ok(Self {
            league: header.position("Div"),
            date: required("Date")?,
            home_team: required("HomeTeam")?,
            away_team: required("AwayTeam")?,
            home_goals: required("FTHG")?,
            away_goals: required("FTAG")?,
            odds: ODDS_COLUMNS
                .iter()
                .map(|(outcome, candidates)| (*outcome, header.positions(candidates)))
                .collect(),
            closing: CLOSING_COLUMNS
                .iter()
                .filter_map(|(outcome, name)| header.position(name).map(|position| (*outcome, position)))
                .collect(),
        })
    }
}

fn cell(record: &[String], position: usize) -> Option<&str> {
    record
        .get(position)
        .map(String::as_str)
        .filter(|value| !MISSING_VALUES.contains(value))
}

/// A usable price from the cell: parseable and non-zero.
fn price(record: &[String], position: usize) -> Option<f64> {
    cell(record, position)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|&price| price != 0.0)
}

fn goals(record: &[String], position: usize, line: usize) -> Result<Option<u8>, FeedError> {
    match cell(record, position) {
        None => Ok(None),
        Some(value) => {
            let goals = value.parse::<f64>().map_err(|err| FeedError::InvalidRecord {
                line,
                reason: format!("goals '{value}': {err}"),
            })?;
            if !(0.0..=u8::MAX as f64).contains(&goals) {
                return Err(FeedError::InvalidRecord {
                    line,
                    reason: format!("goals '{value}' out of range"),
                });
            }
            Ok(Some(goals as u8))
        }
    }
}

/// Parses matches from CSV data. The league of each match is taken from the `Div` column when
/// present, otherwise `default_league`. Rows without a date, either team, or the full-time
/// score are skipped.
pub fn parse_csv(default_league: &str, reader: impl BufRead) -> Result<Vec<MatchRecord>, FeedError> {
    parse_records(default_league, CsvReader::from_reader(reader))
}

fn parse_records<R: BufRead>(default_league: &str, mut csv: CsvReader<R>) -> Result<Vec<MatchRecord>, FeedError> {
    let header = match csv.next() {
        None => return Ok(vec![]),
        Some(names) => Header::new(names?),
    };
    let columns = Columns::locate(&header)?;

    let mut matches = vec![];
    let mut skipped = 0;
    for (index, record) in csv.enumerate() {
        let record = record?;
        let line = index + 2;
        let (date, home_team, away_team) = match (
            cell(&record, columns.date).and_then(parse_date),
            cell(&record, columns.home_team),
            cell(&record, columns.away_team),
        ) {
            (Some(date), Some(home_team), Some(away_team)) => (date, home_team, away_team),
            _ => {
                skipped += 1;
                continue;
            }
        };
        let score = match (
            goals(&record, columns.home_goals, line)?,
            goals(&record, columns.away_goals, line)?,
        ) {
            (Some(home), Some(away)) => Score::new(home, away),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let odds = columns
            .odds
            .iter()
            .filter_map(|(outcome, positions)| {
                positions
                    .iter()
                    .find_map(|&position| price(&record, position))
                    .map(|price| (*outcome, price))
            })
            .collect();
        let closing = columns
            .closing
            .iter()
            .filter_map(|&(outcome, position)| price(&record, position).map(|price| (outcome, price)))
            .collect();
        let league = columns
            .league
            .and_then(|position| cell(&record, position))
            .unwrap_or(default_league);

        matches.push(MatchRecord {
            date,
            league: league.to_string(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            score,
            odds,
            closing,
        });
    }
    debug!("parsed {} matches, skipped {skipped} rows", matches.len());
    Ok(matches)
}

pub fn read_csv_file(default_league: &str, path: impl AsRef<Path>) -> Result<Vec<MatchRecord>, FeedError> {
    let path = path.as_ref();
    let matches = parse_records(default_league, CsvReader::open(path)?)?;
    debug!("read {} matches from {path:?}", matches.len());
    Ok(matches)
}

/// Orders matches by date, preserving the relative order of matches on the same date.
pub fn sort_chronologically(matches: &mut [MatchRecord]) {
    matches.sort_by_key(|record| record.date);
}
