//! Running aggregates of past results, from which match strengths are derived during a replay.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::domain::{Score, Side};
use crate::feed::MatchRecord;
use crate::rating::{shrink, LeagueAverages, MatchStrengths, FORM_WINDOW, NEUTRAL_FORM};

/// Goals and recent points of one team, with home and away tallied apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamTracker {
    home_for: u32,
    home_against: u32,
    away_for: u32,
    away_against: u32,
    home_matches: u32,
    away_matches: u32,
    recent_points: VecDeque<u8>,
}
impl TeamTracker {
    pub fn update(&mut self, score: &Score, side: Side) {
        match side {
            Side::Home => {
                self.home_for += score.home as u32;
                self.home_against += score.away as u32;
                self.home_matches += 1;
            }
            Side::Away => {
                self.away_for += score.away as u32;
                self.away_against += score.home as u32;
                self.away_matches += 1;
            }
        }
        self.recent_points.push_front(score.points(side));
        self.recent_points.truncate(FORM_WINDOW);
    }

    pub fn matches(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home_matches,
            Side::Away => self.away_matches,
        }
    }

    /// Points ratio over the most recent results at either venue.
    pub fn form(&self) -> f64 {
        if self.recent_points.is_empty() {
            return NEUTRAL_FORM;
        }
        let points: u32 = self.recent_points.iter().map(|&points| points as u32).sum();
        points as f64 / (3 * self.recent_points.len()) as f64
    }

    /// Mean goals (scored, conceded) per match at the given venue, or the `fallback` pair
    /// before the first match there.
    fn averages(&self, side: Side, fallback: (f64, f64)) -> (f64, f64) {
        let (scored, conceded, matches) = match side {
            Side::Home => (self.home_for, self.home_against, self.home_matches),
            Side::Away => (self.away_for, self.away_against, self.away_matches),
        };
        if matches == 0 {
            fallback
        } else {
            (scored as f64 / matches as f64, conceded as f64 / matches as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeagueTracker {
    home_goals: u32,
    away_goals: u32,
    matches: u32,
}
impl LeagueTracker {
    pub fn update(&mut self, score: &Score) {
        self.home_goals += score.home as u32;
        self.away_goals += score.away as u32;
        self.matches += 1;
    }

    pub fn matches(&self) -> u32 {
        self.matches
    }

    /// Averages to date, or the defaults before any match.
    pub fn averages(&self) -> LeagueAverages {
        if self.matches == 0 {
            LeagueAverages::default()
        } else {
            LeagueAverages {
                home_goals: self.home_goals as f64 / self.matches as f64,
                away_goals: self.away_goals as f64 / self.matches as f64,
            }
        }
    }
}

#[derive(Debug, Default)]
struct LeagueState {
    tracker: LeagueTracker,
    teams: FxHashMap<String, TeamTracker>,
}

/// Trackers for every league and team seen so far. Teams are tracked per league.
#[derive(Debug, Default)]
pub struct Trackers {
    leagues: FxHashMap<String, LeagueState>,
}
impl Trackers {
    pub fn team(&self, league: &str, team: &str) -> Option<&TeamTracker> {
        self.leagues.get(league).and_then(|state| state.teams.get(team))
    }

    pub fn league(&self, league: &str) -> Option<&LeagueTracker> {
        self.leagues.get(league).map(|state| &state.tracker)
    }

    /// Shrunk strengths of the two sides of `record` as of the results tracked so far, along
    /// with the league averages they are relative to. `None` if either side has played fewer
    /// than `min_matches` at its venue.
    pub fn strengths(&self, record: &MatchRecord, min_matches: u32, k: f64) -> Option<(MatchStrengths, LeagueAverages)> {
        let unseen = TeamTracker::default();
        let home = self.team(&record.league, &record.home_team).unwrap_or(&unseen);
        let away = self.team(&record.league, &record.away_team).unwrap_or(&unseen);
        if home.matches(Side::Home) < min_matches || away.matches(Side::Away) < min_matches {
            return None;
        }

        let averages = self
            .league(&record.league)
            .map(LeagueTracker::averages)
            .unwrap_or_default();
        let (avg_home, avg_away) = (averages.home_goals, averages.away_goals);
        let (home_scored, home_conceded) = home.averages(Side::Home, (avg_home, avg_away));
        let (away_scored, away_conceded) = away.averages(Side::Away, (avg_away, avg_home));
        let (home_n, away_n) = (home.matches(Side::Home), away.matches(Side::Away));

        let strengths = MatchStrengths {
            home_attack: shrink(home_scored, avg_home, home_n, k),
            home_defence: shrink(home_conceded, avg_away, home_n, k),
            away_attack: shrink(away_scored, avg_away, away_n, k),
            away_defence: shrink(away_conceded, avg_home, away_n, k),
            home_form: home.form(),
            away_form: away.form(),
        };
        Some((strengths, averages))
    }

    /// Folds the result of `record` into the league and both teams.
    pub fn update(&mut self, record: &MatchRecord) {
        let state = self.leagues.entry(record.league.clone()).or_default();
        state.tracker.update(&record.score);
        for (team, side) in [(&record.home_team, Side::Home), (&record.away_team, Side::Away)] {
            state.teams.entry(team.clone()).or_default().update(&record.score, side);
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::MarketOdds;

    fn record(home_team: &str, away_team: &str, home: u8, away: u8) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2023, 8, 12).unwrap(),
            league: "E0".into(),
            home_team: home_team.into(),
            away_team: away_team.into(),
            score: Score::new(home, away),
            odds: MarketOdds::default(),
            closing: MarketOdds::default(),
        }
    }

    #[test]
    fn team_form_window() {
        let mut tracker = TeamTracker::default();
        assert_eq!(NEUTRAL_FORM, tracker.form());
        tracker.update(&Score::new(0, 1), Side::Home);
        assert_eq!(0.0, tracker.form());
        tracker.update(&Score::new(0, 1), Side::Away);
        assert_float_absolute_eq!(0.5, tracker.form());
        for _ in 0..5 {
            tracker.update(&Score::new(1, 1), Side::Home);
        }
        assert_float_absolute_eq!(1.0 / 3.0, tracker.form());
        assert_eq!(6, tracker.matches(Side::Home));
        assert_eq!(1, tracker.matches(Side::Away));
    }

    #[test]
    fn league_averages() {
        let mut tracker = LeagueTracker::default();
        assert_eq!(LeagueAverages::default(), tracker.averages());
        tracker.update(&Score::new(3, 1));
        tracker.update(&Score::new(1, 0));
        assert_eq!(2, tracker.matches());
        assert_eq!(
            LeagueAverages {
                home_goals: 2.0,
                away_goals: 0.5
            },
            tracker.averages()
        );
    }

    #[test]
    fn strengths_require_min_matches_per_venue() {
        let mut trackers = Trackers::default();
        trackers.update(&record("Arsenal", "Chelsea", 2, 0));
        let fixture = record("Arsenal", "Fulham", 0, 0);
        assert!(trackers.strengths(&fixture, 1, 50.0).is_none());

        trackers.update(&record("Brentford", "Fulham", 1, 1));
        let (strengths, averages) = trackers.strengths(&fixture, 1, 0.0).unwrap();
        assert_float_absolute_eq!(1.5, averages.home_goals);
        assert_float_absolute_eq!(0.5, averages.away_goals);
        assert_float_absolute_eq!(2.0, strengths.home_attack);
        assert_float_absolute_eq!(0.0, strengths.home_defence);
        assert_float_absolute_eq!(1.0, strengths.away_attack);
        assert_float_absolute_eq!(1.0, strengths.away_defence);
        assert_float_absolute_eq!(1.0, strengths.home_form);
        assert_float_absolute_eq!(1.0 / 3.0, strengths.away_form);

        // a venue other than the one played does not count
        let reversed = record("Fulham", "Arsenal", 0, 0);
        assert!(trackers.strengths(&reversed, 1, 50.0).is_none());
    }

    #[test]
    fn unseen_teams_take_league_average() {
        let mut trackers = Trackers::default();
        trackers.update(&record("Arsenal", "Chelsea", 2, 0));
        let (strengths, averages) = trackers.strengths(&record("Everton", "Wolves", 0, 0), 0, 50.0).unwrap();
        assert_float_absolute_eq!(averages.home_goals, strengths.home_attack);
        assert_float_absolute_eq!(averages.away_goals, strengths.home_defence);
        assert_float_absolute_eq!(averages.away_goals, strengths.away_attack);
        assert_float_absolute_eq!(averages.home_goals, strengths.away_defence);
    }

    #[test]
    fn teams_tracked_per_league() {
        let mut trackers = Trackers::default();
        trackers.update(&record("Arsenal", "Chelsea", 2, 0));
        let mut other = record("Arsenal", "Celtic", 1, 0);
        other.league = "SC0".into();
        trackers.update(&other);
        assert_eq!(1, trackers.team("E0", "Arsenal").unwrap().matches(Side::Home));
        assert_eq!(1, trackers.team("SC0", "Arsenal").unwrap().matches(Side::Home));
        assert_eq!(1, trackers.league("SC0").unwrap().matches());
    }
}
