use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use chrono::{NaiveDateTime, Utc};
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info};

use edgefinder::file::ReadJsonFile;
use edgefinder_soccer::domain::{MarketOdds, OutcomeType};
use edgefinder_soccer::feed::{league_code, read_csv_file, season_of};
use edgefinder_soccer::print;
use edgefinder_soccer::rating::{HistoricalResult, RatingBook, RatingConfig};
use edgefinder_soccer::scoregrid::ScorelineModel;
use edgefinder_soccer::signal::{describe, generate, Fixture, SignalConfig};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// home team
    #[clap(long)]
    home: String,

    /// away team
    #[clap(long)]
    away: String,

    /// league name or feed code
    #[clap(short = 'l', long, default_value = "EPL")]
    league: String,

    /// season by starting year; defaults to the latest in the history file, else the current one
    #[clap(short = 's', long)]
    season: Option<u16>,

    /// kick-off time, formatted as 2024-03-09T15:00:00
    #[clap(long)]
    kickoff: Option<NaiveDateTime>,

    /// results file to rate the teams from
    #[clap(long)]
    history: Option<PathBuf>,

    /// prices as comma-separated outcome=price pairs, e.g., home=2.1,draw=3.4,away=3.6
    #[clap(short = 'o', long)]
    odds: Option<String>,

    /// signal config file
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// override the model used for rated teams
    #[clap(short = 'm', long, value_parser = parse_model)]
    model: Option<ScorelineModel>,

    /// print the scoreline distribution
    #[clap(long = "score-matrix")]
    score_matrix: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.home == self.away {
            bail!("home and away teams must differ");
        }
        Ok(())
    }
}

fn parse_model(s: &str) -> anyhow::Result<ScorelineModel> {
    match s {
        "bivariate_poisson" | "bivariate" => Ok(ScorelineModel::bivariate_poisson()),
        "dixon_coles" => Ok(ScorelineModel::dixon_coles()),
        other => bail!("unsupported model {other}"),
    }
}

fn parse_odds(s: &str) -> anyhow::Result<MarketOdds> {
    s.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (outcome, price) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed price {pair}, expected outcome=price"))?;
            let outcome = OutcomeType::from_str(outcome.trim())?;
            let price = price.trim().parse::<f64>()?;
            Ok((outcome, price))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let mut config = match &args.config {
        None => SignalConfig::default(),
        Some(path) => SignalConfig::read_json_file(path)?,
    };
    if let Some(model) = args.model {
        config.rated_model = model;
    }
    config.validate()?;

    let league = league_code(&args.league).to_string();
    let odds = args.odds.as_deref().map(parse_odds).transpose()?.unwrap_or_default();

    let mut book = RatingBook::default();
    let mut season = args.season;
    if let Some(path) = &args.history {
        let matches = read_csv_file(&league, path)?;
        let latest = matches.iter().map(|record| record.season()).max();
        let season = *season.get_or_insert(latest.unwrap_or_else(|| season_of(Utc::now().date_naive())));
        let results: Vec<_> = matches
            .iter()
            .filter(|record| record.league == league && record.season() == season)
            .map(|record| HistoricalResult {
                date: record.date,
                home_team: record.home_team.clone(),
                away_team: record.away_team.clone(),
                home_score: record.score.home as f64,
                away_score: record.score.away as f64,
            })
            .collect();
        let rated = book.refresh_league(&league, season, &results, &RatingConfig::default());
        info!("rated {rated} teams from {} results", results.len());
    }

    let fixture = Fixture {
        home_team: args.home.clone(),
        away_team: args.away.clone(),
        league,
        season: season.unwrap_or_else(|| season_of(Utc::now().date_naive())),
        kickoff: args.kickoff,
    };
    let set = generate(&fixture, &odds, &book, &config);
    info!(
        "{} v {}: expected goals {:.2}-{:.2} from {}",
        fixture.home_team, fixture.away_team, set.model.expected_goals.home, set.model.expected_goals.away, set.source
    );
    info!(
        "Model:\n{}",
        Console::default().render(&print::tabulate_model_output(&set.model, &odds))
    );
    if args.score_matrix {
        info!(
            "Scorelines (%):\n{}",
            Console::default().render(&print::tabulate_score_matrix(&set.model.score_matrix))
        );
    }
    if !set.signals.is_empty() {
        info!(
            "Value:\n{}",
            Console::default().render(&print::tabulate_signals(&set.signals))
        );
    }
    info!("{}", describe(&fixture, &odds, &set, config.edge.threshold));
    Ok(())
}
