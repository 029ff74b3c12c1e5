use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info, warn};

use edgefinder::csv::CsvWriter;
use edgefinder::file::{write_json, ReadJsonFile};
use edgefinder::timed::Timed;
use edgefinder_soccer::backtest::{BacktestConfig, BacktestReport, Trial};
use edgefinder_soccer::domain::MarketType;
use edgefinder_soccer::feed::{league_code, read_csv_file, season_code, MatchRecord};
use edgefinder_soccer::scoregrid::ScorelineModel;
use edgefinder_soccer::{backtest, print};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// directory of results files, laid out as <dir>/<season>/<league>.csv (e.g., data/2324/E0.csv)
    #[clap(short = 'd', long)]
    dir: Option<PathBuf>,

    /// results files to replay, instead of a directory
    #[clap(short = 'f', long = "file")]
    files: Vec<PathBuf>,

    /// backtest config file
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// override the seasons to replay, by starting year
    #[clap(short = 's', long, value_delimiter = ',')]
    seasons: Option<Vec<u16>>,

    /// override the leagues to replay
    #[clap(short = 'l', long, value_delimiter = ',')]
    leagues: Option<Vec<String>>,

    /// override the markets to bet, e.g., h2h,totals,btts
    #[clap(long, value_delimiter = ',')]
    markets: Option<Vec<MarketType>>,

    /// use the Dixon-Coles model in place of the bivariate Poisson
    #[clap(long = "dixon-coles")]
    dixon_coles: bool,

    /// override the minimum number of bets for a trial to qualify
    #[clap(long = "min-bets")]
    min_bets: Option<usize>,

    /// number of best trials to print
    #[clap(long, default_value = "5")]
    top: usize,

    /// file to write the report to, as JSON
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// file to write the test bets to, as CSV
    #[clap(long)]
    bets: Option<PathBuf>,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.dir.is_none() && self.files.is_empty() || self.dir.is_some() && !self.files.is_empty() {
            bail!("either the -d or the -f flag must be specified");
        }
        Ok(())
    }
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

    let config = apply_overrides(
        match &args.config {
            None => BacktestConfig::default(),
            Some(path) => BacktestConfig::read_json_file(path)?,
        },
        &args,
    );
    debug!("config: {config:?}");

    let matches = read_matches(&args, &config)?;
    info!("loaded {} matches", matches.len());

    let timed = Timed::result(|| backtest::run(&config, matches))?;
    let report = timed.value;
    info!("backtest took {:.3}s", timed.elapsed.as_secs_f64());
    print_report(&report, args.top);

    if let Some(path) = &args.output {
        write_json(path, &report)?;
        info!("wrote report to {}", path.display());
    }
    if let Some(path) = &args.bets {
        write_bets(path, &report)?;
        info!("wrote {} bets to {}", report.ledger.len(), path.display());
    }
    Ok(())
}

fn apply_overrides(mut config: BacktestConfig, args: &Args) -> BacktestConfig {
    if let Some(seasons) = &args.seasons {
        config.seasons = seasons.clone();
    }
    if let Some(leagues) = &args.leagues {
        config.leagues = leagues.clone();
    }
    if let Some(markets) = &args.markets {
        config.markets = markets.clone();
    }
    if args.dixon_coles {
        config.model = ScorelineModel::dixon_coles();
    }
    if let Some(min_bets) = args.min_bets {
        config.min_bets = min_bets;
    }
    config
}

fn read_matches(args: &Args, config: &BacktestConfig) -> anyhow::Result<Vec<MatchRecord>> {
    let default_league = config.leagues.first().map(String::as_str).unwrap_or("EPL");
    let mut matches = vec![];
    match &args.dir {
        Some(dir) => {
            if config.seasons.is_empty() || config.leagues.is_empty() {
                bail!("replaying a directory requires the seasons and leagues to be named");
            }
            for season in &config.seasons {
                for league in &config.leagues {
                    let code = league_code(league);
                    let path = dir.join(season_code(*season)).join(format!("{code}.csv"));
                    if !path.exists() {
                        warn!("skipping missing {}", path.display());
                        continue;
                    }
                    let records = read_csv_file(code, &path)?;
                    debug!("read {} matches from {}", records.len(), path.display());
                    matches.extend(records);
                }
            }
        }
        None => {
            for path in &args.files {
                matches.extend(read_csv_file(league_code(default_league), path)?);
            }
        }
    }
    Ok(matches)
}

fn print_report(report: &BacktestReport, top: usize) {
    let summary = &report.summary;
    info!(
        "{} matches, split {:?}: {} train / {} test",
        summary.matches, summary.split.method, summary.split.train_matches, summary.split.test_matches
    );
    info!(
        "best of {} trials ({} qualifying): {:?}",
        summary.trials, summary.qualifying_trials, summary.best_params
    );

    let mut ranked: Vec<&Trial> = report.trials.iter().collect();
    ranked.sort_by(|a, b| b.metrics.roi.total_cmp(&a.metrics.roi));
    ranked.truncate(top);
    info!(
        "Top trials on the training split:\n{}",
        Console::default().render(&print::tabulate_trials(&ranked))
    );
    info!(
        "Training ROI {:.2}%, test ROI {:.2}% over {} bets",
        summary.train.roi, summary.test.roi, report.bets
    );
    info!(
        "Strategies:\n{}",
        Console::default().render(&print::tabulate_strategies(&report.strategies))
    );
    for (market, bins) in &report.calibration {
        info!(
            "Calibration ({market}):\n{}",
            Console::default().render(&print::tabulate_calibration(bins))
        );
    }
    if !report.edge_distribution.is_empty() {
        info!(
            "Edge distribution:\n{}",
            Console::default().render(&print::tabulate_edge_distribution(&report.edge_distribution))
        );
    }
    info!(
        "ROI by league:\n{}",
        Console::default().render(&print::tabulate_group_roi("League", &report.roi_by_league))
    );
    info!(
        "ROI by market:\n{}",
        Console::default().render(&print::tabulate_group_roi("Market", &report.roi_by_market))
    );
    info!(
        "CLV: {} bets, average {:.2}%, {:.2}% beat the close",
        summary.clv.count, summary.clv.avg_clv, summary.clv.positive_rate
    );
}

fn write_bets(path: &Path, report: &BacktestReport) -> anyhow::Result<()> {
    let mut writer = CsvWriter::create(path)?;
    writer.append([
        "date",
        "league",
        "home_team",
        "away_team",
        "market",
        "outcome",
        "probability",
        "odds",
        "edge",
        "won",
        "clv",
    ])?;
    for bet in &report.ledger {
        writer.append([
            bet.date.to_string(),
            bet.league.clone(),
            bet.home_team.clone(),
            bet.away_team.clone(),
            bet.market.to_string(),
            bet.outcome.to_string(),
            format!("{:.4}", bet.probability),
            format!("{:.2}", bet.odds),
            format!("{:.4}", bet.edge),
            bet.won.to_string(),
            bet.clv.map(|clv| format!("{clv:.4}")).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
