use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paddock::client::ApiClient;
use paddock::config::AppConfig;
use paddock::extract::RawArchive;
use paddock::pipeline::precheck::{self, PrecheckOutcome};
use paddock::pipeline::{Pipeline, RunMode, RunStatus, RunSummary};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paddock", version, about = "Formula 1 statistics ETL")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, transform and load one or more seasons
    Run {
        /// Which seasons to process
        #[arg(long, value_enum, default_value = "incremental")]
        mode: RunMode,

        /// Explicit seasons (required for --mode season)
        #[arg(long, num_args = 1..)]
        seasons: Vec<i32>,

        /// Archive raw API payloads to disk
        #[arg(long)]
        save_raw: bool,

        /// Where raw payloads go (defaults to config raw_dir)
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },

    /// Run the incremental pipeline only if the API has a newer race
    Check {
        /// Archive raw API payloads to disk
        #[arg(long)]
        save_raw: bool,
    },

    /// List recent pipeline runs
    Runs {
        /// Number of runs
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show driver season metrics
    Drivers {
        #[arg(long)]
        season: i32,

        /// Number of results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Show constructor season metrics
    Constructors {
        #[arg(long)]
        season: i32,
    },

    /// Show database statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(paddock::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = paddock::db::Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Run {
            mode,
            seasons,
            save_raw,
            raw_dir,
        } => {
            let client = ApiClient::new(config.client_config());
            let pipeline = Pipeline::new(&db, &client, config.pipeline_config());
            let archive = (save_raw || config.save_raw)
                .then(|| RawArchive::new(raw_dir.unwrap_or_else(|| config.resolve_raw_dir())));
            let seasons = (!seasons.is_empty()).then_some(seasons);

            let summary = pipeline
                .run(mode, seasons, archive.as_ref())
                .context("Pipeline run failed")?;
            print_summary(&summary);
            if summary.status == RunStatus::Failed {
                std::process::exit(1);
            }
        }

        Commands::Check { save_raw } => {
            let client = ApiClient::new(config.client_config());
            let pipeline = Pipeline::new(&db, &client, config.pipeline_config());
            let archive = (save_raw || config.save_raw).then(|| RawArchive::new(config.resolve_raw_dir()));

            match precheck::run_if_stale(&pipeline, archive.as_ref()).context("Pre-check failed")? {
                PrecheckOutcome::UpToDate { stored, latest } => {
                    println!(
                        "Up to date: stored {}, upstream {}",
                        fmt_race(stored),
                        fmt_race(latest)
                    );
                }
                PrecheckOutcome::Ran(summary) => {
                    print_summary(&summary);
                    if summary.status == RunStatus::Failed {
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Runs { limit } => {
            let runs = db.recent_runs(limit).context("Failed to list runs")?;
            if runs.is_empty() {
                println!("No pipeline runs recorded.");
                return Ok(());
            }
            println!(
                "{:>5}  {:<12} {:<8} {:<20} {:<20} {:>6}  Seasons",
                "ID", "Mode", "Status", "Started", "Finished", "Races"
            );
            println!("{}", "-".repeat(90));
            for run in &runs {
                let seasons = run
                    .seasons_processed
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                println!(
                    "{:>5}  {:<12} {:<8} {:<20} {:<20} {:>6}  {}",
                    run.id,
                    run.mode,
                    run.status,
                    run.started_at,
                    run.finished_at.as_deref().unwrap_or("-"),
                    run.races_added,
                    seasons
                );
                if let Some(errors) = &run.error_log {
                    for line in errors.lines() {
                        println!("         ! {line}");
                    }
                }
            }
        }

        Commands::Drivers { season, limit } => {
            let rows = db
                .driver_metrics_for_season(season, limit)
                .context("Failed to query driver metrics")?;
            if rows.is_empty() {
                println!("No driver metrics for {season}.");
                return Ok(());
            }
            println!(
                "{:<25} {:>5} {:>4} {:>4} {:>4} {:>4} {:>7} {:>8} {:>6}",
                "Driver", "Races", "Wins", "Pod", "Pole", "DNF", "AvgFin", "Points", "Cons"
            );
            println!("{}", "-".repeat(78));
            for r in &rows {
                println!(
                    "{:<25} {:>5} {:>4} {:>4} {:>4} {:>4} {:>7} {:>8.1} {:>6.2}",
                    truncate(if r.name.is_empty() { &r.driver_ref } else { &r.name }, 25),
                    r.races_entered,
                    r.wins,
                    r.podiums,
                    r.poles,
                    r.dnf_count,
                    r.avg_finish_position.map_or("-".to_string(), |p| format!("{p:.2}")),
                    r.total_points,
                    r.consistency_score
                );
            }
        }

        Commands::Constructors { season } => {
            let rows = db
                .constructor_metrics_for_season(season)
                .context("Failed to query constructor metrics")?;
            if rows.is_empty() {
                println!("No constructor metrics for {season}.");
                return Ok(());
            }
            println!(
                "{:<25} {:>5} {:>4} {:>4} {:>4} {:>5} {:>8} {:>7}",
                "Constructor", "Races", "Wins", "Pod", "1-2", "2xDNF", "Points", "Rel%"
            );
            println!("{}", "-".repeat(72));
            for r in &rows {
                println!(
                    "{:<25} {:>5} {:>4} {:>4} {:>4} {:>5} {:>8.1} {:>7.2}",
                    truncate(&r.name, 25),
                    r.races_entered,
                    r.wins,
                    r.podiums,
                    r.one_two_finishes,
                    r.double_dnf,
                    r.total_points,
                    r.reliability_rate
                );
            }
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Database Statistics");
            println!("===================");
            println!("Circuits:               {}", stats.circuits);
            println!("Drivers:                {}", stats.drivers);
            println!("Constructors:           {}", stats.constructors);
            println!("Races:                  {}", stats.races);
            println!("Results:                {}", stats.results);
            println!("Qualifying:             {}", stats.qualifying);
            println!("Driver standings:       {}", stats.driver_standings);
            println!("Constructor standings:  {}", stats.constructor_standings);
            println!("Driver metrics:         {}", stats.driver_metrics);
            println!("Constructor metrics:    {}", stats.constructor_metrics);
            println!("Latest stored race:     {}", fmt_race(stats.latest_race));
            println!();

            if !stats.seasons.is_empty() {
                println!("Races per season:");
                for (season, count) in &stats.seasons {
                    println!("  {season}  {count}");
                }
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run {} ({}) finished: {}", summary.run_id, summary.mode, summary.status);
    println!(
        "  Seasons processed: {}",
        if summary.seasons_processed.is_empty() {
            "none".to_string()
        } else {
            summary
                .seasons_processed
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    );
    println!("  Races:             {}", summary.total_races);
    println!("  Drivers:           {}", summary.total_drivers);
    println!("  Constructors:      {}", summary.total_constructors);
    println!("  Duration:          {:.1}s", summary.duration.as_secs_f64());
    for (season, error) in &summary.failures {
        println!("  Failed {season}: {error}");
    }
}

fn fmt_race(race: Option<(i32, i32)>) -> String {
    race.map_or("none".to_string(), |(season, round)| format!("{season} round {round}"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}…")
    }
}
