//! Run orchestration: season selection, per-season extract/transform/load,
//! and run bookkeeping.

pub mod precheck;

use std::fmt;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::client::{ApiClient, ApiError, Transport, UreqTransport};
use crate::db::{Database, DbError};
use crate::extract::{self, RawArchive};
use crate::transform::{self, SeasonData, TransformError};

#[derive(Error, Debug)]
pub enum SeasonError {
    #[error("Extraction failed: {0}")]
    Api(#[from] ApiError),
    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),
    #[error("Load failed: {0}")]
    Db(#[from] DbError),
}

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid run request: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Season range and incremental target.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub start_season: i32,
    pub end_season: i32,
    pub current_season: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Every season in the configured range, or the given list.
    Backfill,
    /// Exactly the given seasons.
    Season,
    /// The current season only.
    Incremental,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Backfill => "backfill",
            RunMode::Season => "season",
            RunMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Partial => "PARTIAL",
            RunStatus::Failed => "FAILED",
        }
    }

    /// Outcome of a run that attempted `requested` seasons.
    pub fn from_counts(processed: usize, requested: usize) -> Self {
        if processed == requested && requested > 0 {
            RunStatus::Success
        } else if processed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub mode: RunMode,
    pub seasons_processed: Vec<i32>,
    /// Seasons that failed, with the error text.
    pub failures: Vec<(i32, String)>,
    pub total_races: usize,
    /// Drivers inserted or updated.
    pub total_drivers: usize,
    /// Constructors inserted or updated.
    pub total_constructors: usize,
    pub status: RunStatus,
    pub duration: Duration,
}

/// What one season contributed to the database.
#[derive(Debug, Default, Clone, Copy)]
struct SeasonLoad {
    races: usize,
    drivers: usize,
    constructors: usize,
}

pub struct Pipeline<'a, T: Transport = UreqTransport> {
    db: &'a Database,
    client: &'a ApiClient<T>,
    config: PipelineConfig,
}

impl<'a, T: Transport> Pipeline<'a, T> {
    pub fn new(db: &'a Database, client: &'a ApiClient<T>, config: PipelineConfig) -> Self {
        Self { db, client, config }
    }

    pub fn db(&self) -> &Database {
        self.db
    }

    pub fn client(&self) -> &ApiClient<T> {
        self.client
    }

    /// Run the pipeline. One failing season never stops the others.
    ///
    /// Run-fatal errors mark the run record FAILED and are returned.
    /// A run where every season failed returns `Ok` with [`RunStatus::Failed`].
    pub fn run(
        &self,
        mode: RunMode,
        seasons: Option<Vec<i32>>,
        raw: Option<&RawArchive>,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let run_id = self.db.create_run(mode.as_str(), RunStatus::Running.as_str())?;
        log::info!("Run {run_id} started (mode: {mode})");

        match self.execute(run_id, mode, seasons, raw, started) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                log::error!("Run {run_id} failed: {e}");
                let message = e.to_string();
                if let Err(db_err) =
                    self.db.finish_run(run_id, RunStatus::Failed.as_str(), &[], 0, Some(message.as_str()))
                {
                    log::error!("Could not record failure of run {run_id}: {db_err}");
                }
                Err(e)
            }
        }
    }

    /// Seasons a run in `mode` should process.
    pub fn determine_seasons(
        &self,
        mode: RunMode,
        seasons: Option<Vec<i32>>,
    ) -> Result<Vec<i32>, PipelineError> {
        let seasons = match (mode, seasons) {
            (RunMode::Season, None) => {
                return Err(PipelineError::Validation(
                    "season mode requires at least one season".to_string(),
                ));
            }
            (RunMode::Backfill, None) => (self.config.start_season..=self.config.end_season).collect(),
            (RunMode::Incremental, None) => vec![self.config.current_season],
            (_, Some(list)) => list,
        };

        if seasons.is_empty() {
            return Err(PipelineError::Validation(format!("no seasons to process for {mode} run")));
        }
        Ok(seasons)
    }

    fn execute(
        &self,
        run_id: i64,
        mode: RunMode,
        seasons: Option<Vec<i32>>,
        raw: Option<&RawArchive>,
        started: Instant,
    ) -> Result<RunSummary, PipelineError> {
        let seasons = self.determine_seasons(mode, seasons)?;
        log::info!("Processing {} season(s): {seasons:?}", seasons.len());

        let pb = ProgressBar::new(seasons.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut processed = Vec::new();
        let mut failures = Vec::new();
        let mut totals = SeasonLoad::default();

        for &season in &seasons {
            pb.set_message(format!("season {season}"));
            match self.process_season(season, raw) {
                Ok(load) => {
                    log::info!(
                        "Season {season} loaded: {} races, {} drivers, {} constructors",
                        load.races,
                        load.drivers,
                        load.constructors
                    );
                    processed.push(season);
                    totals.races += load.races;
                    totals.drivers += load.drivers;
                    totals.constructors += load.constructors;
                }
                Err(e) => {
                    log::error!("Season {season} failed: {e}");
                    failures.push((season, e.to_string()));
                }
            }
            pb.inc(1);
        }

        let status = RunStatus::from_counts(processed.len(), seasons.len());
        pb.finish_with_message(format!("{status}: {}/{} seasons", processed.len(), seasons.len()));

        let error_log = (!failures.is_empty()).then(|| {
            failures
                .iter()
                .map(|(season, e)| format!("{season}: {e}"))
                .collect::<Vec<_>>()
                .join("\n")
        });
        self.db
            .finish_run(run_id, status.as_str(), &processed, totals.races, error_log.as_deref())?;

        let duration = started.elapsed();
        log::info!("Run {run_id} finished with status {status} in {:.1}s", duration.as_secs_f64());

        Ok(RunSummary {
            run_id,
            mode,
            seasons_processed: processed,
            failures,
            total_races: totals.races,
            total_drivers: totals.drivers,
            total_constructors: totals.constructors,
            status,
            duration,
        })
    }

    fn process_season(&self, season: i32, raw: Option<&RawArchive>) -> Result<SeasonLoad, SeasonError> {
        log::info!("Season {season}: starting");
        let extract = extract::extract_season(self.client, season, raw)?;
        let data = transform::transform_season(&extract)?;
        Ok(self.load_season(&data)?)
    }

    /// Reference entities first, then each race with its scoped rows, then metrics.
    fn load_season(&self, data: &SeasonData) -> Result<SeasonLoad, DbError> {
        let drivers = self.db.upsert_drivers(&data.drivers)?;
        let constructors = self.db.upsert_constructors(&data.constructors)?;
        self.db.upsert_circuits(&data.circuits)?;

        let mut races = 0;
        for race in &data.races {
            let race_id = self.db.upsert_race(race)?;
            races += 1;

            // a round whose fetch failed keeps whatever was stored before
            if data.rounds.contains(&race.round) {
                let results: Vec<_> = data.results.iter().filter(|r| r.round == race.round).cloned().collect();
                let qualifying: Vec<_> =
                    data.qualifying.iter().filter(|q| q.round == race.round).cloned().collect();
                // an empty slice means nothing new for the round, not a wipe
                if !results.is_empty() {
                    self.db.replace_results(race_id, &results)?;
                }
                if !qualifying.is_empty() {
                    self.db.replace_qualifying(race_id, &qualifying)?;
                }
            }

            let driver_standings: Vec<_> =
                data.driver_standings.iter().filter(|s| s.round == race.round).cloned().collect();
            if !driver_standings.is_empty() {
                self.db.replace_driver_standings(race_id, &driver_standings)?;
            }
            let constructor_standings: Vec<_> =
                data.constructor_standings.iter().filter(|s| s.round == race.round).cloned().collect();
            if !constructor_standings.is_empty() {
                self.db.replace_constructor_standings(race_id, &constructor_standings)?;
            }
        }

        if data.driver_metrics.is_empty() || data.constructor_metrics.is_empty() {
            log::warn!("Season {}: no metrics computed, keeping stored metrics", data.season);
        }
        if !data.driver_metrics.is_empty() {
            self.db.replace_driver_metrics(data.season, &data.driver_metrics)?;
        }
        if !data.constructor_metrics.is_empty() {
            self.db.replace_constructor_metrics(data.season, &data.constructor_metrics)?;
        }

        Ok(SeasonLoad {
            races,
            drivers: drivers.total(),
            constructors: constructors.total(),
        })
    }
}
