//! Incremental pre-check: only run when the API has a newer completed race
//! than the database.

use super::{Pipeline, PipelineError, RunMode, RunSummary};
use crate::client::Transport;
use crate::extract::{self, RawArchive};

#[derive(Debug)]
pub enum PrecheckOutcome {
    /// Nothing new upstream; no run was started.
    UpToDate {
        stored: Option<(i32, i32)>,
        latest: Option<(i32, i32)>,
    },
    Ran(RunSummary),
}

/// Whether the API's latest completed race is strictly ahead of the stored one.
pub fn should_run(stored: Option<(i32, i32)>, latest: Option<(i32, i32)>) -> bool {
    match (stored, latest) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(stored), Some(latest)) => latest > stored,
    }
}

/// Compare stored and upstream latest races, then run the incremental
/// pipeline for the upstream season when the database is behind.
pub fn run_if_stale<T: Transport>(
    pipeline: &Pipeline<'_, T>,
    raw: Option<&RawArchive>,
) -> Result<PrecheckOutcome, PipelineError> {
    let stored = pipeline.db().latest_stored_race()?;
    let latest = extract::latest_completed_race(pipeline.client())?;
    log::info!("Latest stored race: {stored:?}, latest completed upstream: {latest:?}");

    match latest {
        Some((season, _)) if should_run(stored, latest) => {
            let summary = pipeline.run(RunMode::Incremental, Some(vec![season]), raw)?;
            Ok(PrecheckOutcome::Ran(summary))
        }
        _ => {
            log::info!("Database is up to date, skipping run");
            Ok(PrecheckOutcome::UpToDate { stored, latest })
        }
    }
}
