//! Batch checks on cleaned records.
//!
//! Every rule runs over the whole batch before anything is reported.
//! Hard errors fail the batch with a [`DataValidationError`] listing all
//! of them; warnings are logged and returned in the [`ValidationReport`].

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

use crate::records::{
    ConstructorSeasonMetrics, ConstructorStanding, DriverSeasonMetrics, DriverStanding,
    Qualifying, Race, RaceResult,
};

const MIN_SEASON: i32 = 1950;
const MAX_SEASON: i32 = 2030;
const MAX_POSITION: i32 = 30;

#[derive(Error, Debug)]
#[error("{entity} validation failed with {} error(s): {}", violations.len(), violations.join("; "))]
pub struct DataValidationError {
    pub entity: &'static str,
    pub violations: Vec<String>,
}

/// Outcome of a batch that passed: the soft findings, already logged.
#[derive(Debug)]
pub struct ValidationReport {
    pub entity: &'static str,
    pub rows: usize,
    pub warnings: Vec<String>,
}

pub type Result = std::result::Result<ValidationReport, DataValidationError>;

struct Findings {
    entity: &'static str,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn require(&mut self, row: usize, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.error(format!("row {row}: missing {field}"));
        }
    }

    /// Flags every repeat of a natural key after its first occurrence.
    fn unique<K: Eq + Hash + Debug>(&mut self, keys: impl IntoIterator<Item = K>) {
        let mut seen = HashSet::new();
        for key in keys {
            if seen.contains(&key) {
                self.error(format!("duplicate key {key:?}"));
            } else {
                seen.insert(key);
            }
        }
    }

    fn finish(self, rows: usize) -> Result {
        for w in &self.warnings {
            log::warn!("{} validation: {w}", self.entity);
        }
        if self.errors.is_empty() {
            log::debug!(
                "{} validation passed ({rows} rows, {} warnings)",
                self.entity,
                self.warnings.len()
            );
            Ok(ValidationReport {
                entity: self.entity,
                rows,
                warnings: self.warnings,
            })
        } else {
            for e in &self.errors {
                log::error!("{} validation: {e}", self.entity);
            }
            Err(DataValidationError {
                entity: self.entity,
                violations: self.errors,
            })
        }
    }
}

pub fn validate_races(races: &[Race]) -> Result {
    let mut f = Findings::new("races");
    for (i, r) in races.iter().enumerate() {
        f.require(i, "name", &r.name);
        f.require(i, "circuit_id", &r.circuit_id);
        if r.date.is_none() {
            f.error(format!("row {i}: missing date"));
        }
        if r.season < MIN_SEASON {
            f.error(format!("row {i}: season {} before {MIN_SEASON}", r.season));
        } else if r.season > MAX_SEASON {
            f.warn(format!("row {i}: season {} after {MAX_SEASON}", r.season));
        }
        if r.round < 1 {
            f.error(format!("row {i}: round {} < 1", r.round));
        }
    }
    f.unique(races.iter().map(|r| (r.season, r.round)));
    f.finish(races.len())
}

pub fn validate_results(results: &[RaceResult]) -> Result {
    let mut f = Findings::new("results");
    for (i, r) in results.iter().enumerate() {
        f.require(i, "driver_id", &r.driver_id);
        f.require(i, "constructor_id", &r.constructor_id);
        f.require(i, "position_text", &r.position_text);
        if let Some(p) = r.position() {
            if !(1..=MAX_POSITION).contains(&p) {
                f.warn(format!("row {i}: position {p} outside 1-{MAX_POSITION}"));
            }
        }
        if r.points < 0.0 {
            f.error(format!("row {i}: negative points {}", r.points));
        }
        if !(0..=MAX_POSITION).contains(&r.grid) {
            f.warn(format!("row {i}: grid {} outside 0-{MAX_POSITION}", r.grid));
        }
        if r.laps < 0 {
            f.error(format!("row {i}: negative laps {}", r.laps));
        }
    }
    f.unique(results.iter().map(|r| (r.season, r.round, r.driver_id.as_str())));
    f.finish(results.len())
}

pub fn validate_qualifying(entries: &[Qualifying]) -> Result {
    let mut f = Findings::new("qualifying");
    for (i, q) in entries.iter().enumerate() {
        f.require(i, "driver_id", &q.driver_id);
        f.require(i, "constructor_id", &q.constructor_id);
        if q.position < 1 {
            f.error(format!("row {i}: position {} < 1", q.position));
        } else if q.position > MAX_POSITION {
            f.warn(format!("row {i}: position {} above {MAX_POSITION}", q.position));
        }
    }
    f.unique(entries.iter().map(|q| (q.season, q.round, q.driver_id.as_str())));
    f.finish(entries.len())
}

pub fn validate_driver_standings(entries: &[DriverStanding]) -> Result {
    let mut f = Findings::new("driver standings");
    for (i, s) in entries.iter().enumerate() {
        f.require(i, "driver_id", &s.driver_id);
        standing_numbers(&mut f, i, s.points, s.wins);
    }
    f.unique(entries.iter().map(|s| (s.season, s.round, s.driver_id.as_str())));
    f.finish(entries.len())
}

pub fn validate_constructor_standings(entries: &[ConstructorStanding]) -> Result {
    let mut f = Findings::new("constructor standings");
    for (i, s) in entries.iter().enumerate() {
        f.require(i, "constructor_id", &s.constructor_id);
        standing_numbers(&mut f, i, s.points, s.wins);
    }
    f.unique(entries.iter().map(|s| (s.season, s.round, s.constructor_id.as_str())));
    f.finish(entries.len())
}

fn standing_numbers(f: &mut Findings, row: usize, points: f64, wins: i32) {
    if points < 0.0 {
        f.error(format!("row {row}: negative points {points}"));
    }
    if wins < 0 {
        f.error(format!("row {row}: negative wins {wins}"));
    }
}

pub fn validate_driver_metrics(metrics: &[DriverSeasonMetrics]) -> Result {
    let mut f = Findings::new("driver metrics");
    for (i, m) in metrics.iter().enumerate() {
        let id = &m.driver_id;
        f.require(i, "driver_id", id);
        if m.total_points < 0.0 {
            f.error(format!("{id}: negative total_points {}", m.total_points));
        }
        if m.consistency_score < 0.0 {
            f.error(format!("{id}: negative consistency_score {}", m.consistency_score));
        }
        if m.races_finished > m.races_entered {
            f.error(format!(
                "{id}: races_finished {} > races_entered {}",
                m.races_finished, m.races_entered
            ));
        }
        if m.wins > m.podiums {
            f.warn(format!("{id}: wins {} > podiums {}", m.wins, m.podiums));
        }
        if m.podiums > m.races_finished {
            f.warn(format!(
                "{id}: podiums {} > races_finished {}",
                m.podiums, m.races_finished
            ));
        }
    }
    f.unique(metrics.iter().map(|m| (m.driver_id.as_str(), m.season)));
    f.finish(metrics.len())
}

pub fn validate_constructor_metrics(metrics: &[ConstructorSeasonMetrics]) -> Result {
    let mut f = Findings::new("constructor metrics");
    for (i, m) in metrics.iter().enumerate() {
        let id = &m.constructor_id;
        f.require(i, "constructor_id", id);
        if m.total_points < 0.0 {
            f.error(format!("{id}: negative total_points {}", m.total_points));
        }
        if !(0.0..=100.0).contains(&m.reliability_rate) {
            f.error(format!("{id}: reliability_rate {} outside 0-100", m.reliability_rate));
        }
        if m.wins > m.podiums {
            f.warn(format!("{id}: wins {} > podiums {}", m.wins, m.podiums));
        }
    }
    f.unique(metrics.iter().map(|m| (m.constructor_id.as_str(), m.season)));
    f.finish(metrics.len())
}
