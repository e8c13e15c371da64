pub mod calculators;
pub mod cleaners;
pub mod parsers;
pub mod validators;

use thiserror::Error;

use crate::extract::SeasonExtract;
use crate::records::{
    Circuit, Constructor, ConstructorSeasonMetrics, ConstructorStanding, Driver,
    DriverSeasonMetrics, DriverStanding, Qualifying, Race, RaceResult,
};
use parsers::ParseError;
use validators::DataValidationError;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] DataValidationError),
}

/// Everything the loaders need for one season, cleaned and validated.
#[derive(Debug, Default)]
pub struct SeasonData {
    pub season: i32,
    /// Rounds whose results and qualifying were fetched.
    pub rounds: Vec<i32>,
    pub circuits: Vec<Circuit>,
    pub races: Vec<Race>,
    pub drivers: Vec<Driver>,
    pub constructors: Vec<Constructor>,
    pub results: Vec<RaceResult>,
    pub qualifying: Vec<Qualifying>,
    pub driver_standings: Vec<DriverStanding>,
    pub constructor_standings: Vec<ConstructorStanding>,
    pub driver_metrics: Vec<DriverSeasonMetrics>,
    pub constructor_metrics: Vec<ConstructorSeasonMetrics>,
    /// Soft validation findings across all batches.
    pub warnings: usize,
}

/// Parse, clean, validate and aggregate one season's raw payloads.
///
/// The first batch with hard validation errors aborts the season.
pub fn transform_season(extract: &SeasonExtract) -> Result<SeasonData, TransformError> {
    let season = extract.season;

    let parsed_races = parsers::parse_races(&extract.races)?;
    let circuits = cleaners::circuits_from_races(&parsed_races);
    let races = cleaners::clean_races(parsed_races);

    let mut parsed_results = Vec::new();
    let mut parsed_qualifying = Vec::new();
    for round in &extract.rounds {
        parsed_results.extend(parsers::parse_results(&round.results, season, round.round)?);
        parsed_qualifying.extend(parsers::parse_qualifying(&round.qualifying, season, round.round)?);
    }
    let parsed_driver_standings = parsers::parse_driver_standings(&extract.driver_standings, season)?;
    let parsed_constructor_standings =
        parsers::parse_constructor_standings(&extract.constructor_standings, season)?;

    let drivers = cleaners::collect_drivers(
        parsed_results
            .iter()
            .map(|r| &r.driver)
            .chain(parsed_qualifying.iter().map(|q| &q.driver))
            .chain(parsed_driver_standings.iter().map(|s| &s.driver)),
    );
    let constructors = cleaners::collect_constructors(
        parsed_results
            .iter()
            .map(|r| &r.constructor)
            .chain(parsed_qualifying.iter().map(|q| &q.constructor))
            .chain(parsed_constructor_standings.iter().map(|s| &s.constructor)),
    );

    let results = cleaners::clean_results(parsed_results);
    let qualifying = cleaners::clean_qualifying(parsed_qualifying);
    let driver_standings = cleaners::clean_driver_standings(parsed_driver_standings);
    let constructor_standings = cleaners::clean_constructor_standings(parsed_constructor_standings);

    let mut warnings = 0;
    warnings += validators::validate_races(&races)?.warnings.len();
    warnings += validators::validate_results(&results)?.warnings.len();
    warnings += validators::validate_qualifying(&qualifying)?.warnings.len();
    warnings += validators::validate_driver_standings(&driver_standings)?.warnings.len();
    warnings += validators::validate_constructor_standings(&constructor_standings)?.warnings.len();

    let driver_metrics = calculators::driver_season_metrics(&results, &qualifying);
    let constructor_metrics = calculators::constructor_season_metrics(&results);
    warnings += validators::validate_driver_metrics(&driver_metrics)?.warnings.len();
    warnings += validators::validate_constructor_metrics(&constructor_metrics)?.warnings.len();

    log::info!(
        "Transformed {season}: {} races, {} results, {} qualifying, {} drivers, {} constructors ({warnings} warnings)",
        races.len(),
        results.len(),
        qualifying.len(),
        drivers.len(),
        constructors.len(),
    );

    Ok(SeasonData {
        season,
        rounds: extract.rounds.iter().map(|r| r.round).collect(),
        circuits,
        races,
        drivers,
        constructors,
        results,
        qualifying,
        driver_standings,
        constructor_standings,
        driver_metrics,
        constructor_metrics,
        warnings,
    })
}
