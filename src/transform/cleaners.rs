//! Type coercion and null normalization for parsed rows.
//!
//! Blank strings become `None`. A position that is not a number ("R",
//! "D", "W", missing) becomes [`Finish::Unclassified`], never an error.

use std::collections::HashSet;

use chrono::NaiveDate;

use super::parsers::{
    ConstructorInfo, DriverInfo, ParsedConstructorStanding, ParsedDriverStanding,
    ParsedQualifying, ParsedRace, ParsedResult,
};
use crate::records::{
    Circuit, Constructor, ConstructorStanding, Driver, DriverStanding, Finish, Qualifying, Race,
    RaceResult,
};

pub fn clean_races(races: Vec<ParsedRace>) -> Vec<Race> {
    let cleaned: Vec<Race> = races
        .into_iter()
        .map(|r| Race {
            season: r.season,
            round: r.round,
            date: r.date.as_deref().and_then(parse_date),
            time: non_blank(r.time).map(|t| t.trim_end_matches('Z').to_string()),
            circuit_id: r.circuit.circuit_id,
            url: non_blank(r.url),
            name: r.name,
        })
        .collect();
    log::debug!("Cleaned {} races", cleaned.len());
    cleaned
}

/// Distinct circuits referenced by a race schedule, first occurrence wins.
pub fn circuits_from_races(races: &[ParsedRace]) -> Vec<Circuit> {
    let mut seen = HashSet::new();
    races
        .iter()
        .filter(|r| !r.circuit.circuit_id.is_empty() && seen.insert(r.circuit.circuit_id.clone()))
        .map(|r| {
            let c = r.circuit.clone();
            Circuit {
                lat: c.lat.as_deref().and_then(parse_f64),
                long: c.long.as_deref().and_then(parse_f64),
                circuit_id: c.circuit_id,
                name: non_blank(c.name),
                locality: non_blank(c.locality),
                country: non_blank(c.country),
                url: non_blank(c.url),
            }
        })
        .collect()
}

pub fn clean_results(results: Vec<ParsedResult>) -> Vec<RaceResult> {
    let cleaned: Vec<RaceResult> = results
        .into_iter()
        .map(|r| {
            let finish = Finish::from(r.position.as_deref().and_then(parse_i32));
            RaceResult {
                season: r.season,
                round: r.round,
                driver_id: r.driver.driver_id,
                constructor_id: r.constructor.constructor_id,
                number: r.number.as_deref().and_then(parse_i32),
                grid: r.grid,
                position_change: finish.position().map(|p| r.grid - p),
                finish,
                position_text: r.position_text,
                position_order: r.position_order,
                points: r.points,
                laps: r.laps,
                status: non_blank(r.status),
                time_millis: r.time_millis.as_deref().and_then(|v| v.trim().parse().ok()),
                fastest_lap: r.fastest_lap.as_deref().and_then(parse_i32),
                fastest_lap_rank: r.fastest_lap_rank.as_deref().and_then(parse_i32),
                fastest_lap_time: non_blank(r.fastest_lap_time),
                fastest_lap_speed: r.fastest_lap_speed.as_deref().and_then(parse_f64),
            }
        })
        .collect();
    log::debug!("Cleaned {} results", cleaned.len());
    cleaned
}

pub fn clean_qualifying(entries: Vec<ParsedQualifying>) -> Vec<Qualifying> {
    entries
        .into_iter()
        .map(|q| Qualifying {
            season: q.season,
            round: q.round,
            driver_id: q.driver.driver_id,
            constructor_id: q.constructor.constructor_id,
            position: q.position,
            q1: non_blank(q.q1),
            q2: non_blank(q.q2),
            q3: non_blank(q.q3),
        })
        .collect()
}

pub fn clean_driver_standings(entries: Vec<ParsedDriverStanding>) -> Vec<DriverStanding> {
    entries
        .into_iter()
        .map(|s| DriverStanding {
            season: s.season,
            round: s.round,
            driver_id: s.driver.driver_id,
            position: s.position.as_deref().and_then(parse_i32),
            position_text: s.position_text,
            points: s.points,
            wins: s.wins,
        })
        .collect()
}

pub fn clean_constructor_standings(
    entries: Vec<ParsedConstructorStanding>,
) -> Vec<ConstructorStanding> {
    entries
        .into_iter()
        .map(|s| ConstructorStanding {
            season: s.season,
            round: s.round,
            constructor_id: s.constructor.constructor_id,
            position: s.position.as_deref().and_then(parse_i32),
            position_text: s.position_text,
            points: s.points,
            wins: s.wins,
        })
        .collect()
}

/// Distinct drivers from any mix of driver blocks, first occurrence wins.
pub fn collect_drivers<'a>(blocks: impl IntoIterator<Item = &'a DriverInfo>) -> Vec<Driver> {
    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .filter(|d| !d.driver_id.is_empty() && seen.insert(d.driver_id.clone()))
        .map(|d| Driver {
            driver_id: d.driver_id.clone(),
            number: d.permanent_number.as_deref().and_then(parse_i32),
            code: non_blank(d.code.clone()),
            forename: non_blank(d.given_name.clone()),
            surname: non_blank(d.family_name.clone()),
            date_of_birth: d.date_of_birth.as_deref().and_then(parse_date),
            nationality: non_blank(d.nationality.clone()),
            url: non_blank(d.url.clone()),
        })
        .collect()
}

/// Distinct constructors from any mix of constructor blocks, first occurrence wins.
pub fn collect_constructors<'a>(
    blocks: impl IntoIterator<Item = &'a ConstructorInfo>,
) -> Vec<Constructor> {
    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .filter(|c| !c.constructor_id.is_empty() && seen.insert(c.constructor_id.clone()))
        .map(|c| Constructor {
            constructor_id: c.constructor_id.clone(),
            name: non_blank(c.name.clone()),
            nationality: non_blank(c.nationality.clone()),
            url: non_blank(c.url.clone()),
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_i32(value: &str) -> Option<i32> {
    value.trim().parse().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
