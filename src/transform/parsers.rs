//! Flatten the API's nested `MRData` envelopes into row structs.
//!
//! A missing envelope key or an empty list is not an error: the parser
//! logs a warning and returns no rows. A missing or malformed value in a
//! field the API always fills (season, round, grid, laps, points...) fails.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("missing required field {field}")]
    Missing { field: &'static str },
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("malformed {entity} payload: {source}")]
    Malformed {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Driver block as it appears in results, qualifying and standings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DriverInfo {
    pub driver_id: String,
    pub permanent_number: Option<String>,
    pub code: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstructorInfo {
    pub constructor_id: String,
    pub name: Option<String>,
    pub nationality: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircuitInfo {
    pub circuit_id: String,
    pub name: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
    pub lat: Option<String>,
    pub long: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRace {
    pub season: i32,
    pub round: i32,
    pub name: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub url: Option<String>,
    pub circuit: CircuitInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult {
    pub season: i32,
    pub round: i32,
    pub driver: DriverInfo,
    pub constructor: ConstructorInfo,
    pub number: Option<String>,
    pub grid: i32,
    /// Raw classified position; absent or non-numeric for non-finishers.
    pub position: Option<String>,
    pub position_text: String,
    pub position_order: i32,
    pub points: f64,
    pub laps: i32,
    pub status: Option<String>,
    pub time_millis: Option<String>,
    pub fastest_lap: Option<String>,
    pub fastest_lap_rank: Option<String>,
    pub fastest_lap_time: Option<String>,
    pub fastest_lap_speed: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQualifying {
    pub season: i32,
    pub round: i32,
    pub driver: DriverInfo,
    pub constructor: ConstructorInfo,
    pub position: i32,
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDriverStanding {
    pub season: i32,
    pub round: i32,
    pub driver: DriverInfo,
    pub position: Option<String>,
    pub position_text: String,
    pub points: f64,
    pub wins: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConstructorStanding {
    pub season: i32,
    pub round: i32,
    pub constructor: ConstructorInfo,
    pub position: Option<String>,
    pub position_text: String,
    pub points: f64,
    pub wins: i32,
}

// Wire shapes. Every scalar arrives as a JSON string.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiRace {
    season: Option<String>,
    round: Option<String>,
    #[serde(rename = "raceName")]
    race_name: Option<String>,
    date: Option<String>,
    time: Option<String>,
    url: Option<String>,
    #[serde(rename = "Circuit")]
    circuit: ApiCircuit,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiCircuit {
    circuit_id: String,
    circuit_name: Option<String>,
    url: Option<String>,
    #[serde(rename = "Location")]
    location: ApiLocation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiLocation {
    lat: Option<String>,
    long: Option<String>,
    locality: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiResult {
    number: Option<String>,
    position: Option<String>,
    position_text: Option<String>,
    position_order: Option<String>,
    points: Option<String>,
    grid: Option<String>,
    laps: Option<String>,
    status: Option<String>,
    #[serde(rename = "Time")]
    time: Option<ApiTime>,
    #[serde(rename = "FastestLap")]
    fastest_lap: Option<ApiFastestLap>,
    #[serde(rename = "Driver")]
    driver: DriverInfo,
    #[serde(rename = "Constructor")]
    constructor: ConstructorInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiTime {
    millis: Option<String>,
    time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiFastestLap {
    lap: Option<String>,
    rank: Option<String>,
    #[serde(rename = "Time")]
    time: Option<ApiTime>,
    #[serde(rename = "AverageSpeed")]
    average_speed: Option<ApiSpeed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSpeed {
    speed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiQualifying {
    position: Option<String>,
    #[serde(rename = "Q1")]
    q1: Option<String>,
    #[serde(rename = "Q2")]
    q2: Option<String>,
    #[serde(rename = "Q3")]
    q3: Option<String>,
    #[serde(rename = "Driver")]
    driver: DriverInfo,
    #[serde(rename = "Constructor")]
    constructor: ConstructorInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiDriverStanding {
    position: Option<String>,
    position_text: Option<String>,
    points: Option<String>,
    wins: Option<String>,
    #[serde(rename = "Driver")]
    driver: DriverInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiConstructorStanding {
    position: Option<String>,
    position_text: Option<String>,
    points: Option<String>,
    wins: Option<String>,
    #[serde(rename = "Constructor")]
    constructor: ConstructorInfo,
}

/// Parse the season schedule (`MRData.RaceTable.Races`).
pub fn parse_races(raw: &Value) -> Result<Vec<ParsedRace>> {
    let Some(races) = races_list(raw, "races") else {
        return Ok(Vec::new());
    };
    let races = decode::<ApiRace>(races, "races")?;

    let parsed = races
        .into_iter()
        .map(|r| {
            Ok(ParsedRace {
                season: int_field("season", r.season.as_deref())?,
                round: int_field("round", r.round.as_deref())?,
                name: r.race_name.unwrap_or_default(),
                date: r.date,
                time: r.time,
                url: r.url,
                circuit: CircuitInfo {
                    circuit_id: r.circuit.circuit_id,
                    name: r.circuit.circuit_name,
                    locality: r.circuit.location.locality,
                    country: r.circuit.location.country,
                    lat: r.circuit.location.lat,
                    long: r.circuit.location.long,
                    url: r.circuit.url,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Parsed {} races", parsed.len());
    Ok(parsed)
}

/// Parse one round's race classification (`Races[0].Results`).
pub fn parse_results(raw: &Value, season: i32, round: i32) -> Result<Vec<ParsedResult>> {
    let Some(results) = round_list(raw, "Results", season, round) else {
        return Ok(Vec::new());
    };
    let results = decode::<ApiResult>(results, "results")?;

    let parsed = results
        .into_iter()
        .map(|r| {
            let (fastest_lap, fastest_lap_rank, fastest_lap_time, fastest_lap_speed) =
                match r.fastest_lap {
                    Some(fl) => (
                        fl.lap,
                        fl.rank,
                        fl.time.and_then(|t| t.time),
                        fl.average_speed.and_then(|s| s.speed),
                    ),
                    None => (None, None, None, None),
                };

            Ok(ParsedResult {
                season,
                round,
                driver: r.driver,
                constructor: r.constructor,
                number: r.number,
                grid: int_field("grid", r.grid.as_deref())?,
                position: r.position,
                position_text: r.position_text.unwrap_or_default(),
                position_order: int_field("positionOrder", r.position_order.as_deref())?,
                points: float_field("points", r.points.as_deref())?,
                laps: int_field("laps", r.laps.as_deref())?,
                status: r.status,
                time_millis: r.time.and_then(|t| t.millis),
                fastest_lap,
                fastest_lap_rank,
                fastest_lap_time,
                fastest_lap_speed,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Parsed {} results for {season} round {round}", parsed.len());
    Ok(parsed)
}

/// Parse one round's qualifying classification (`Races[0].QualifyingResults`).
pub fn parse_qualifying(raw: &Value, season: i32, round: i32) -> Result<Vec<ParsedQualifying>> {
    let Some(entries) = round_list(raw, "QualifyingResults", season, round) else {
        return Ok(Vec::new());
    };
    let entries = decode::<ApiQualifying>(entries, "qualifying")?;

    let parsed = entries
        .into_iter()
        .map(|q| {
            Ok(ParsedQualifying {
                season,
                round,
                driver: q.driver,
                constructor: q.constructor,
                position: int_field("position", q.position.as_deref())?,
                q1: q.q1,
                q2: q.q2,
                q3: q.q3,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Parsed {} qualifying entries for {season} round {round}", parsed.len());
    Ok(parsed)
}

/// Parse a driver standings snapshot (`StandingsLists[0].DriverStandings`).
pub fn parse_driver_standings(raw: &Value, season: i32) -> Result<Vec<ParsedDriverStanding>> {
    let Some((round, entries)) = standings_list(raw, "DriverStandings", season)? else {
        return Ok(Vec::new());
    };
    let entries = decode::<ApiDriverStanding>(entries, "driver standings")?;

    let parsed = entries
        .into_iter()
        .map(|s| {
            Ok(ParsedDriverStanding {
                season,
                round,
                driver: s.driver,
                position: s.position,
                position_text: s.position_text.unwrap_or_default(),
                points: float_field("points", s.points.as_deref())?,
                wins: int_field("wins", s.wins.as_deref())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Parsed {} driver standings for {season}", parsed.len());
    Ok(parsed)
}

/// Parse a constructor standings snapshot (`StandingsLists[0].ConstructorStandings`).
pub fn parse_constructor_standings(
    raw: &Value,
    season: i32,
) -> Result<Vec<ParsedConstructorStanding>> {
    let Some((round, entries)) = standings_list(raw, "ConstructorStandings", season)? else {
        return Ok(Vec::new());
    };
    let entries = decode::<ApiConstructorStanding>(entries, "constructor standings")?;

    let parsed = entries
        .into_iter()
        .map(|s| {
            Ok(ParsedConstructorStanding {
                season,
                round,
                constructor: s.constructor,
                position: s.position,
                position_text: s.position_text.unwrap_or_default(),
                points: float_field("points", s.points.as_deref())?,
                wins: int_field("wins", s.wins.as_deref())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Parsed {} constructor standings for {season}", parsed.len());
    Ok(parsed)
}

fn races_list<'a>(raw: &'a Value, what: &str) -> Option<&'a Value> {
    match raw.pointer("/MRData/RaceTable/Races") {
        Some(races) if races.as_array().is_some_and(|a| !a.is_empty()) => Some(races),
        Some(_) => {
            log::warn!("No {what} in response (empty race list)");
            None
        }
        None => {
            log::warn!("Unexpected {what} payload: missing MRData.RaceTable.Races");
            None
        }
    }
}

fn round_list<'a>(raw: &'a Value, key: &str, season: i32, round: i32) -> Option<&'a Value> {
    let races = races_list(raw, key)?;
    match races.get(0).and_then(|race| race.get(key)) {
        Some(list) if list.as_array().is_some_and(|a| !a.is_empty()) => Some(list),
        _ => {
            log::warn!("No {key} for {season} round {round}");
            None
        }
    }
}

/// Returns the snapshot round and its entries.
fn standings_list<'a>(
    raw: &'a Value,
    key: &str,
    season: i32,
) -> Result<Option<(i32, &'a Value)>> {
    let Some(lists) = raw.pointer("/MRData/StandingsTable/StandingsLists") else {
        log::warn!("Unexpected {key} payload: missing MRData.StandingsTable.StandingsLists");
        return Ok(None);
    };
    let Some(list) = lists.get(0) else {
        log::warn!("No standings lists for {season}");
        return Ok(None);
    };
    let round = int_field("round", list.get("round").and_then(Value::as_str))?;
    match list.get(key) {
        Some(entries) if entries.as_array().is_some_and(|a| !a.is_empty()) => {
            Ok(Some((round, entries)))
        }
        _ => {
            log::warn!("No {key} for {season}");
            Ok(None)
        }
    }
}

fn decode<T: DeserializeOwned>(list: &Value, entity: &'static str) -> Result<Vec<T>> {
    Vec::<T>::deserialize(list).map_err(|source| ParseError::Malformed { entity, source })
}

/// Numeric fields the API always fills. Absent or blank is an error, never 0.
fn int_field(field: &'static str, value: Option<&str>) -> Result<i32> {
    match value.map(str::trim) {
        None | Some("") => Err(ParseError::Missing { field }),
        Some(v) => v.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            value: v.to_string(),
        }),
    }
}

fn float_field(field: &'static str, value: Option<&str>) -> Result<f64> {
    match value.map(str::trim) {
        None | Some("") => Err(ParseError::Missing { field }),
        Some(v) => v.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            value: v.to_string(),
        }),
    }
}
