//! Fetch raw JSON payloads from the API, optionally archiving them to disk.

pub mod archive;

pub use archive::RawArchive;

use serde_json::Value;

use crate::client::{ApiClient, ApiError, Transport};

/// Raw payloads for one round.
#[derive(Debug, Clone, Default)]
pub struct RoundExtract {
    pub round: i32,
    pub results: Value,
    pub qualifying: Value,
}

/// Raw payloads for one season, as fetched.
#[derive(Debug, Clone, Default)]
pub struct SeasonExtract {
    pub season: i32,
    pub races: Value,
    pub rounds: Vec<RoundExtract>,
    /// Rounds whose fetch failed and were left out.
    pub skipped_rounds: Vec<i32>,
    pub driver_standings: Value,
    pub constructor_standings: Value,
}

pub fn fetch_races<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    raw: Option<&RawArchive>,
) -> Result<Value, ApiError> {
    fetch(client, &format!("/{season}"), season, None, "races", raw)
}

pub fn fetch_results<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    round: i32,
    raw: Option<&RawArchive>,
) -> Result<Value, ApiError> {
    fetch(client, &format!("/{season}/{round}/results"), season, Some(round), "results", raw)
}

pub fn fetch_qualifying<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    round: i32,
    raw: Option<&RawArchive>,
) -> Result<Value, ApiError> {
    fetch(
        client,
        &format!("/{season}/{round}/qualifying"),
        season,
        Some(round),
        "qualifying",
        raw,
    )
}

/// Driver standings after `round`, or the latest standings of the season.
pub fn fetch_driver_standings<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    round: Option<i32>,
    raw: Option<&RawArchive>,
) -> Result<Value, ApiError> {
    let path = format!("{}/driverStandings", scope(season, round));
    fetch(client, &path, season, round, "driver_standings", raw)
}

/// Constructor standings after `round`, or the latest standings of the season.
pub fn fetch_constructor_standings<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    round: Option<i32>,
    raw: Option<&RawArchive>,
) -> Result<Value, ApiError> {
    let path = format!("{}/constructorStandings", scope(season, round));
    fetch(client, &path, season, round, "constructor_standings", raw)
}

/// Fetch a season's schedule, every round's results and qualifying, and
/// the season's latest standings.
///
/// A round whose fetch fails is logged and skipped. Failures on the
/// schedule or the standings fail the whole season.
pub fn extract_season<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    raw: Option<&RawArchive>,
) -> Result<SeasonExtract, ApiError> {
    let races = fetch_races(client, season, raw)?;
    let rounds = scheduled_rounds(&races);
    log::info!("Season {season}: {} rounds scheduled", rounds.len());

    let mut extract = SeasonExtract {
        season,
        races,
        ..Default::default()
    };

    for round in rounds {
        match extract_round(client, season, round, raw) {
            Ok(r) => extract.rounds.push(r),
            Err(e) => {
                log::error!("Skipping {season} round {round}: {e}");
                extract.skipped_rounds.push(round);
            }
        }
    }

    extract.driver_standings = fetch_driver_standings(client, season, None, raw)?;
    extract.constructor_standings = fetch_constructor_standings(client, season, None, raw)?;

    log::info!(
        "Season {season}: extracted {} rounds ({} skipped)",
        extract.rounds.len(),
        extract.skipped_rounds.len()
    );
    Ok(extract)
}

fn extract_round<T: Transport>(
    client: &ApiClient<T>,
    season: i32,
    round: i32,
    raw: Option<&RawArchive>,
) -> Result<RoundExtract, ApiError> {
    Ok(RoundExtract {
        round,
        results: fetch_results(client, season, round, raw)?,
        qualifying: fetch_qualifying(client, season, round, raw)?,
    })
}

/// `(season, round)` of the most recent race with published results.
pub fn latest_completed_race<T: Transport>(
    client: &ApiClient<T>,
) -> Result<Option<(i32, i32)>, ApiError> {
    let payload = client.get("/current/last/results")?;
    let latest = payload.pointer("/MRData/RaceTable/Races/0").and_then(|race| {
        let season = numeric(race, "season")?;
        let round = numeric(race, "round")?;
        Some((season, round))
    });
    if latest.is_none() {
        log::warn!("API reported no completed race");
    }
    Ok(latest)
}

/// Round numbers listed in a schedule payload, in listed order.
pub fn scheduled_rounds(races: &Value) -> Vec<i32> {
    races
        .pointer("/MRData/RaceTable/Races")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(|race| numeric(race, "round")).collect())
        .unwrap_or_default()
}

fn numeric(obj: &Value, key: &str) -> Option<i32> {
    obj.get(key)?.as_str()?.trim().parse().ok()
}

fn scope(season: i32, round: Option<i32>) -> String {
    match round {
        Some(round) => format!("/{season}/{round}"),
        None => format!("/{season}"),
    }
}

fn fetch<T: Transport>(
    client: &ApiClient<T>,
    path: &str,
    season: i32,
    round: Option<i32>,
    category: &str,
    raw: Option<&RawArchive>,
) -> Result<Value, ApiError> {
    let payload = client.get(path)?;
    if let Some(archive) = raw {
        archive.save(season, round, category, &payload);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{RouteTransport, client};
    use crate::transform::parsers::fixtures;
    use serde_json::json;

    fn season_routes() -> RouteTransport {
        RouteTransport::new()
            .json("/2021.json", fixtures::races(2021, &[1, 2]))
            .json("/2021/1/results.json", fixtures::results(2021, 1, &[("ham", "mercedes", Some(1), 2)]))
            .json("/2021/1/qualifying.json", fixtures::qualifying(2021, 1, &[("ham", "mercedes", 1)]))
            .json("/2021/2/results.json", fixtures::results(2021, 2, &[("ver", "red_bull", Some(1), 1)]))
            .json("/2021/2/qualifying.json", fixtures::qualifying(2021, 2, &[("ver", "red_bull", 1)]))
            .json("/2021/driverStandings.json", fixtures::driver_standings(2021, 2, &[("ham", 25.0, 1)]))
            .json(
                "/2021/constructorStandings.json",
                fixtures::constructor_standings(2021, 2, &[("mercedes", 25.0, 1)]),
            )
    }

    #[test]
    fn test_extract_season_fetches_every_round() {
        let client = client(season_routes());
        let extract = extract_season(&client, 2021, None).unwrap();
        assert_eq!(extract.season, 2021);
        assert_eq!(extract.rounds.len(), 2);
        assert_eq!(extract.rounds[1].round, 2);
        assert!(extract.skipped_rounds.is_empty());
        assert!(extract.driver_standings.pointer("/MRData/StandingsTable").is_some());
    }

    #[test]
    fn test_failing_round_is_skipped() {
        let transport = RouteTransport::new()
            .json("/2021.json", fixtures::races(2021, &[1, 2]))
            .json("/2021/1/results.json", fixtures::results(2021, 1, &[("ham", "mercedes", Some(1), 2)]))
            .json("/2021/1/qualifying.json", json!({}))
            .unreachable("/2021/2/results.json")
            .json("/2021/driverStandings.json", json!({}))
            .json("/2021/constructorStandings.json", json!({}));
        let client = client(transport);

        let extract = extract_season(&client, 2021, None).unwrap();
        assert_eq!(extract.rounds.len(), 1);
        assert_eq!(extract.skipped_rounds, vec![2]);
        // retried up to the attempt limit, qualifying never requested
        assert_eq!(client_calls(&client, "/2021/2/results.json"), 3);
        assert_eq!(client_calls(&client, "/2021/2/qualifying.json"), 0);
    }

    #[test]
    fn test_standings_failure_fails_season() {
        let transport = RouteTransport::new()
            .json("/2021.json", fixtures::races(2021, &[]))
            .status("/2021/driverStandings.json", 500);
        let err = extract_season(&client(transport), 2021, None).unwrap_err();
        assert!(matches!(err, ApiError::RequestExhausted { .. }));
    }

    #[test]
    fn test_raw_payloads_are_archived() {
        let dir = tempfile::tempdir().unwrap();
        let archive = RawArchive::new(dir.path());
        extract_season(&client(season_routes()), 2021, Some(&archive)).unwrap();

        for file in [
            "2021/races.json",
            "2021/1/results.json",
            "2021/2/qualifying.json",
            "2021/driver_standings.json",
            "2021/constructor_standings.json",
        ] {
            assert!(dir.path().join(file).exists(), "missing {file}");
        }
    }

    #[test]
    fn test_standings_for_a_round() {
        let transport = RouteTransport::new().json("/2021/5/driverStandings.json", json!({"ok": true}));
        let payload = fetch_driver_standings(&client(transport), 2021, Some(5), None).unwrap();
        assert_eq!(payload["ok"], true);
    }

    #[test]
    fn test_latest_completed_race() {
        let transport = RouteTransport::new().json(
            "/current/last/results.json",
            fixtures::results(2023, 10, &[("ver", "red_bull", Some(1), 1)]),
        );
        assert_eq!(latest_completed_race(&client(transport)).unwrap(), Some((2023, 10)));

        let empty = RouteTransport::new()
            .json("/current/last/results.json", json!({"MRData": {"RaceTable": {"Races": []}}}));
        assert_eq!(latest_completed_race(&client(empty)).unwrap(), None);
    }

    #[test]
    fn test_scheduled_rounds() {
        assert_eq!(scheduled_rounds(&fixtures::races(2022, &[1, 2, 3])), vec![1, 2, 3]);
        assert!(scheduled_rounds(&json!({"MRData": {}})).is_empty());
    }

    fn client_calls(client: &ApiClient<RouteTransport>, suffix: &str) -> usize {
        client.transport().call_count(suffix)
    }
}
