//! Write side: reference-entity upserts and transactional replaces.
//!
//! Reference entities (circuits, drivers, constructors) are merged, never
//! deleted; an incoming blank never overwrites a stored value. Race- and
//! season-scoped tables are replaced wholesale: the delete and the inserts
//! share one transaction, so a failed insert leaves the previous rows intact.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};

use super::models::{ReplaceCounts, UpsertCounts};
use super::{Database, DbError, Result};
use crate::records::{
    Circuit, Constructor, ConstructorSeasonMetrics, ConstructorStanding, Driver,
    DriverSeasonMetrics, DriverStanding, Qualifying, Race, RaceResult,
};

impl Database {
    pub fn upsert_circuits(&self, circuits: &[Circuit]) -> Result<UpsertCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let mut counts = UpsertCounts::default();
        {
            let mut exists = tx.prepare_cached("SELECT 1 FROM circuits WHERE circuit_ref = ?1")?;
            let mut upsert = tx.prepare_cached(
                "INSERT INTO circuits (circuit_ref, name, locality, country, lat, lng, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(circuit_ref) DO UPDATE SET
                    name = COALESCE(NULLIF(excluded.name, ''), circuits.name),
                    locality = COALESCE(NULLIF(excluded.locality, ''), circuits.locality),
                    country = COALESCE(NULLIF(excluded.country, ''), circuits.country),
                    lat = COALESCE(excluded.lat, circuits.lat),
                    lng = COALESCE(excluded.lng, circuits.lng),
                    url = COALESCE(NULLIF(excluded.url, ''), circuits.url),
                    updated_at = datetime('now')",
            )?;
            for c in circuits {
                tally(&mut counts, exists.exists(params![c.circuit_id])?);
                upsert.execute(params![
                    c.circuit_id, c.name, c.locality, c.country, c.lat, c.long, c.url,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("Circuits: {} inserted, {} updated", counts.inserted, counts.updated);
        Ok(counts)
    }

    pub fn upsert_drivers(&self, drivers: &[Driver]) -> Result<UpsertCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let mut counts = UpsertCounts::default();
        {
            let mut exists = tx.prepare_cached("SELECT 1 FROM drivers WHERE driver_ref = ?1")?;
            let mut upsert = tx.prepare_cached(
                "INSERT INTO drivers (
                    driver_ref, number, code, forename, surname, date_of_birth, nationality, url
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(driver_ref) DO UPDATE SET
                    number = COALESCE(excluded.number, drivers.number),
                    code = COALESCE(NULLIF(excluded.code, ''), drivers.code),
                    forename = COALESCE(NULLIF(excluded.forename, ''), drivers.forename),
                    surname = COALESCE(NULLIF(excluded.surname, ''), drivers.surname),
                    date_of_birth = COALESCE(excluded.date_of_birth, drivers.date_of_birth),
                    nationality = COALESCE(NULLIF(excluded.nationality, ''), drivers.nationality),
                    url = COALESCE(NULLIF(excluded.url, ''), drivers.url),
                    updated_at = datetime('now')",
            )?;
            for d in drivers {
                tally(&mut counts, exists.exists(params![d.driver_id])?);
                upsert.execute(params![
                    d.driver_id,
                    d.number,
                    d.code,
                    d.forename,
                    d.surname,
                    d.date_of_birth.map(|dob| dob.to_string()),
                    d.nationality,
                    d.url,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("Drivers: {} inserted, {} updated", counts.inserted, counts.updated);
        Ok(counts)
    }

    pub fn upsert_constructors(&self, constructors: &[Constructor]) -> Result<UpsertCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let mut counts = UpsertCounts::default();
        {
            let mut exists =
                tx.prepare_cached("SELECT 1 FROM constructors WHERE constructor_ref = ?1")?;
            let mut upsert = tx.prepare_cached(
                "INSERT INTO constructors (constructor_ref, name, nationality, url)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(constructor_ref) DO UPDATE SET
                    name = COALESCE(NULLIF(excluded.name, ''), constructors.name),
                    nationality = COALESCE(NULLIF(excluded.nationality, ''), constructors.nationality),
                    url = COALESCE(NULLIF(excluded.url, ''), constructors.url),
                    updated_at = datetime('now')",
            )?;
            for c in constructors {
                tally(&mut counts, exists.exists(params![c.constructor_id])?);
                upsert.execute(params![c.constructor_id, c.name, c.nationality, c.url])?;
            }
        }
        tx.commit()?;
        log::debug!("Constructors: {} inserted, {} updated", counts.inserted, counts.updated);
        Ok(counts)
    }

    /// Insert or update a race by (season, round). Returns the race id.
    ///
    /// The circuit must already be loaded.
    pub fn upsert_race(&self, race: &Race) -> Result<i64> {
        let circuit_pk: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM circuits WHERE circuit_ref = ?1",
                params![race.circuit_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(circuit_pk) = circuit_pk else {
            return Err(DbError::ReferentialIntegrity {
                entity: "circuit",
                key: race.circuit_id.clone(),
            });
        };

        self.conn.execute(
            "INSERT INTO races (season, round, name, date, time, circuit_id, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(season, round) DO UPDATE SET
                name = COALESCE(NULLIF(excluded.name, ''), races.name),
                date = COALESCE(excluded.date, races.date),
                time = COALESCE(NULLIF(excluded.time, ''), races.time),
                circuit_id = excluded.circuit_id,
                url = COALESCE(NULLIF(excluded.url, ''), races.url),
                updated_at = datetime('now')",
            params![
                race.season,
                race.round,
                race.name,
                race.date.map(|d| d.to_string()),
                race.time,
                circuit_pk,
                race.url,
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM races WHERE season = ?1 AND round = ?2",
            params![race.season, race.round],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Replace every result row of a race.
    pub fn replace_results(&self, race_id: i64, results: &[RaceResult]) -> Result<ReplaceCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let drivers = ref_ids(&tx, "drivers", "driver_ref")?;
        let constructors = ref_ids(&tx, "constructors", "constructor_ref")?;
        let mut counts = ReplaceCounts {
            deleted: tx.execute("DELETE FROM results WHERE race_id = ?1", params![race_id])?,
            ..Default::default()
        };
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO results (
                    race_id, driver_id, constructor_id, number, grid, position, position_text,
                    position_order, points, laps, status, time_millis, fastest_lap,
                    fastest_lap_rank, fastest_lap_time, fastest_lap_speed, position_change
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
            )?;
            for r in results {
                let (Some(driver_pk), Some(constructor_pk)) =
                    (drivers.get(&r.driver_id), constructors.get(&r.constructor_id))
                else {
                    log::warn!(
                        "Skipping result for {}/{} in race {race_id}: driver or constructor not loaded",
                        r.driver_id,
                        r.constructor_id
                    );
                    counts.skipped += 1;
                    continue;
                };
                stmt.execute(params![
                    race_id,
                    driver_pk,
                    constructor_pk,
                    r.number,
                    r.grid,
                    r.position(),
                    r.position_text,
                    r.position_order,
                    r.points,
                    r.laps,
                    r.status,
                    r.time_millis,
                    r.fastest_lap,
                    r.fastest_lap_rank,
                    r.fastest_lap_time,
                    r.fastest_lap_speed,
                    r.position_change,
                ])?;
                counts.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Replace every qualifying row of a race.
    pub fn replace_qualifying(&self, race_id: i64, entries: &[Qualifying]) -> Result<ReplaceCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let drivers = ref_ids(&tx, "drivers", "driver_ref")?;
        let constructors = ref_ids(&tx, "constructors", "constructor_ref")?;
        let mut counts = ReplaceCounts {
            deleted: tx.execute("DELETE FROM qualifying WHERE race_id = ?1", params![race_id])?,
            ..Default::default()
        };
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO qualifying (race_id, driver_id, constructor_id, position, q1, q2, q3)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for q in entries {
                let (Some(driver_pk), Some(constructor_pk)) =
                    (drivers.get(&q.driver_id), constructors.get(&q.constructor_id))
                else {
                    log::warn!(
                        "Skipping qualifying for {}/{} in race {race_id}: driver or constructor not loaded",
                        q.driver_id,
                        q.constructor_id
                    );
                    counts.skipped += 1;
                    continue;
                };
                stmt.execute(params![
                    race_id, driver_pk, constructor_pk, q.position, q.q1, q.q2, q.q3,
                ])?;
                counts.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Replace the driver standings snapshot taken after a race.
    pub fn replace_driver_standings(
        &self,
        race_id: i64,
        standings: &[DriverStanding],
    ) -> Result<ReplaceCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let drivers = ref_ids(&tx, "drivers", "driver_ref")?;
        let mut counts = ReplaceCounts {
            deleted: tx.execute(
                "DELETE FROM driver_standings WHERE race_id = ?1",
                params![race_id],
            )?,
            ..Default::default()
        };
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO driver_standings (race_id, driver_id, points, position, position_text, wins)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for s in standings {
                let Some(driver_pk) = drivers.get(&s.driver_id) else {
                    log::warn!("Skipping standing for {} in race {race_id}: driver not loaded", s.driver_id);
                    counts.skipped += 1;
                    continue;
                };
                stmt.execute(params![race_id, driver_pk, s.points, s.position, s.position_text, s.wins])?;
                counts.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Replace the constructor standings snapshot taken after a race.
    pub fn replace_constructor_standings(
        &self,
        race_id: i64,
        standings: &[ConstructorStanding],
    ) -> Result<ReplaceCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let constructors = ref_ids(&tx, "constructors", "constructor_ref")?;
        let mut counts = ReplaceCounts {
            deleted: tx.execute(
                "DELETE FROM constructor_standings WHERE race_id = ?1",
                params![race_id],
            )?,
            ..Default::default()
        };
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO constructor_standings (race_id, constructor_id, points, position, position_text, wins)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for s in standings {
                let Some(constructor_pk) = constructors.get(&s.constructor_id) else {
                    log::warn!(
                        "Skipping standing for {} in race {race_id}: constructor not loaded",
                        s.constructor_id
                    );
                    counts.skipped += 1;
                    continue;
                };
                stmt.execute(params![
                    race_id, constructor_pk, s.points, s.position, s.position_text, s.wins,
                ])?;
                counts.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Replace all driver metrics of a season.
    pub fn replace_driver_metrics(
        &self,
        season: i32,
        metrics: &[DriverSeasonMetrics],
    ) -> Result<ReplaceCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let drivers = ref_ids(&tx, "drivers", "driver_ref")?;
        let mut counts = ReplaceCounts {
            deleted: tx.execute(
                "DELETE FROM driver_season_metrics WHERE season = ?1",
                params![season],
            )?,
            ..Default::default()
        };
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO driver_season_metrics (
                    driver_id, season, races_entered, races_finished, podiums, wins, poles,
                    dnf_count, avg_finish_position, avg_grid_position, avg_points_per_race,
                    total_points, position_changes_sum, consistency_score
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            )?;
            for m in metrics {
                let Some(driver_pk) = drivers.get(&m.driver_id) else {
                    log::warn!("Skipping {season} metrics for {}: driver not loaded", m.driver_id);
                    counts.skipped += 1;
                    continue;
                };
                stmt.execute(params![
                    driver_pk,
                    season,
                    m.races_entered,
                    m.races_finished,
                    m.podiums,
                    m.wins,
                    m.poles,
                    m.dnf_count,
                    m.avg_finish_position,
                    m.avg_grid_position,
                    m.avg_points_per_race,
                    m.total_points,
                    m.position_changes_sum,
                    m.consistency_score,
                ])?;
                counts.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Replace all constructor metrics of a season.
    pub fn replace_constructor_metrics(
        &self,
        season: i32,
        metrics: &[ConstructorSeasonMetrics],
    ) -> Result<ReplaceCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let constructors = ref_ids(&tx, "constructors", "constructor_ref")?;
        let mut counts = ReplaceCounts {
            deleted: tx.execute(
                "DELETE FROM constructor_season_metrics WHERE season = ?1",
                params![season],
            )?,
            ..Default::default()
        };
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO constructor_season_metrics (
                    constructor_id, season, races_entered, podiums, wins, one_two_finishes,
                    double_dnf, avg_finish_position, total_points, reliability_rate
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            )?;
            for m in metrics {
                let Some(constructor_pk) = constructors.get(&m.constructor_id) else {
                    log::warn!(
                        "Skipping {season} metrics for {}: constructor not loaded",
                        m.constructor_id
                    );
                    counts.skipped += 1;
                    continue;
                };
                stmt.execute(params![
                    constructor_pk,
                    season,
                    m.races_entered,
                    m.podiums,
                    m.wins,
                    m.one_two_finishes,
                    m.double_dnf,
                    m.avg_finish_position,
                    m.total_points,
                    m.reliability_rate,
                ])?;
                counts.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }
}

fn tally(counts: &mut UpsertCounts, existed: bool) {
    if existed {
        counts.updated += 1;
    } else {
        counts.inserted += 1;
    }
}

/// Natural key -> row id for a reference table.
fn ref_ids(conn: &Connection, table: &str, key_column: &str) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {key_column}, id FROM {table}"))?;
    let ids = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(ids)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn count(db: &Database, sql: &str) -> i64 {
        db.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_upsert_counts_inserted_and_updated() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_drivers(&[driver("ham"), driver("bot")]).unwrap();
        assert_eq!(first, UpsertCounts { inserted: 2, updated: 0 });
        let second = db.upsert_drivers(&[driver("ham"), driver("ver")]).unwrap();
        assert_eq!(second, UpsertCounts { inserted: 1, updated: 1 });
        assert_eq!(count(&db, "SELECT COUNT(*) FROM drivers"), 3);
    }

    #[test]
    fn test_upsert_never_blanks_existing_values() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_drivers(&[driver("ham")]).unwrap();

        let sparse = Driver {
            driver_id: "ham".to_string(),
            number: None,
            code: Some(String::new()),
            forename: None,
            surname: Some("Hamilton".to_string()),
            date_of_birth: None,
            nationality: None,
            url: None,
        };
        db.upsert_drivers(&[sparse]).unwrap();

        let (number, code, forename, surname, dob): (Option<i32>, Option<String>, Option<String>, Option<String>, Option<String>) = db
            .conn
            .query_row(
                "SELECT number, code, forename, surname, date_of_birth FROM drivers WHERE driver_ref = 'ham'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .unwrap();
        assert_eq!(number, Some(44));
        assert_eq!(code.as_deref(), Some("HAM"));
        assert_eq!(forename.as_deref(), Some("First"));
        assert_eq!(surname.as_deref(), Some("Hamilton"));
        assert_eq!(dob.as_deref(), Some("1985-01-07"));
    }

    #[test]
    fn test_circuit_upsert_keeps_coordinates() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_circuits(&[circuit("monza")]).unwrap();
        let mut bare = circuit("monza");
        bare.lat = None;
        bare.name = None;
        let counts = db.upsert_circuits(&[bare]).unwrap();
        assert_eq!(counts.updated, 1);
        let (lat, name): (Option<f64>, Option<String>) = db
            .conn
            .query_row("SELECT lat, name FROM circuits WHERE circuit_ref = 'monza'", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(lat, Some(1.5));
        assert_eq!(name.as_deref(), Some("monza circuit"));
    }

    #[test]
    fn test_race_requires_circuit() {
        let db = Database::open_in_memory().unwrap();
        let err = db.upsert_race(&race(2021, 1, "nowhere")).unwrap_err();
        match err {
            DbError::ReferentialIntegrity { entity, key } => {
                assert_eq!(entity, "circuit");
                assert_eq!(key, "nowhere");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_race_upsert_is_keyed_by_season_round() {
        let (db, race_id) = seeded();
        let mut renamed = race(2021, 1, "bahrain");
        renamed.name = "Bahrain Grand Prix".to_string();
        assert_eq!(db.upsert_race(&renamed).unwrap(), race_id);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM races"), 1);
        let name: String = db
            .conn
            .query_row("SELECT name FROM races WHERE id = ?1", [race_id], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Bahrain Grand Prix");
        assert_eq!(count(&db, "SELECT COUNT(*) FROM races WHERE season = 2021 AND round = 2"), 0);
    }

    #[test]
    fn test_replace_results_is_idempotent() {
        let (db, race_id) = seeded();
        let batch = vec![
            result(2021, 1, "ham", "mercedes", Some(1)),
            result(2021, 1, "bot", "mercedes", None),
        ];
        let first = db.replace_results(race_id, &batch).unwrap();
        assert_eq!(first.inserted, 2);
        let second = db.replace_results(race_id, &batch).unwrap();
        assert_eq!(second.deleted, 2);
        assert_eq!(second.inserted, 2);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM results"), 2);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM results WHERE position IS NULL AND position_change IS NULL"),
            1
        );
    }

    #[test]
    fn test_replace_skips_unknown_references() {
        let (db, race_id) = seeded();
        let batch = vec![
            result(2021, 1, "ham", "mercedes", Some(1)),
            result(2021, 1, "ghost", "mercedes", Some(2)),
            result(2021, 1, "bot", "phantom", Some(3)),
        ];
        let counts = db.replace_results(race_id, &batch).unwrap();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.skipped, 2);
    }

    #[test]
    fn test_failed_replace_rolls_back_delete() {
        let (db, race_id) = seeded();
        db.replace_results(
            race_id,
            &[
                result(2021, 1, "ham", "mercedes", Some(1)),
                result(2021, 1, "bot", "mercedes", Some(2)),
            ],
        )
        .unwrap();

        // duplicate driver violates UNIQUE(race_id, driver_id) mid-insert
        let bad = vec![
            result(2021, 1, "ham", "mercedes", Some(2)),
            result(2021, 1, "ham", "mercedes", Some(3)),
        ];
        assert!(db.replace_results(race_id, &bad).is_err());

        assert_eq!(count(&db, "SELECT COUNT(*) FROM results"), 2);
        assert_eq!(
            count(&db, "SELECT position FROM results r JOIN drivers d ON d.id = r.driver_id WHERE d.driver_ref = 'ham'"),
            1
        );
    }

    #[test]
    fn test_replace_qualifying_and_standings() {
        let (db, race_id) = seeded();
        let q = Qualifying {
            season: 2021,
            round: 1,
            driver_id: "ham".to_string(),
            constructor_id: "mercedes".to_string(),
            position: 1,
            q1: Some("1:30.1".to_string()),
            q2: None,
            q3: None,
        };
        assert!(db.replace_qualifying(race_id, &[q.clone(), q.clone()]).is_err());
        assert_eq!(db.replace_qualifying(race_id, &[q]).unwrap().inserted, 1);

        let ds = DriverStanding {
            season: 2021,
            round: 1,
            driver_id: "bot".to_string(),
            position: None,
            position_text: "-".to_string(),
            points: 0.0,
            wins: 0,
        };
        assert_eq!(db.replace_driver_standings(race_id, &[ds]).unwrap().inserted, 1);

        let cs = ConstructorStanding {
            season: 2021,
            round: 1,
            constructor_id: "mercedes".to_string(),
            position: Some(1),
            position_text: "1".to_string(),
            points: 25.0,
            wins: 1,
        };
        assert_eq!(db.replace_constructor_standings(race_id, &[cs.clone()]).unwrap().inserted, 1);
        let again = db.replace_constructor_standings(race_id, &[cs]).unwrap();
        assert_eq!((again.deleted, again.inserted), (1, 1));
    }

    #[test]
    fn test_replace_metrics_is_season_scoped() {
        let (db, _) = seeded();
        let metric = |season| ConstructorSeasonMetrics {
            constructor_id: "mercedes".to_string(),
            season,
            races_entered: 1,
            podiums: 1,
            wins: 1,
            one_two_finishes: 0,
            double_dnf: 0,
            avg_finish_position: Some(1.0),
            total_points: 25.0,
            reliability_rate: 50.0,
        };
        db.replace_constructor_metrics(2020, &[metric(2020)]).unwrap();
        db.replace_constructor_metrics(2021, &[metric(2021)]).unwrap();
        let again = db.replace_constructor_metrics(2021, &[metric(2021)]).unwrap();
        assert_eq!(again.deleted, 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM constructor_season_metrics"), 2);

        let driver_metric = DriverSeasonMetrics {
            driver_id: "ham".to_string(),
            season: 2021,
            races_entered: 1,
            races_finished: 1,
            podiums: 1,
            wins: 1,
            poles: 0,
            dnf_count: 0,
            avg_finish_position: Some(1.0),
            avg_grid_position: Some(2.0),
            avg_points_per_race: 25.0,
            total_points: 25.0,
            position_changes_sum: 1,
            consistency_score: 0.0,
        };
        let counts = db.replace_driver_metrics(2021, &[driver_metric]).unwrap();
        assert_eq!(counts.inserted, 1);
    }

    #[test]
    fn test_reliability_check_constraint_backstop() {
        let (db, _) = seeded();
        let bad = ConstructorSeasonMetrics {
            constructor_id: "mercedes".to_string(),
            season: 2021,
            races_entered: 1,
            podiums: 0,
            wins: 0,
            one_two_finishes: 0,
            double_dnf: 0,
            avg_finish_position: None,
            total_points: 0.0,
            reliability_rate: 150.0,
        };
        assert!(db.replace_constructor_metrics(2021, &[bad]).is_err());
    }
}
