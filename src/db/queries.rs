use super::models::{ConstructorMetricRow, DbStats, DriverMetricRow};
use super::{Database, Result};
use rusqlite::params;

impl Database {
    /// Row counts per table plus per-season race counts.
    pub fn stats(&self) -> Result<DbStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };

        let mut season_stmt = self.conn.prepare(
            "SELECT season, COUNT(*) FROM races GROUP BY season ORDER BY season",
        )?;
        let seasons: Vec<(i32, i64)> = season_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(DbStats {
            circuits: count("circuits")?,
            drivers: count("drivers")?,
            constructors: count("constructors")?,
            races: count("races")?,
            results: count("results")?,
            qualifying: count("qualifying")?,
            driver_standings: count("driver_standings")?,
            constructor_standings: count("constructor_standings")?,
            driver_metrics: count("driver_season_metrics")?,
            constructor_metrics: count("constructor_season_metrics")?,
            seasons,
            latest_race: self.latest_stored_race()?,
        })
    }

    /// Driver metrics for a season, best points first.
    pub fn driver_metrics_for_season(&self, season: i32, limit: usize) -> Result<Vec<DriverMetricRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.driver_ref,
                    TRIM(COALESCE(d.forename, '') || ' ' || COALESCE(d.surname, '')),
                    m.races_entered, m.wins, m.podiums, m.poles, m.dnf_count,
                    m.avg_finish_position, m.total_points, m.consistency_score
             FROM driver_season_metrics m
             JOIN drivers d ON d.id = m.driver_id
             WHERE m.season = ?1
             ORDER BY m.total_points DESC, m.wins DESC, d.driver_ref
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![season, limit as i64], |row| {
                Ok(DriverMetricRow {
                    driver_ref: row.get(0)?,
                    name: row.get(1)?,
                    races_entered: row.get(2)?,
                    wins: row.get(3)?,
                    podiums: row.get(4)?,
                    poles: row.get(5)?,
                    dnf_count: row.get(6)?,
                    avg_finish_position: row.get(7)?,
                    total_points: row.get(8)?,
                    consistency_score: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Constructor metrics for a season, best points first.
    pub fn constructor_metrics_for_season(&self, season: i32) -> Result<Vec<ConstructorMetricRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.constructor_ref, COALESCE(c.name, c.constructor_ref),
                    m.races_entered, m.wins, m.podiums, m.one_two_finishes, m.double_dnf,
                    m.total_points, m.reliability_rate
             FROM constructor_season_metrics m
             JOIN constructors c ON c.id = m.constructor_id
             WHERE m.season = ?1
             ORDER BY m.total_points DESC, c.constructor_ref",
        )?;

        let rows = stmt
            .query_map(params![season], |row| {
                Ok(ConstructorMetricRow {
                    constructor_ref: row.get(0)?,
                    name: row.get(1)?,
                    races_entered: row.get(2)?,
                    wins: row.get(3)?,
                    podiums: row.get(4)?,
                    one_two_finishes: row.get(5)?,
                    double_dnf: row.get(6)?,
                    total_points: row.get(7)?,
                    reliability_rate: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
