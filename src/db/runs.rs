use rusqlite::{OptionalExtension, params};

use super::models::RunRecord;
use super::{Database, Result};

impl Database {
    /// Record the start of a pipeline run. Returns the run id.
    pub fn create_run(&self, mode: &str, status: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO pipeline_runs (mode, status) VALUES (?1, ?2)",
            params![mode, status],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        status: &str,
        seasons: &[i32],
        races_added: usize,
        error_log: Option<&str>,
    ) -> Result<()> {
        let seasons_json = serde_json::to_string(seasons)?;
        self.conn.execute(
            "UPDATE pipeline_runs
             SET status = ?2, finished_at = datetime('now'), seasons_processed = ?3,
                 races_added = ?4, error_log = ?5
             WHERE id = ?1",
            params![run_id, status, seasons_json, races_added as i64, error_log],
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, status, started_at, finished_at, seasons_processed,
                    races_added, error_log
             FROM pipeline_runs
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    RunRecord {
                        id: row.get(0)?,
                        mode: row.get(1)?,
                        status: row.get(2)?,
                        started_at: row.get(3)?,
                        finished_at: row.get(4)?,
                        seasons_processed: Vec::new(),
                        races_added: row.get(6)?,
                        error_log: row.get(7)?,
                    },
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut record, seasons)| -> Result<RunRecord> {
                record.seasons_processed = serde_json::from_str(&seasons)?;
                Ok(record)
            })
            .collect()
    }

    /// `(season, round)` of the latest race with stored results.
    pub fn latest_stored_race(&self) -> Result<Option<(i32, i32)>> {
        let latest = self
            .conn
            .query_row(
                "SELECT r.season, r.round
                 FROM races r
                 WHERE EXISTS (SELECT 1 FROM results x WHERE x.race_id = r.id)
                 ORDER BY r.season DESC, r.round DESC
                 LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::load::test_support::*;

    #[test]
    fn test_run_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_run("season", "RUNNING").unwrap();

        let runs = db.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "RUNNING");
        assert!(runs[0].finished_at.is_none());
        assert!(runs[0].seasons_processed.is_empty());

        db.finish_run(id, "PARTIAL", &[2020, 2021], 17, Some("2019: boom")).unwrap();
        let run = &db.recent_runs(10).unwrap()[0];
        assert_eq!(run.status, "PARTIAL");
        assert_eq!(run.seasons_processed, vec![2020, 2021]);
        assert_eq!(run.races_added, 17);
        assert_eq!(run.error_log.as_deref(), Some("2019: boom"));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for mode in ["backfill", "season", "incremental"] {
            db.create_run(mode, "RUNNING").unwrap();
        }
        let runs = db.recent_runs(2).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].mode, "incremental");
        assert_eq!(runs[1].mode, "season");
    }

    #[test]
    fn test_latest_stored_race_ignores_races_without_results() {
        let (db, race_id) = seeded();
        assert_eq!(db.latest_stored_race().unwrap(), None);

        db.replace_results(race_id, &[result(2021, 1, "ham", "mercedes", Some(1))]).unwrap();
        db.upsert_race(&race(2021, 2, "bahrain")).unwrap();
        assert_eq!(db.latest_stored_race().unwrap(), Some((2021, 1)));
    }
}
