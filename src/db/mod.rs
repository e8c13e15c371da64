pub mod load;
pub mod models;
pub mod queries;
pub mod runs;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Missing {entity} '{key}'")]
    ReferentialIntegrity { entity: &'static str, key: String },
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

const SCHEMA_VERSION: i32 = 1;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode so the query side can read during a load
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: reference entities, race-scoped tables, season metrics, run history
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS circuits (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                circuit_ref     TEXT NOT NULL UNIQUE,
                name            TEXT,
                locality        TEXT,
                country         TEXT,
                lat             REAL,
                lng             REAL,
                url             TEXT,
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS drivers (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                driver_ref      TEXT NOT NULL UNIQUE,
                number          INTEGER,
                code            TEXT,
                forename        TEXT,
                surname         TEXT,
                date_of_birth   TEXT,
                nationality     TEXT,
                url             TEXT,
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS constructors (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                constructor_ref TEXT NOT NULL UNIQUE,
                name            TEXT,
                nationality     TEXT,
                url             TEXT,
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS races (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                season          INTEGER NOT NULL,
                round           INTEGER NOT NULL,
                name            TEXT NOT NULL,
                date            TEXT,
                time            TEXT,
                circuit_id      INTEGER NOT NULL REFERENCES circuits(id),
                url             TEXT,
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(season, round)
            );
            CREATE INDEX IF NOT EXISTS idx_races_circuit ON races(circuit_id);

            CREATE TABLE IF NOT EXISTS results (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                race_id             INTEGER NOT NULL REFERENCES races(id) ON DELETE CASCADE,
                driver_id           INTEGER NOT NULL REFERENCES drivers(id),
                constructor_id      INTEGER NOT NULL REFERENCES constructors(id),
                number              INTEGER,
                grid                INTEGER NOT NULL,
                position            INTEGER,
                position_text       TEXT NOT NULL,
                position_order      INTEGER NOT NULL,
                points              REAL NOT NULL,
                laps                INTEGER NOT NULL,
                status              TEXT,
                time_millis         INTEGER,
                fastest_lap         INTEGER,
                fastest_lap_rank    INTEGER,
                fastest_lap_time    TEXT,
                fastest_lap_speed   REAL,
                position_change     INTEGER,
                UNIQUE(race_id, driver_id)
            );
            CREATE INDEX IF NOT EXISTS idx_results_driver ON results(driver_id);
            CREATE INDEX IF NOT EXISTS idx_results_constructor ON results(constructor_id);

            CREATE TABLE IF NOT EXISTS qualifying (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                race_id         INTEGER NOT NULL REFERENCES races(id) ON DELETE CASCADE,
                driver_id       INTEGER NOT NULL REFERENCES drivers(id),
                constructor_id  INTEGER NOT NULL REFERENCES constructors(id),
                position        INTEGER NOT NULL,
                q1              TEXT,
                q2              TEXT,
                q3              TEXT,
                UNIQUE(race_id, driver_id)
            );

            CREATE TABLE IF NOT EXISTS driver_standings (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                race_id         INTEGER NOT NULL REFERENCES races(id) ON DELETE CASCADE,
                driver_id       INTEGER NOT NULL REFERENCES drivers(id),
                points          REAL NOT NULL,
                position        INTEGER,
                position_text   TEXT NOT NULL,
                wins            INTEGER NOT NULL,
                UNIQUE(race_id, driver_id)
            );

            CREATE TABLE IF NOT EXISTS constructor_standings (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                race_id         INTEGER NOT NULL REFERENCES races(id) ON DELETE CASCADE,
                constructor_id  INTEGER NOT NULL REFERENCES constructors(id),
                points          REAL NOT NULL,
                position        INTEGER,
                position_text   TEXT NOT NULL,
                wins            INTEGER NOT NULL,
                UNIQUE(race_id, constructor_id)
            );

            CREATE TABLE IF NOT EXISTS driver_season_metrics (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                driver_id               INTEGER NOT NULL REFERENCES drivers(id),
                season                  INTEGER NOT NULL,
                races_entered           INTEGER NOT NULL,
                races_finished          INTEGER NOT NULL,
                podiums                 INTEGER NOT NULL,
                wins                    INTEGER NOT NULL,
                poles                   INTEGER NOT NULL,
                dnf_count               INTEGER NOT NULL,
                avg_finish_position     REAL,
                avg_grid_position       REAL,
                avg_points_per_race     REAL NOT NULL,
                total_points            REAL NOT NULL,
                position_changes_sum    INTEGER NOT NULL,
                consistency_score       REAL NOT NULL,
                UNIQUE(driver_id, season)
            );
            CREATE INDEX IF NOT EXISTS idx_driver_metrics_season ON driver_season_metrics(season);

            CREATE TABLE IF NOT EXISTS constructor_season_metrics (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                constructor_id          INTEGER NOT NULL REFERENCES constructors(id),
                season                  INTEGER NOT NULL,
                races_entered           INTEGER NOT NULL,
                podiums                 INTEGER NOT NULL,
                wins                    INTEGER NOT NULL,
                one_two_finishes        INTEGER NOT NULL,
                double_dnf              INTEGER NOT NULL,
                avg_finish_position     REAL,
                total_points            REAL NOT NULL,
                reliability_rate        REAL NOT NULL
                    CHECK (reliability_rate BETWEEN 0 AND 100),
                UNIQUE(constructor_id, season)
            );
            CREATE INDEX IF NOT EXISTS idx_constructor_metrics_season ON constructor_season_metrics(season);

            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                mode                TEXT NOT NULL,
                status              TEXT NOT NULL,
                started_at          TEXT NOT NULL DEFAULT (datetime('now')),
                finished_at         TEXT,
                seasons_processed   TEXT NOT NULL DEFAULT '[]',
                races_added         INTEGER NOT NULL DEFAULT 0,
                error_log           TEXT
            );
            ",
        )?;
        Ok(())
    }
}
