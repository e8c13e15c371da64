/// Outcome of a reference-entity upsert batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertCounts {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Outcome of a delete-then-insert replace.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceCounts {
    pub deleted: usize,
    pub inserted: usize,
    /// Rows dropped because a driver/constructor was not loaded.
    pub skipped: usize,
}

/// A pipeline run row read from the database.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub seasons_processed: Vec<i32>,
    pub races_added: i64,
    pub error_log: Option<String>,
}

/// Driver season metrics joined with driver names, for display.
#[derive(Debug, Clone)]
pub struct DriverMetricRow {
    pub driver_ref: String,
    pub name: String,
    pub races_entered: u32,
    pub wins: u32,
    pub podiums: u32,
    pub poles: u32,
    pub dnf_count: u32,
    pub avg_finish_position: Option<f64>,
    pub total_points: f64,
    pub consistency_score: f64,
}

/// Constructor season metrics joined with constructor names, for display.
#[derive(Debug, Clone)]
pub struct ConstructorMetricRow {
    pub constructor_ref: String,
    pub name: String,
    pub races_entered: u32,
    pub wins: u32,
    pub podiums: u32,
    pub one_two_finishes: u32,
    pub double_dnf: u32,
    pub total_points: f64,
    pub reliability_rate: f64,
}

/// Row counts across the schema.
#[derive(Debug, Default)]
pub struct DbStats {
    pub circuits: i64,
    pub drivers: i64,
    pub constructors: i64,
    pub races: i64,
    pub results: i64,
    pub qualifying: i64,
    pub driver_standings: i64,
    pub constructor_standings: i64,
    pub driver_metrics: i64,
    pub constructor_metrics: i64,
    pub seasons: Vec<(i32, i64)>,
    pub latest_race: Option<(i32, i32)>,
}
