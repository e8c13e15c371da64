//! Cleaned, typed records produced by the transform stage and consumed by the loaders.

use chrono::NaiveDate;

/// Finishing classification of a race entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Classified(i32),
    /// Retired, disqualified, withdrawn or otherwise without a classified position.
    Unclassified,
}

impl Finish {
    pub fn position(self) -> Option<i32> {
        match self {
            Finish::Classified(p) => Some(p),
            Finish::Unclassified => None,
        }
    }

    pub fn is_classified(self) -> bool {
        matches!(self, Finish::Classified(_))
    }
}

impl From<Option<i32>> for Finish {
    fn from(position: Option<i32>) -> Self {
        position.map_or(Finish::Unclassified, Finish::Classified)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    pub circuit_id: String,
    pub name: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub driver_id: String,
    pub number: Option<i32>,
    pub code: Option<String>,
    pub forename: Option<String>,
    pub surname: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub constructor_id: String,
    pub name: Option<String>,
    pub nationality: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Race {
    pub season: i32,
    pub round: i32,
    pub name: String,
    pub date: Option<NaiveDate>,
    /// Scheduled start (UTC, `HH:MM:SS`), absent for older seasons.
    pub time: Option<String>,
    pub circuit_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub season: i32,
    pub round: i32,
    pub driver_id: String,
    pub constructor_id: String,
    pub number: Option<i32>,
    pub grid: i32,
    pub finish: Finish,
    pub position_text: String,
    pub position_order: i32,
    pub points: f64,
    pub laps: i32,
    pub status: Option<String>,
    pub time_millis: Option<i64>,
    pub fastest_lap: Option<i32>,
    pub fastest_lap_rank: Option<i32>,
    pub fastest_lap_time: Option<String>,
    pub fastest_lap_speed: Option<f64>,
    /// `grid - position`; `None` when unclassified.
    pub position_change: Option<i32>,
}

impl RaceResult {
    pub fn position(&self) -> Option<i32> {
        self.finish.position()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Qualifying {
    pub season: i32,
    pub round: i32,
    pub driver_id: String,
    pub constructor_id: String,
    pub position: i32,
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverStanding {
    pub season: i32,
    pub round: i32,
    pub driver_id: String,
    pub position: Option<i32>,
    pub position_text: String,
    pub points: f64,
    pub wins: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorStanding {
    pub season: i32,
    pub round: i32,
    pub constructor_id: String,
    pub position: Option<i32>,
    pub position_text: String,
    pub points: f64,
    pub wins: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverSeasonMetrics {
    pub driver_id: String,
    pub season: i32,
    pub races_entered: u32,
    pub races_finished: u32,
    pub podiums: u32,
    pub wins: u32,
    pub poles: u32,
    pub dnf_count: u32,
    /// Mean finishing position over classified finishes only.
    pub avg_finish_position: Option<f64>,
    pub avg_grid_position: Option<f64>,
    pub avg_points_per_race: f64,
    pub total_points: f64,
    pub position_changes_sum: i32,
    /// Population standard deviation of classified finishing positions.
    pub consistency_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorSeasonMetrics {
    pub constructor_id: String,
    pub season: i32,
    /// Distinct rounds, not car entries.
    pub races_entered: u32,
    pub podiums: u32,
    pub wins: u32,
    pub one_two_finishes: u32,
    pub double_dnf: u32,
    pub avg_finish_position: Option<f64>,
    pub total_points: f64,
    /// Percentage of entries with a classified finish, 0..=100.
    pub reliability_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_from_option() {
        assert_eq!(Finish::from(Some(3)), Finish::Classified(3));
        assert_eq!(Finish::from(None), Finish::Unclassified);
        assert_eq!(Finish::Classified(7).position(), Some(7));
        assert!(!Finish::Unclassified.is_classified());
    }
}
