//! Season aggregates per driver and per constructor.

use std::collections::{BTreeMap, BTreeSet};

use crate::records::{ConstructorSeasonMetrics, DriverSeasonMetrics, Qualifying, RaceResult};

/// One row per (driver, season) present in `results`. Poles come from `qualifying`.
pub fn driver_season_metrics(
    results: &[RaceResult],
    qualifying: &[Qualifying],
) -> Vec<DriverSeasonMetrics> {
    let mut by_driver: BTreeMap<(&str, i32), Vec<&RaceResult>> = BTreeMap::new();
    for r in results {
        by_driver.entry((r.driver_id.as_str(), r.season)).or_default().push(r);
    }

    let mut poles: BTreeMap<(&str, i32), u32> = BTreeMap::new();
    for q in qualifying.iter().filter(|q| q.position == 1) {
        *poles.entry((q.driver_id.as_str(), q.season)).or_default() += 1;
    }

    by_driver
        .into_iter()
        .map(|((driver_id, season), rows)| {
            let finishes: Vec<f64> = rows.iter().filter_map(|r| r.position()).map(f64::from).collect();
            let entered = rows.len() as u32;
            let total_points: f64 = rows.iter().map(|r| r.points).sum();
            let grids: Vec<f64> = rows.iter().map(|r| f64::from(r.grid)).collect();

            DriverSeasonMetrics {
                driver_id: driver_id.to_string(),
                season,
                races_entered: entered,
                races_finished: finishes.len() as u32,
                podiums: count_where(&rows, |p| p <= 3),
                wins: count_where(&rows, |p| p == 1),
                poles: poles.get(&(driver_id, season)).copied().unwrap_or(0),
                dnf_count: rows.iter().filter(|r| !r.finish.is_classified()).count() as u32,
                avg_finish_position: mean(&finishes).map(round3),
                avg_grid_position: mean(&grids).map(round3),
                avg_points_per_race: round3(total_points / f64::from(entered.max(1))),
                total_points: round3(total_points),
                position_changes_sum: rows.iter().filter_map(|r| r.position_change).sum(),
                consistency_score: round3(population_std_dev(&finishes)),
            }
        })
        .collect()
}

/// One row per (constructor, season) present in `results`.
pub fn constructor_season_metrics(results: &[RaceResult]) -> Vec<ConstructorSeasonMetrics> {
    let mut by_constructor: BTreeMap<(&str, i32), Vec<&RaceResult>> = BTreeMap::new();
    for r in results {
        by_constructor
            .entry((r.constructor_id.as_str(), r.season))
            .or_default()
            .push(r);
    }

    by_constructor
        .into_iter()
        .map(|((constructor_id, season), rows)| {
            let mut by_round: BTreeMap<i32, Vec<&RaceResult>> = BTreeMap::new();
            for &r in &rows {
                by_round.entry(r.round).or_default().push(r);
            }

            let one_two_finishes = by_round
                .values()
                .filter(|entries| {
                    let mut positions: Vec<i32> = entries.iter().filter_map(|r| r.position()).collect();
                    positions.sort_unstable();
                    positions.len() >= 2 && positions[0] == 1 && positions[1] == 2
                })
                .count() as u32;

            let double_dnf = by_round
                .values()
                .filter(|entries| {
                    entries.len() >= 2 && entries.iter().all(|r| !r.finish.is_classified())
                })
                .count() as u32;

            let finishes: Vec<f64> = rows.iter().filter_map(|r| r.position()).map(f64::from).collect();
            let rounds: BTreeSet<i32> = rows.iter().map(|r| r.round).collect();

            ConstructorSeasonMetrics {
                constructor_id: constructor_id.to_string(),
                season,
                races_entered: rounds.len() as u32,
                podiums: count_where(&rows, |p| p <= 3),
                wins: count_where(&rows, |p| p == 1),
                one_two_finishes,
                double_dnf,
                avg_finish_position: mean(&finishes).map(round3),
                total_points: round3(rows.iter().map(|r| r.points).sum()),
                reliability_rate: reliability_rate(finishes.len(), rows.len()),
            }
        })
        .collect()
}

fn count_where(rows: &[&RaceResult], pred: impl Fn(i32) -> bool) -> u32 {
    rows.iter().filter_map(|r| r.position()).filter(|&p| pred(p)).count() as u32
}

/// `100 * finished / entries`, rounded to 2 decimals; 0 with no entries.
pub fn reliability_rate(finished: usize, entries: usize) -> f64 {
    if entries == 0 {
        return 0.0;
    }
    let rate = 100.0 * finished as f64 / entries as f64;
    (rate * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation; 0 below two samples so the score stays orderable.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Finish;

    fn result(round: i32, driver: &str, constructor: &str, position: Option<i32>, grid: i32) -> RaceResult {
        let points = match position {
            Some(1) => 25.0,
            Some(2) => 18.0,
            Some(3) => 15.0,
            Some(4) => 12.0,
            _ => 0.0,
        };
        RaceResult {
            season: 2021,
            round,
            driver_id: driver.to_string(),
            constructor_id: constructor.to_string(),
            number: None,
            grid,
            finish: Finish::from(position),
            position_text: position.map_or("R".to_string(), |p| p.to_string()),
            position_order: position.unwrap_or(20),
            points,
            laps: 50,
            status: None,
            time_millis: None,
            fastest_lap: None,
            fastest_lap_rank: None,
            fastest_lap_time: None,
            fastest_lap_speed: None,
            position_change: position.map(|p| grid - p),
        }
    }

    fn pole(round: i32, driver: &str) -> Qualifying {
        Qualifying {
            season: 2021,
            round,
            driver_id: driver.to_string(),
            constructor_id: "mercedes".to_string(),
            position: 1,
            q1: None,
            q2: None,
            q3: None,
        }
    }

    #[test]
    fn test_one_two_finish_counted_per_round() {
        let results = vec![
            result(5, "ham", "mercedes", Some(1), 2),
            result(5, "bot", "mercedes", Some(2), 1),
            result(5, "ver", "red_bull", Some(3), 3),
        ];
        let metrics = constructor_season_metrics(&results);
        let merc = metrics.iter().find(|m| m.constructor_id == "mercedes").unwrap();
        assert_eq!(merc.one_two_finishes, 1);
        assert_eq!(merc.races_entered, 1);
        assert_eq!(merc.podiums, 2);
        assert_eq!(merc.wins, 1);
        assert_eq!(merc.total_points, 43.0);
        assert_eq!(merc.reliability_rate, 100.0);

        let rbr = metrics.iter().find(|m| m.constructor_id == "red_bull").unwrap();
        assert_eq!(rbr.one_two_finishes, 0);
    }

    #[test]
    fn test_one_two_requires_exact_top_two() {
        let results = vec![
            result(1, "ham", "mercedes", Some(1), 1),
            result(1, "bot", "mercedes", Some(3), 2),
        ];
        assert_eq!(constructor_season_metrics(&results)[0].one_two_finishes, 0);
    }

    #[test]
    fn test_double_dnf_needs_two_entries() {
        let results = vec![
            result(3, "ham", "mercedes", None, 1),
            result(3, "bot", "mercedes", None, 2),
            result(4, "ham", "mercedes", None, 1),
            result(5, "ham", "mercedes", Some(4), 1),
            result(5, "bot", "mercedes", None, 2),
        ];
        let m = &constructor_season_metrics(&results)[0];
        assert_eq!(m.double_dnf, 1);
        assert_eq!(m.races_entered, 3);
        assert_eq!(m.reliability_rate, 20.0);
    }

    #[test]
    fn test_reliability_rate_bounds_and_rounding() {
        assert_eq!(reliability_rate(0, 0), 0.0);
        assert_eq!(reliability_rate(2, 3), 66.67);
        assert_eq!(reliability_rate(3, 3), 100.0);
        assert_eq!(reliability_rate(0, 5), 0.0);
    }

    #[test]
    fn test_driver_counts_and_averages() {
        let results = vec![
            result(1, "ham", "mercedes", Some(1), 2),
            result(2, "ham", "mercedes", Some(2), 4),
            result(3, "ham", "mercedes", None, 3),
            result(4, "ham", "mercedes", Some(4), 1),
        ];
        let qualifying = vec![pole(1, "ham"), pole(4, "ham"), pole(2, "bot")];
        let metrics = driver_season_metrics(&results, &qualifying);
        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.races_entered, 4);
        assert_eq!(m.races_finished, 3);
        assert_eq!(m.dnf_count, 1);
        assert_eq!(m.podiums, 2);
        assert_eq!(m.wins, 1);
        assert_eq!(m.poles, 2);
        assert_eq!(m.avg_finish_position, Some(2.333));
        assert_eq!(m.avg_grid_position, Some(2.5));
        assert_eq!(m.total_points, 55.0);
        assert_eq!(m.avg_points_per_race, 13.75);
        // (2-1) + (4-2) + (1-4)
        assert_eq!(m.position_changes_sum, 0);
        // population std of [1, 2, 4]
        assert_eq!(m.consistency_score, 1.247);
    }

    #[test]
    fn test_consistency_zero_below_two_finishes() {
        let results = vec![
            result(1, "sch", "haas", Some(12), 18),
            result(2, "sch", "haas", None, 19),
            result(1, "maz", "haas", None, 20),
        ];
        let metrics = driver_season_metrics(&results, &[]);
        for m in &metrics {
            assert_eq!(m.consistency_score, 0.0);
        }
        let maz = metrics.iter().find(|m| m.driver_id == "maz").unwrap();
        assert_eq!(maz.avg_finish_position, None);
        assert_eq!(maz.races_finished, 0);
    }

    #[test]
    fn test_population_std_dev() {
        assert_eq!(population_std_dev(&[]), 0.0);
        assert_eq!(population_std_dev(&[5.0]), 0.0);
        assert_eq!(population_std_dev(&[1.0, 3.0]), 1.0);
        assert_eq!(population_std_dev(&[2.0, 2.0, 2.0]), 0.0);
    }
}
