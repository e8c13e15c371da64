//! Best-effort on-disk copies of raw API payloads, for debugging.
//!
//! Layout under the archive root:
//! `<season>/races.json`, `<season>/<round>/{results,qualifying}.json`,
//! `<season>[/<round>]/{driver,constructor}_standings.json`.
//! Nothing reads these files back.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RawArchive {
    root: PathBuf,
}

impl RawArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the archived payload for a category.
    pub fn path_for(&self, season: i32, round: Option<i32>, category: &str) -> PathBuf {
        let mut path = self.root.join(season.to_string());
        if let Some(round) = round {
            path.push(round.to_string());
        }
        path.push(format!("{category}.json"));
        path
    }

    /// Write a payload. Failures are logged and swallowed.
    pub fn save(&self, season: i32, round: Option<i32>, category: &str, payload: &Value) {
        let path = self.path_for(season, round, category);
        if let Err(e) = write_pretty(&path, payload) {
            log::warn!("Could not archive raw payload to {}: {e}", path.display());
        } else {
            log::debug!("Archived {}", path.display());
        }
    }
}

fn write_pretty(path: &Path, payload: &Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(payload)?;
    fs::write(path, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_layout() {
        let archive = RawArchive::new("/data/raw");
        assert_eq!(
            archive.path_for(2023, None, "races"),
            PathBuf::from("/data/raw/2023/races.json")
        );
        assert_eq!(
            archive.path_for(2023, Some(7), "qualifying"),
            PathBuf::from("/data/raw/2023/7/qualifying.json")
        );
    }

    #[test]
    fn test_save_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let archive = RawArchive::new(dir.path());
        archive.save(2021, Some(3), "results", &json!({"MRData": {"total": "20"}}));

        let written = fs::read_to_string(dir.path().join("2021/3/results.json")).unwrap();
        assert!(written.contains('\n'));
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["MRData"]["total"], "20");
    }

    #[test]
    fn test_save_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // a file where the season directory should be
        fs::write(dir.path().join("2021"), "occupied").unwrap();
        let archive = RawArchive::new(dir.path());
        archive.save(2021, None, "races", &json!({}));
        assert!(!dir.path().join("2021/races.json").exists());
    }
}
