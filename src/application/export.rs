//! JSON export of a run's snapshot.
//!
//! A pure output for downstream consumers; the pipeline never reads these
//! files back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::fs;
use tracing::info;

use crate::domain::record::ExportRecord;

/// Write the snapshot as `service_dates_<run date>.json` in `directory`.
pub async fn write_snapshot_export(
    directory: &Path,
    run_date: NaiveDate,
    snapshot: &[ExportRecord],
) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .await
        .with_context(|| format!("Failed to create export directory: {}", directory.display()))?;

    let path = directory.join(format!("service_dates_{}.json", run_date.format("%Y-%m-%d")));
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write export file: {}", path.display()))?;

    info!(records = snapshot.len(), path = %path.display(), "snapshot exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Language;

    #[tokio::test]
    async fn writes_a_timestamped_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let run_date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let snapshot = vec![ExportRecord {
            language: Language::De,
            troop_school: "Inf Bat 1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 15),
            scrape_date: run_date,
        }];

        let path = write_snapshot_export(dir.path(), run_date, &snapshot)
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "service_dates_2025-03-10.json"
        );

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0]["language"], "DE");
        assert_eq!(parsed[0]["troopSchool"], "Inf Bat 1");
        assert_eq!(parsed[0]["startDate"], "2025-02-01");
        assert_eq!(parsed[0]["scrapeDate"], "2025-03-10");
    }
}
