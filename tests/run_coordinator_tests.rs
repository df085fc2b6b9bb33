//! End-to-end run outcomes: tri-state status, isolation, export.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use aufgebotsdaten::application::{PaginationDriver, RunCoordinator, SourceOrchestrator};
use aufgebotsdaten::domain::record::{Language, ServiceDateFilters};
use aufgebotsdaten::domain::run::RunStatus;
use aufgebotsdaten::infrastructure::config::SourceConfig;
use aufgebotsdaten::infrastructure::{
    DatabaseConnection, NextControlLocator, ServiceDateRepository,
};
use common::{page, ScriptSpec, ScriptedFactory};

const DE_URL: &str = "scripted://de";
const FR_URL: &str = "scripted://fr";
const IT_URL: &str = "scripted://it";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            language: Language::De,
            url: DE_URL.to_string(),
        },
        SourceConfig {
            language: Language::Fr,
            url: FR_URL.to_string(),
        },
        SourceConfig {
            language: Language::It,
            url: IT_URL.to_string(),
        },
    ]
}

fn one_page_script(troop: &str) -> ScriptSpec {
    ScriptSpec::pages(vec![page(
        &[[troop, "01.02.2025", "15.02.2025"]],
        "Seite 1 von 1",
    )])
}

async fn setup(
    scripts: HashMap<String, ScriptSpec>,
) -> (TempDir, ServiceDateRepository, RunCoordinator<ScriptedFactory>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let db = DatabaseConnection::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    let repository = ServiceDateRepository::new(db.pool().clone());

    let factory = ScriptedFactory::new(scripts);
    let driver = PaginationDriver::new(
        20,
        Duration::from_millis(50),
        NextControlLocator::default_set(),
    );
    let orchestrator = SourceOrchestrator::new(factory, driver);
    let coordinator = RunCoordinator::new(
        orchestrator,
        repository.clone(),
        sources(),
        dir.path().join("exports"),
    );

    (dir, repository, coordinator)
}

#[tokio::test]
async fn a_clean_run_reports_success_and_fills_the_snapshot() {
    let scripts = HashMap::from([
        (DE_URL.to_string(), one_page_script("Inf Bat 1")),
        (FR_URL.to_string(), one_page_script("ER inf 2")),
        (IT_URL.to_string(), one_page_script("Bat fant mont 9")),
    ]);
    let (_dir, repository, coordinator) = setup(scripts).await;

    let report = coordinator.execute(date(2025, 1, 10), false).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.records_total, 3);
    assert!(report.sources.iter().all(|s| s.error.is_none()));

    let snapshot = repository
        .query_service_dates(&ServiceDateFilters::default())
        .await
        .unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(repository.last_run_date().await.unwrap(), Some(date(2025, 1, 10)));
}

#[tokio::test]
async fn a_failing_source_does_not_stop_the_others() {
    let scripts = HashMap::from([
        (DE_URL.to_string(), ScriptSpec::failing_open()),
        (FR_URL.to_string(), one_page_script("ER inf 2")),
        (IT_URL.to_string(), one_page_script("Bat fant mont 9")),
    ]);
    let (_dir, repository, coordinator) = setup(scripts).await;

    let report = coordinator.execute(date(2025, 1, 10), false).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.records_total, 2);

    let de = report
        .sources
        .iter()
        .find(|s| s.language == Language::De)
        .unwrap();
    assert!(de.error.is_some());
    assert_eq!(de.record_count, 0);

    let snapshot = repository
        .query_service_dates(&ServiceDateFilters::default())
        .await
        .unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().all(|r| r.language != "DE"));
}

#[tokio::test]
async fn every_session_is_closed_even_when_sources_fail() {
    let scripts = HashMap::from([
        (DE_URL.to_string(), ScriptSpec::failing_open()),
        (FR_URL.to_string(), one_page_script("ER inf 2")),
        (IT_URL.to_string(), one_page_script("Bat fant mont 9")),
    ]);
    let factory = ScriptedFactory::new(scripts);
    let session_log = factory.session_log();
    let driver = PaginationDriver::new(
        20,
        Duration::from_millis(50),
        NextControlLocator::default_set(),
    );
    let orchestrator = SourceOrchestrator::new(factory, driver);

    let report = orchestrator.run_all(&sources()).await;
    assert_eq!(report.sources.len(), 3);

    let created = session_log.lock().unwrap();
    assert_eq!(created.len(), 3);
    for (url, telemetry) in created.iter() {
        assert!(telemetry.is_closed(), "session for {url} was not closed");
    }
}

#[tokio::test]
async fn an_empty_run_warns_and_leaves_the_previous_snapshot_alone() {
    let scripts = HashMap::from([
        (DE_URL.to_string(), one_page_script("Inf Bat 1")),
        (FR_URL.to_string(), one_page_script("ER inf 2")),
        (IT_URL.to_string(), one_page_script("Bat fant mont 9")),
    ]);
    let (_dir, repository, coordinator) = setup(scripts).await;
    coordinator.execute(date(2025, 1, 10), false).await;

    // A second coordinator whose sources all come up empty.
    let empty_scripts = HashMap::from([
        (DE_URL.to_string(), ScriptSpec::pages(vec![])),
        (FR_URL.to_string(), ScriptSpec::pages(vec![])),
        (IT_URL.to_string(), ScriptSpec::pages(vec![])),
    ]);
    let factory = ScriptedFactory::new(empty_scripts);
    let driver = PaginationDriver::new(
        20,
        Duration::from_millis(50),
        NextControlLocator::default_set(),
    );
    let empty_coordinator = RunCoordinator::new(
        SourceOrchestrator::new(factory, driver),
        repository.clone(),
        sources(),
        std::env::temp_dir(),
    );

    let report = empty_coordinator.execute(date(2025, 1, 20), false).await;

    assert_eq!(report.status, RunStatus::Warning);
    assert_eq!(report.records_total, 0);

    let snapshot = repository
        .query_service_dates(&ServiceDateFilters::default())
        .await
        .unwrap();
    assert_eq!(snapshot.len(), 3, "previous snapshot must survive");
    assert_eq!(
        repository.last_run_date().await.unwrap(),
        Some(date(2025, 1, 10)),
        "an empty run must not advance the run date"
    );
}

#[tokio::test]
async fn a_stalled_source_contributes_its_partial_pages() {
    let stalled = ScriptSpec {
        pages: vec![page(
            &[["Inf Bat 1", "01.02.2025", "15.02.2025"]],
            "Seite 1 von 4",
        )],
        fail_open: false,
        freeze_indicator: true,
    };
    let scripts = HashMap::from([
        (DE_URL.to_string(), stalled),
        (FR_URL.to_string(), one_page_script("ER inf 2")),
        (IT_URL.to_string(), one_page_script("Bat fant mont 9")),
    ]);
    let (_dir, repository, coordinator) = setup(scripts).await;

    let report = coordinator.execute(date(2025, 1, 10), false).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.records_total, 3);

    let de = report
        .sources
        .iter()
        .find(|s| s.language == Language::De)
        .unwrap();
    assert_eq!(de.record_count, 1, "page-1 rows are kept");
    assert!(de.error.is_some(), "the stall is recorded per source");

    let snapshot = repository
        .query_service_dates(&ServiceDateFilters::default())
        .await
        .unwrap();
    assert!(snapshot.iter().any(|r| r.language == "DE"));
}

#[tokio::test]
async fn the_export_file_is_written_on_request() {
    let scripts = HashMap::from([
        (DE_URL.to_string(), one_page_script("Inf Bat 1")),
        (FR_URL.to_string(), one_page_script("ER inf 2")),
        (IT_URL.to_string(), one_page_script("Bat fant mont 9")),
    ]);
    let (dir, _repository, coordinator) = setup(scripts).await;

    let report = coordinator.execute(date(2025, 1, 10), true).await;
    assert_eq!(report.status, RunStatus::Success);

    let export_path = dir.path().join("exports/service_dates_2025-01-10.json");
    let content = tokio::fs::read_to_string(&export_path).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);
    assert_eq!(parsed[0]["scrapeDate"], "2025-01-10");
}
