//! CLI trigger for one scrape-and-reconcile run.
//!
//! The presentation front ends call into the library directly; this binary
//! is the manual/scheduled equivalent of their refresh button.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tracing::info;

use aufgebotsdaten::application::{PaginationDriver, RunCoordinator, SourceOrchestrator};
use aufgebotsdaten::domain::run::RunStatus;
use aufgebotsdaten::infrastructure::config::defaults;
use aufgebotsdaten::infrastructure::{
    logging, AppConfig, DatabaseConnection, HttpClient, HttpSessionFactory, ServiceDateRepository,
};

const USAGE: &str = "\
aufgebotsdaten - scrape the Swiss service-date listings into the local store

USAGE:
    aufgebotsdaten [--config <path>] [--export-json]

OPTIONS:
    --config <path>   Configuration file (default: data/aufgebotsdaten.json)
    --export-json     Also write a timestamped JSON export of the snapshot
    -h, --help        Show this help
";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let export_json = args.iter().any(|a| a == "--export-json");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_PATH));

    let config = AppConfig::load_or_create(&config_path).await?;
    logging::init_logging(&config.logging)?;

    info!("Starting service-date update");

    let db = DatabaseConnection::new(&config.database.url).await?;
    db.migrate().await?;
    let repository = ServiceDateRepository::new(db.pool().clone());

    let client = Arc::new(HttpClient::new(&config.http)?);
    let factory = HttpSessionFactory::new(
        client,
        config.scraping.selectors.clone(),
        config.scraping.page_load_timeout(),
        config.scraping.poll_interval(),
    );
    let driver = PaginationDriver::new(
        config.scraping.max_pages,
        config.scraping.indicator_timeout(),
        config.scraping.next_locators.clone(),
    );
    let orchestrator = SourceOrchestrator::new(factory, driver);
    let coordinator = RunCoordinator::new(
        orchestrator,
        repository,
        config.sources.clone(),
        config.export.directory.clone(),
    );

    let run_date = Local::now().date_naive();
    let report = coordinator.execute(run_date, export_json).await;

    println!("{}: {}", report.status.as_str().to_uppercase(), report.message);
    for source in &report.sources {
        match &source.error {
            Some(error) => println!(
                "  {} {} - {} records over {} pages, error: {}",
                source.language, source.url, source.record_count, source.pages_visited, error
            ),
            None => println!(
                "  {} {} - {} records over {} pages",
                source.language, source.url, source.record_count, source.pages_visited
            ),
        }
    }

    Ok(match report.status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Warning => ExitCode::from(1),
        RunStatus::Error => ExitCode::from(2),
    })
}
