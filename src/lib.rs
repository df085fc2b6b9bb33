//! Aufgebotsdaten - Swiss armed forces service-date scraper and lookup backend
//!
//! Scrapes the paginated service-date listings published in German, French
//! and Italian, reconciles them into a SQLite store with an active snapshot
//! plus a historical audit trail, and exposes a filterable read view and a
//! run trigger for the presentation front ends.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export the public surface for front ends and the CLI
pub use application::coordinator::RunCoordinator;
pub use application::orchestrator::SourceOrchestrator;
pub use application::pagination::PaginationDriver;
pub use domain::record::{DisplayRecord, Language, ServiceDateFilters, ServiceDateRecord};
pub use domain::run::{RunReport, RunStatus, SourceOutcome};
pub use infrastructure::config::AppConfig;
pub use infrastructure::database_connection::DatabaseConnection;
pub use infrastructure::repository::ServiceDateRepository;
