//! Source orchestrator: runs the pagination driver once per configured
//! source and aggregates the results.
//!
//! Failure isolation boundary: whatever happens to one source — open
//! failure, stall, selector misconfiguration — is caught here, logged,
//! recorded in that source's outcome, and never stops the other sources.

use tracing::{error, info};

use crate::application::pagination::PaginationDriver;
use crate::domain::record::ServiceDateRecord;
use crate::domain::run::SourceOutcome;
use crate::infrastructure::config::SourceConfig;
use crate::infrastructure::session::{ListingSession, SessionFactory};

/// Aggregated result of one pass over every configured source.
#[derive(Debug)]
pub struct OrchestratorReport {
    pub records: Vec<ServiceDateRecord>,
    pub sources: Vec<SourceOutcome>,
}

impl OrchestratorReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

pub struct SourceOrchestrator<F: SessionFactory> {
    factory: F,
    driver: PaginationDriver,
}

impl<F: SessionFactory> SourceOrchestrator<F> {
    pub fn new(factory: F, driver: PaginationDriver) -> Self {
        Self { factory, driver }
    }

    /// Scrape every source sequentially; each session is opened, driven and
    /// closed before the next source starts.
    pub async fn run_all(&self, sources: &[SourceConfig]) -> OrchestratorReport {
        let mut records = Vec::new();
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            info!(language = %source.language, url = %source.url, "scraping source");

            let mut session = self.factory.create(&source.url);
            let result = self.driver.drive(&mut session, source.language).await;
            session.close().await;

            let outcome = match result {
                Ok(harvest) => {
                    let outcome = SourceOutcome {
                        language: source.language,
                        url: source.url.clone(),
                        record_count: harvest.records.len(),
                        pages_visited: harvest.pages_visited,
                        error: harvest.termination.error_note(),
                    };
                    records.extend(harvest.records);
                    outcome
                }
                Err(err) => {
                    error!(language = %source.language, %err, "source failed");
                    SourceOutcome {
                        language: source.language,
                        url: source.url.clone(),
                        record_count: 0,
                        pages_visited: 0,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        info!(
            records = records.len(),
            sources = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.error.is_some()).count(),
            "orchestration finished"
        );

        OrchestratorReport {
            records,
            sources: outcomes,
        }
    }
}
