//! Run coordinator: one scrape-and-reconcile run end to end.
//!
//! Sequences orchestration → reconciliation → optional export and folds
//! everything into the tri-state `RunReport`. Per-source failures were
//! already absorbed downstream; only reconciliation- or export-stage
//! failures escalate to `RunStatus::Error` here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::application::export;
use crate::application::orchestrator::{OrchestratorReport, SourceOrchestrator};
use crate::domain::record::ServiceDateRecord;
use crate::domain::run::{RunReport, RunStatus};
use crate::infrastructure::config::SourceConfig;
use crate::infrastructure::repository::{ReconcileSummary, ServiceDateRepository};
use crate::infrastructure::session::SessionFactory;

pub struct RunCoordinator<F: SessionFactory> {
    orchestrator: SourceOrchestrator<F>,
    repository: ServiceDateRepository,
    sources: Vec<SourceConfig>,
    export_directory: PathBuf,
}

impl<F: SessionFactory> RunCoordinator<F> {
    pub fn new(
        orchestrator: SourceOrchestrator<F>,
        repository: ServiceDateRepository,
        sources: Vec<SourceConfig>,
        export_directory: PathBuf,
    ) -> Self {
        Self {
            orchestrator,
            repository,
            sources,
            export_directory,
        }
    }

    /// Execute one run, stamping `run_date` onto everything it persists.
    ///
    /// Never returns an error; every outcome is folded into the report so
    /// callers only ever see the tri-state plus a readable message.
    pub async fn execute(&self, run_date: NaiveDate, persist_json_export: bool) -> RunReport {
        info!(%run_date, sources = self.sources.len(), "starting run");

        let orchestrated = self.orchestrator.run_all(&self.sources).await;

        if orchestrated.records.is_empty() {
            warn!("run produced no records, keeping the previous snapshot");
            return self.warning_report(run_date, orchestrated);
        }

        match self
            .reconcile_and_export(&orchestrated.records, run_date, persist_json_export)
            .await
        {
            Ok(summary) => self.success_report(run_date, orchestrated, summary),
            Err(err) => {
                error!(error = %format!("{err:#}"), "run failed");
                RunReport {
                    run_date,
                    status: RunStatus::Error,
                    message: format!("Run failed: {err:#}"),
                    records_total: 0,
                    sources: orchestrated.sources,
                }
            }
        }
    }

    async fn reconcile_and_export(
        &self,
        records: &[ServiceDateRecord],
        run_date: NaiveDate,
        persist_json_export: bool,
    ) -> Result<ReconcileSummary> {
        let summary = self
            .repository
            .reconcile(records, run_date)
            .await
            .context("reconciliation failed")?;

        if persist_json_export {
            let snapshot = self
                .repository
                .active_snapshot()
                .await
                .context("snapshot read for export failed (store already updated)")?;
            export::write_snapshot_export(&self.export_directory, run_date, &snapshot)
                .await
                .context("snapshot export failed (store already updated)")?;
        }

        Ok(summary)
    }

    fn success_report(
        &self,
        run_date: NaiveDate,
        orchestrated: OrchestratorReport,
        summary: ReconcileSummary,
    ) -> RunReport {
        let failed = orchestrated.failed_sources();
        let mut message = format!(
            "Updated {} service dates from {} sources",
            summary.records,
            self.sources.len() - failed
        );
        if failed > 0 {
            message.push_str(&format!(" ({failed} sources reported errors)"));
        }

        RunReport {
            run_date,
            status: RunStatus::Success,
            message,
            records_total: summary.records,
            sources: orchestrated.sources,
        }
    }

    fn warning_report(&self, run_date: NaiveDate, orchestrated: OrchestratorReport) -> RunReport {
        RunReport {
            run_date,
            status: RunStatus::Warning,
            message: "No records scraped; existing data left unchanged".to_string(),
            records_total: 0,
            sources: orchestrated.sources,
        }
    }
}
