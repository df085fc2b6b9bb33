//! Run-level reporting types.
//!
//! A run is never persisted as such; only the stamped effect on the stored
//! rows is durable. These types exist so callers get a closed tri-state
//! outcome plus per-source detail instead of string sentinels.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::record::Language;

/// Overall outcome of one scrape-and-reconcile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Records were produced and the store was reconciled.
    Success,
    /// No records were produced; the store was left untouched.
    Warning,
    /// A failure outside the per-source isolation boundary.
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// What happened for a single configured source during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOutcome {
    pub language: Language,
    pub url: String,
    pub record_count: usize,
    pub pages_visited: u32,
    /// Per-source failure note; `None` when the source completed cleanly.
    pub error: Option<String>,
}

/// Full report of one run, surfaced to callers and front ends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub status: RunStatus,
    pub message: String,
    pub records_total: usize,
    pub sources: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
