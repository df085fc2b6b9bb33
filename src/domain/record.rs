//! Core entities for service-date announcements.
//!
//! A `ServiceDateRecord` is one row of a source table, identified by the
//! full (language, troop/school, start, end) tuple — there is no surrogate
//! id, observation metadata lives on the persisted rows instead.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Language of a configured source listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    De,
    Fr,
    It,
}

impl Language {
    /// Two-letter code as stored in the database and shown to callers.
    pub fn code(self) -> &'static str {
        match self {
            Self::De => "DE",
            Self::Fr => "FR",
            Self::It => "IT",
        }
    }

    pub const ALL: [Self; 3] = [Self::De, Self::Fr, Self::It];
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DE" => Ok(Self::De),
            "FR" => Ok(Self::Fr),
            "IT" => Ok(Self::It),
            other => Err(format!("unknown language code: {other}")),
        }
    }
}

/// One announced service date as displayed on a source table.
///
/// Equality over all four fields is the business key used for dedup and
/// for the historical upsert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDateRecord {
    pub language: Language,
    pub troop_school: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Filter options for the read view. Unset fields impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct ServiceDateFilters {
    /// Exact language match; `None` means all languages.
    pub language: Option<Language>,
    /// Substring match on the troop/school name.
    pub troop_school_contains: Option<String>,
    /// Inclusive lower bound on the start date.
    pub start_date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the end date.
    pub end_date_to: Option<NaiveDate>,
}

/// A snapshot row rendered for the presentation front ends, dates in the
/// `dd.mm.yyyy` display format rather than the ISO storage form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRecord {
    pub language: String,
    pub troop_school: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// A snapshot row as written to the JSON export (ISO dates).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub language: Language,
    pub troop_school: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub scrape_date: NaiveDate,
}
