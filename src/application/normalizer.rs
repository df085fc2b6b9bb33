//! Row normalization for the scraped listing tables.
//!
//! Converts the raw cell texts of one table row (troop/school, start date,
//! end date in the sources' `dd.mm.yyyy` form) into a typed
//! `ServiceDateRecord`. Bad rows are reported per row so a page with a few
//! broken entries still yields the rest.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::domain::record::{Language, ServiceDateRecord};

/// Cell count a well-formed listing row carries.
pub const EXPECTED_CELLS: usize = 3;

/// Date format used by all three source listings.
pub const SERVICE_DATE_FORMAT: &str = "%d.%m.%Y";

/// Raw cell texts of one table row, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

/// Row-level normalization failure. Logged and skipped, never fatal to a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("malformed row: {reason}")]
    Malformed { reason: String },

    #[error("unparseable date '{value}'")]
    DateParse { value: String },

    #[error("start date {start} is after end date {end}")]
    DateOrder { start: NaiveDate, end: NaiveDate },
}

/// Parse one date cell. Empty text means the date is absent/unknown.
pub fn parse_service_date(text: &str) -> Result<Option<NaiveDate>, RowError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, SERVICE_DATE_FORMAT)
        .map(Some)
        .map_err(|_| RowError::DateParse {
            value: trimmed.to_string(),
        })
}

/// Render a date in the sources' display form. Inverse of [`parse_service_date`].
pub fn format_service_date(date: NaiveDate) -> String {
    date.format(SERVICE_DATE_FORMAT).to_string()
}

/// Normalize one raw row into a record tagged with the source language.
pub fn normalize_row(language: Language, row: &RawRow) -> Result<ServiceDateRecord, RowError> {
    if row.cells.len() < EXPECTED_CELLS {
        return Err(RowError::Malformed {
            reason: format!("expected {EXPECTED_CELLS} cells, got {}", row.cells.len()),
        });
    }

    let troop_school = row.cells[0].trim();
    if troop_school.is_empty() {
        return Err(RowError::Malformed {
            reason: "empty troop/school name".to_string(),
        });
    }

    let start_date = parse_service_date(&row.cells[1])?;
    let end_date = parse_service_date(&row.cells[2])?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(RowError::DateOrder { start, end });
        }
    }

    Ok(ServiceDateRecord {
        language,
        troop_school: troop_school.to_string(),
        start_date,
        end_date,
    })
}

/// Result of normalizing one page worth of rows.
#[derive(Debug, Default)]
pub struct PageRecords {
    pub records: Vec<ServiceDateRecord>,
    pub skipped: u32,
}

/// Normalize every row of a page, logging and skipping the broken ones.
pub fn normalize_page(language: Language, rows: &[RawRow]) -> PageRecords {
    let mut page = PageRecords::default();
    for (index, row) in rows.iter().enumerate() {
        match normalize_row(language, row) {
            Ok(record) => page.records.push(record),
            Err(error) => {
                warn!(%language, row = index, %error, "skipping row");
                page.skipped += 1;
            }
        }
    }
    page
}
