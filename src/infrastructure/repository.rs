//! Reconciliation store for service-date records.
//!
//! Sole owner of the two persisted tables. `active_service_dates` is the
//! current-truth snapshot, replaced wholesale on every successful run;
//! `service_date_history` is the append/upsert audit trail where vanished
//! entries are flagged inactive instead of deleted. Reconciliation commits
//! as one transaction: a crash mid-run leaves both tables as they were.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::application::normalizer::format_service_date;
use crate::domain::record::{
    DisplayRecord, ExportRecord, Language, ServiceDateFilters, ServiceDateRecord,
};

/// What a reconciliation pass did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Distinct records written to the snapshot.
    pub records: usize,
    /// Exact duplicates collapsed before writing.
    pub duplicates_collapsed: usize,
    /// History rows inserted (first-ever observations).
    pub history_inserted: u64,
    /// History rows re-stamped (seen again).
    pub history_updated: u64,
    /// History rows left inactive after this run.
    pub history_inactive: u64,
}

/// One audit-trail row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub record: ServiceDateRecord,
    /// Last run in which the record was observed.
    pub scrape_date: NaiveDate,
    /// Whether the record was part of the most recent snapshot.
    pub active: bool,
}

/// Repository over the snapshot and history tables.
#[derive(Clone)]
pub struct ServiceDateRepository {
    pool: Arc<SqlitePool>,
}

impl ServiceDateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Reconcile one run's aggregated records against the store.
    ///
    /// Dedups by full-field equality, stamps every survivor with `run_date`,
    /// replaces the snapshot, upserts the history by business key and flags
    /// everything not seen this run inactive — all inside one transaction.
    ///
    /// Callers must not pass an empty set (the coordinator short-circuits
    /// that to a warning); the repository refuses it rather than wiping a
    /// previously good snapshot.
    pub async fn reconcile(
        &self,
        records: &[ServiceDateRecord],
        run_date: NaiveDate,
    ) -> Result<ReconcileSummary> {
        if records.is_empty() {
            anyhow::bail!("refusing to reconcile an empty record set");
        }

        let unique: BTreeSet<&ServiceDateRecord> = records.iter().collect();
        let duplicates_collapsed = records.len() - unique.len();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin reconciliation transaction")?;

        // Snapshot: full replace, never a merge.
        sqlx::query("DELETE FROM active_service_dates")
            .execute(&mut *tx)
            .await?;
        for record in &unique {
            sqlx::query(
                r#"
                INSERT INTO active_service_dates
                (language, troop_school, start_date, end_date, scrape_date)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.language.code())
            .bind(&record.troop_school)
            .bind(record.start_date)
            .bind(record.end_date)
            .bind(run_date)
            .execute(&mut *tx)
            .await?;
        }

        // History: flag everything inactive, then re-activate and re-stamp
        // exactly the keys observed this run. Rows not seen keep their old
        // scrape_date and end up inactive.
        sqlx::query("UPDATE service_date_history SET active = 0")
            .execute(&mut *tx)
            .await?;

        let mut history_inserted = 0u64;
        let mut history_updated = 0u64;
        for record in &unique {
            // The business key contains nullable dates, so the match uses
            // null-safe IS comparison instead of a unique-index upsert.
            let update = sqlx::query(
                r#"
                UPDATE service_date_history
                SET scrape_date = ?, active = 1
                WHERE language = ? AND troop_school = ?
                  AND start_date IS ? AND end_date IS ?
                "#,
            )
            .bind(run_date)
            .bind(record.language.code())
            .bind(&record.troop_school)
            .bind(record.start_date)
            .bind(record.end_date)
            .execute(&mut *tx)
            .await?;

            if update.rows_affected() == 0 {
                sqlx::query(
                    r#"
                    INSERT INTO service_date_history
                    (language, troop_school, start_date, end_date, scrape_date, active)
                    VALUES (?, ?, ?, ?, ?, 1)
                    "#,
                )
                .bind(record.language.code())
                .bind(&record.troop_school)
                .bind(record.start_date)
                .bind(record.end_date)
                .bind(run_date)
                .execute(&mut *tx)
                .await?;
                history_inserted += 1;
            } else {
                history_updated += update.rows_affected();
            }
        }

        let history_inactive: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM service_date_history WHERE active = 0")
                .fetch_one(&mut *tx)
                .await?;

        tx.commit()
            .await
            .context("Failed to commit reconciliation transaction")?;

        let summary = ReconcileSummary {
            records: unique.len(),
            duplicates_collapsed,
            history_inserted,
            history_updated,
            history_inactive: history_inactive as u64,
        };
        info!(?summary, %run_date, "reconciliation committed");
        Ok(summary)
    }

    /// Filterable read over the snapshot, dates rendered for display.
    pub async fn query_service_dates(
        &self,
        filters: &ServiceDateFilters,
    ) -> Result<Vec<DisplayRecord>> {
        let mut sql = String::from(
            "SELECT language, troop_school, start_date, end_date \
             FROM active_service_dates WHERE 1=1",
        );
        if filters.language.is_some() {
            sql.push_str(" AND language = ?");
        }
        if filters.troop_school_contains.is_some() {
            sql.push_str(" AND troop_school LIKE '%' || ? || '%'");
        }
        if filters.start_date_from.is_some() {
            sql.push_str(" AND start_date >= ?");
        }
        if filters.end_date_to.is_some() {
            sql.push_str(" AND end_date <= ?");
        }
        sql.push_str(" ORDER BY start_date, end_date, troop_school");

        let mut query = sqlx::query(&sql);
        if let Some(language) = filters.language {
            query = query.bind(language.code());
        }
        if let Some(fragment) = &filters.troop_school_contains {
            query = query.bind(fragment.clone());
        }
        if let Some(from) = filters.start_date_from {
            query = query.bind(from);
        }
        if let Some(to) = filters.end_date_to {
            query = query.bind(to);
        }

        let rows = query.fetch_all(&*self.pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(DisplayRecord {
                    language: row.get("language"),
                    troop_school: row.get("troop_school"),
                    start_date: row
                        .get::<Option<NaiveDate>, _>("start_date")
                        .map(format_service_date),
                    end_date: row
                        .get::<Option<NaiveDate>, _>("end_date")
                        .map(format_service_date),
                })
            })
            .collect()
    }

    /// The date of the most recent run that touched the store, if any.
    pub async fn last_run_date(&self) -> Result<Option<NaiveDate>> {
        let max: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(scrape_date) FROM service_date_history")
                .fetch_one(&*self.pool)
                .await?;
        Ok(max)
    }

    /// Languages present in the current snapshot (filter dropdowns).
    pub async fn distinct_languages(&self) -> Result<Vec<Language>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT language FROM active_service_dates ORDER BY language")
                .fetch_all(&*self.pool)
                .await?;
        codes
            .into_iter()
            .map(|code| code.parse::<Language>().map_err(|e| anyhow::anyhow!(e)))
            .collect()
    }

    /// The full current snapshot in export form (ISO dates).
    pub async fn active_snapshot(&self) -> Result<Vec<ExportRecord>> {
        let rows = sqlx::query(
            "SELECT language, troop_school, start_date, end_date, scrape_date \
             FROM active_service_dates ORDER BY language, start_date, troop_school",
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let language: String = row.get("language");
                Ok(ExportRecord {
                    language: language.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    troop_school: row.get("troop_school"),
                    start_date: row.get("start_date"),
                    end_date: row.get("end_date"),
                    scrape_date: row.get("scrape_date"),
                })
            })
            .collect()
    }

    /// The full audit trail, newest observations first.
    pub async fn history(&self) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT language, troop_school, start_date, end_date, scrape_date, active \
             FROM service_date_history \
             ORDER BY scrape_date DESC, language, troop_school",
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let language: String = row.get("language");
                Ok(HistoryRecord {
                    record: ServiceDateRecord {
                        language: language.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                        troop_school: row.get("troop_school"),
                        start_date: row.get("start_date"),
                        end_date: row.get("end_date"),
                    },
                    scrape_date: row.get("scrape_date"),
                    active: row.get("active"),
                })
            })
            .collect()
    }
}
