//! Pagination driver: walks one source listing page by page.
//!
//! State machine over a [`ListingSession`]:
//! `Start → Loaded(1) → [Extract → Advance → Loaded(n+1)]* → Done | Aborted`.
//! Page-count discovery reads the pagination indicator once; advancement is
//! confirmed by watching that indicator change. Partial results survive every
//! abnormal stop — the driver never discards work it already did.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::application::normalizer::{self, RawRow};
use crate::domain::record::{Language, ServiceDateRecord};
use crate::infrastructure::session::{ListingSession, NextControlLocator, SessionError};

/// Two integers embedded in surrounding words, whatever the language:
/// "Seite 3 von 12", "Page 3 de 12", "Pagina 3 da 12".
static PAGE_INDICATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\D+(\d+)").unwrap());

/// Extract (current, total) from a pagination indicator text.
pub fn parse_page_indicator(text: &str) -> Option<(u32, u32)> {
    let captures = PAGE_INDICATOR.captures(text)?;
    let current = captures.get(1)?.as_str().parse().ok()?;
    let total = captures.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

/// Why the walk over a source ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Normal end: last page reached or the next control was gone/disabled.
    Completed,
    /// The hard page cap stopped the walk.
    PageCapReached,
    /// Advancement stopped confirming; whatever was gathered is kept.
    Stalled(String),
}

impl Termination {
    pub fn error_note(&self) -> Option<String> {
        match self {
            Self::Completed | Self::PageCapReached => None,
            Self::Stalled(reason) => Some(reason.clone()),
        }
    }
}

/// Everything one source walk produced.
#[derive(Debug)]
pub struct Harvest {
    pub records: Vec<ServiceDateRecord>,
    pub pages_visited: u32,
    pub rows_skipped: u32,
    pub termination: Termination,
}

/// Drives a single source listing end-to-end.
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    max_pages: u32,
    indicator_timeout: Duration,
    locators: Vec<NextControlLocator>,
}

impl PaginationDriver {
    pub fn new(
        max_pages: u32,
        indicator_timeout: Duration,
        locators: Vec<NextControlLocator>,
    ) -> Self {
        Self {
            max_pages: max_pages.max(1),
            indicator_timeout,
            locators,
        }
    }

    /// Walk the listing, normalizing rows as pages are visited.
    ///
    /// An `Err` is only possible while opening the session (the listing root
    /// never appeared); everything after that resolves to a [`Harvest`] so
    /// partial work is preserved.
    pub async fn drive<S: ListingSession>(
        &self,
        session: &mut S,
        language: Language,
    ) -> Result<Harvest, SessionError> {
        session.open().await?;

        let mut records: Vec<ServiceDateRecord> = Vec::new();
        let mut rows_skipped = 0u32;
        let mut pages_visited = 0u32;
        let mut total_pages: Option<u32> = None;
        let mut previous_rows: Option<Vec<RawRow>> = None;

        let termination = loop {
            pages_visited += 1;

            let rows = session.visible_rows();
            if previous_rows.as_ref() == Some(&rows) {
                // Same rows as the page before: the view did not really move.
                debug!(%language, page = pages_visited, "page repeated previous content, not re-collecting");
            } else {
                let normalized = normalizer::normalize_page(language, &rows);
                debug!(
                    %language,
                    page = pages_visited,
                    rows = rows.len(),
                    parsed = normalized.records.len(),
                    "extracted page"
                );
                records.extend(normalized.records);
                rows_skipped += normalized.skipped;
                previous_rows = Some(rows);
            }

            let indicator = session.page_indicator();
            let parsed = indicator.as_deref().and_then(parse_page_indicator);

            if total_pages.is_none() {
                match parsed {
                    Some((_, total)) => {
                        info!(%language, total, "discovered page count");
                        total_pages = Some(total);
                    }
                    None if pages_visited == 1 => warn!(
                        %language,
                        indicator = indicator.as_deref().unwrap_or("<missing>"),
                        cap = self.max_pages,
                        "could not read page count, walking under the hard cap"
                    ),
                    None => {}
                }
            }

            let current_page = parsed.map_or(pages_visited, |(current, _)| current);

            if let Some(total) = total_pages {
                if current_page >= total {
                    debug!(%language, current_page, total, "reached the last page");
                    break Termination::Completed;
                }
            }
            if pages_visited >= self.max_pages {
                warn!(%language, cap = self.max_pages, "hard page cap reached");
                break Termination::PageCapReached;
            }

            match session.activate_next(&self.locators).await {
                Ok(false) => {
                    debug!(%language, page = current_page, "next control absent or disabled");
                    break Termination::Completed;
                }
                Ok(true) => {
                    if let Some(before) = &indicator {
                        match session.await_indicator_change(before, self.indicator_timeout).await {
                            Ok(after) => debug!(%language, %after, "advancement confirmed"),
                            Err(error) => {
                                warn!(%language, %error, "advancement did not confirm");
                                break Termination::Stalled(error.to_string());
                            }
                        }
                    }
                    // Without an indicator there is nothing to confirm
                    // against; the hard cap bounds the walk instead.
                }
                Err(error) => {
                    warn!(%language, %error, "advancement failed");
                    break Termination::Stalled(error.to_string());
                }
            }
        };

        info!(
            %language,
            pages = pages_visited,
            records = records.len(),
            skipped = rows_skipped,
            ?termination,
            "source walk finished"
        );

        Ok(Harvest {
            records,
            pages_visited,
            rows_skipped,
            termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_parses_in_all_three_languages() {
        assert_eq!(parse_page_indicator("Seite 1 von 12"), Some((1, 12)));
        assert_eq!(parse_page_indicator("Page 4 de 9"), Some((4, 9)));
        assert_eq!(parse_page_indicator("Pagina 10 da 10"), Some((10, 10)));
    }

    #[test]
    fn indicator_tolerates_surrounding_noise() {
        assert_eq!(parse_page_indicator("  Seite 2 von 31 "), Some((2, 31)));
        assert_eq!(parse_page_indicator("«Page 7 / 8»"), Some((7, 8)));
    }

    #[test]
    fn unparseable_indicator_yields_none() {
        assert_eq!(parse_page_indicator("keine Einträge"), None);
        assert_eq!(parse_page_indicator("Seite 3"), None);
        assert_eq!(parse_page_indicator(""), None);
    }
}
