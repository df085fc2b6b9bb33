//! Listing sessions: the stateful paged view a pagination driver operates on.
//!
//! The three source listings render one table plus a pager ("Seite X von Y" /
//! "Page X de Y" / "Pagina X da Y"). `ListingSession` is the seam between the
//! driver's state machine and the transport; the production implementation
//! fetches pages over HTTP and reads them with `scraper`. Test code scripts
//! synthetic sessions against the same trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::application::normalizer::RawRow;
use crate::infrastructure::http_client::HttpClient;

/// Source-level session failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The listing root did not appear, or a page could not be loaded at all.
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// The next-page control was activated but the pagination indicator
    /// never changed within the bounded wait.
    #[error("pagination stalled: indicator unchanged after {waited_ms}ms")]
    Stall { waited_ms: u64 },

    /// A configured CSS selector does not parse.
    #[error("invalid selector '{selector}'")]
    Selector { selector: String },
}

/// CSS selectors for reading a source listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Table rows holding one announcement each.
    pub row: String,
    /// Cells within a row.
    pub cell: String,
    /// Pagination indicator element.
    pub indicator: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            row: "table tbody tr".to_string(),
            cell: "td".to_string(),
            indicator: "div.my-5.flex.items-center.justify-center span".to_string(),
        }
    }
}

impl ListingSelectors {
    /// Validate every configured selector up front so runtime extraction
    /// never has to deal with a parse failure.
    pub fn validate(&self) -> Result<(), SessionError> {
        for selector in [&self.row, &self.cell, &self.indicator] {
            parse_selector(selector)?;
        }
        Ok(())
    }
}

/// One strategy for locating the next-page control. Strategies are tried in
/// order; the first one that yields a usable, enabled element wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NextControlLocator {
    /// The nth button (or anchor) inside a pager container.
    PagerButton { container: String, index: usize },
    /// Direct CSS selector for the control itself.
    Css { selector: String },
    /// Any anchor carrying `rel="next"`.
    RelNext,
}

impl NextControlLocator {
    /// Default strategy order for the armee.ch listings: the second pager
    /// button, then aria-labelled controls, then a rel=next link.
    pub fn default_set() -> Vec<Self> {
        vec![
            Self::PagerButton {
                container: "div.my-5.flex.items-center.justify-center".to_string(),
                index: 1,
            },
            Self::Css {
                selector: "button[aria-label*='next' i], a[aria-label*='next' i]".to_string(),
            },
            Self::RelNext,
        ]
    }

    fn validate(&self) -> Result<(), SessionError> {
        match self {
            Self::PagerButton { container, .. } => parse_selector(container).map(|_| ()),
            Self::Css { selector } => parse_selector(selector).map(|_| ()),
            Self::RelNext => Ok(()),
        }
    }
}

/// A usable next-page control found by a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextControl {
    /// Resolved navigation target, when the control exposes one.
    pub href: Option<String>,
}

fn parse_selector(selector: &str) -> Result<Selector, SessionError> {
    Selector::parse(selector).map_err(|_| SessionError::Selector {
        selector: selector.to_string(),
    })
}

fn element_is_enabled(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if value.attr("disabled").is_some() {
        return false;
    }
    if value.attr("aria-disabled") == Some("true") {
        return false;
    }
    let class = value.attr("class").unwrap_or_default();
    !class.contains("cursor-not-allowed") && !class.split_whitespace().any(|c| c == "disabled")
}

/// Try every locator in order against the current document.
pub(crate) fn locate_next_control(
    doc: &Html,
    locators: &[NextControlLocator],
) -> Result<Option<NextControl>, SessionError> {
    for locator in locators {
        let candidate = match locator {
            NextControlLocator::PagerButton { container, index } => {
                let container_selector = parse_selector(container)?;
                let control_selector = parse_selector("button, a")?;
                doc.select(&container_selector)
                    .next()
                    .and_then(|c| c.select(&control_selector).nth(*index))
            }
            NextControlLocator::Css { selector } => {
                let control_selector = parse_selector(selector)?;
                doc.select(&control_selector).next()
            }
            NextControlLocator::RelNext => {
                let control_selector = parse_selector(r#"a[rel~="next"]"#)?;
                doc.select(&control_selector).next()
            }
        };

        if let Some(element) = candidate {
            if element_is_enabled(&element) {
                return Ok(Some(NextControl {
                    href: element.value().attr("href").map(str::to_string),
                }));
            }
            debug!(?locator, "next control found but disabled");
        }
    }
    Ok(None)
}

pub(crate) fn extract_rows(doc: &Html, selectors: &ListingSelectors) -> Vec<RawRow> {
    let Ok(row_selector) = Selector::parse(&selectors.row) else {
        return Vec::new();
    };
    let Ok(cell_selector) = Selector::parse(&selectors.cell) else {
        return Vec::new();
    };

    doc.select(&row_selector)
        .map(|row| RawRow {
            cells: row
                .select(&cell_selector)
                .map(|cell| cell.text().collect::<String>())
                .collect(),
        })
        .collect()
}

pub(crate) fn extract_indicator(doc: &Html, selector: &str) -> Option<String> {
    let indicator_selector = Selector::parse(selector).ok()?;
    doc.select(&indicator_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// The stateful paged view one driver owns exclusively for the duration of
/// a source scrape. Opened by the orchestrator, closed on every exit path.
#[async_trait]
pub trait ListingSession: Send {
    /// Navigate to the listing root; succeeds once the table is present.
    async fn open(&mut self) -> Result<(), SessionError>;

    /// Raw cell texts of every row currently displayed.
    fn visible_rows(&self) -> Vec<RawRow>;

    /// Current pagination indicator text, if one is rendered.
    fn page_indicator(&self) -> Option<String>;

    /// Activate the next-page control. `Ok(false)` when the control is
    /// absent or disabled — the normal last-page condition.
    async fn activate_next(
        &mut self,
        locators: &[NextControlLocator],
    ) -> Result<bool, SessionError>;

    /// Wait until the indicator differs from `previous`, bounded by `timeout`.
    async fn await_indicator_change(
        &mut self,
        previous: &str,
        timeout: Duration,
    ) -> Result<String, SessionError>;

    /// Release the underlying resources.
    async fn close(&mut self);
}

/// Creates one session per source. The orchestrator owns the factory;
/// tests substitute scripted implementations.
pub trait SessionFactory: Send + Sync {
    type Session: ListingSession;

    fn create(&self, url: &str) -> Self::Session;
}

/// Production session: fetches listing pages over HTTP and reads them as
/// parsed documents. The document is re-parsed from the retained body on
/// access so the session stays `Send` across await points.
pub struct HttpListingSession {
    client: Arc<HttpClient>,
    selectors: ListingSelectors,
    url: String,
    current_url: String,
    page_number: u32,
    body: Option<String>,
    open_timeout: Duration,
    poll_interval: Duration,
}

impl HttpListingSession {
    pub fn new(
        client: Arc<HttpClient>,
        selectors: ListingSelectors,
        url: impl Into<String>,
        open_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let url = url.into();
        Self {
            client,
            selectors,
            current_url: url.clone(),
            url,
            page_number: 1,
            body: None,
            open_timeout,
            poll_interval,
        }
    }

    fn document(&self) -> Option<Html> {
        self.body.as_deref().map(Html::parse_document)
    }

    fn has_listing_root(&self, doc: &Html) -> bool {
        !extract_rows(doc, &self.selectors).is_empty()
    }

    async fn fetch(&self, url: &str) -> Result<String, SessionError> {
        self.client
            .get_text(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Target URL for an advancement: prefer the control's own href,
    /// otherwise bump a `page` query parameter on the current URL.
    fn next_target(&self, control: &NextControl) -> Result<String, SessionError> {
        let current = Url::parse(&self.current_url).map_err(|e| SessionError::Navigation {
            url: self.current_url.clone(),
            reason: e.to_string(),
        })?;

        if let Some(href) = &control.href {
            return current
                .join(href)
                .map(Into::into)
                .map_err(|e| SessionError::Navigation {
                    url: href.clone(),
                    reason: e.to_string(),
                });
        }

        let mut target = current;
        let retained: Vec<(String, String)> = target
            .query_pairs()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = target.query_pairs_mut();
            pairs.clear();
            for (k, v) in &retained {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("page", &(self.page_number + 1).to_string());
        }
        Ok(target.into())
    }
}

#[async_trait]
impl ListingSession for HttpListingSession {
    async fn open(&mut self) -> Result<(), SessionError> {
        self.selectors.validate()?;

        let deadline = Instant::now() + self.open_timeout;
        let mut last_reason = "listing root not found".to_string();

        loop {
            match self.fetch(&self.url).await {
                Ok(body) => {
                    let doc = Html::parse_document(&body);
                    if self.has_listing_root(&doc) {
                        self.body = Some(body);
                        self.current_url = self.url.clone();
                        self.page_number = 1;
                        return Ok(());
                    }
                    last_reason = "listing root not found".to_string();
                }
                Err(SessionError::Navigation { reason, .. }) => last_reason = reason,
                Err(other) => return Err(other),
            }

            if Instant::now() >= deadline {
                return Err(SessionError::Navigation {
                    url: self.url.clone(),
                    reason: last_reason,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn visible_rows(&self) -> Vec<RawRow> {
        self.document()
            .map(|doc| extract_rows(&doc, &self.selectors))
            .unwrap_or_default()
    }

    fn page_indicator(&self) -> Option<String> {
        self.document()
            .and_then(|doc| extract_indicator(&doc, &self.selectors.indicator))
    }

    async fn activate_next(
        &mut self,
        locators: &[NextControlLocator],
    ) -> Result<bool, SessionError> {
        for locator in locators {
            locator.validate()?;
        }

        let control = match self.document() {
            Some(doc) => locate_next_control(&doc, locators)?,
            None => None,
        };
        let Some(control) = control else {
            return Ok(false);
        };

        let target = self.next_target(&control)?;
        let body = self.fetch(&target).await?;
        self.body = Some(body);
        self.current_url = target;
        self.page_number += 1;
        Ok(true)
    }

    async fn await_indicator_change(
        &mut self,
        previous: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            if let Some(current) = self.page_indicator() {
                if current != previous {
                    return Ok(current);
                }
            }

            if Instant::now() >= deadline {
                return Err(SessionError::Stall {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            tokio::time::sleep(self.poll_interval).await;

            // The page may simply have been served stale; reload it and
            // look again until the deadline passes.
            match self.fetch(&self.current_url).await {
                Ok(body) => self.body = Some(body),
                Err(error) => debug!(%error, "reload during indicator wait failed"),
            }
        }
    }

    async fn close(&mut self) {
        self.body = None;
        debug!(url = %self.url, "listing session closed");
    }
}

/// Factory wiring the shared HTTP client into per-source sessions.
pub struct HttpSessionFactory {
    client: Arc<HttpClient>,
    selectors: ListingSelectors,
    open_timeout: Duration,
    poll_interval: Duration,
}

impl HttpSessionFactory {
    pub fn new(
        client: Arc<HttpClient>,
        selectors: ListingSelectors,
        open_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            selectors,
            open_timeout,
            poll_interval,
        }
    }
}

impl SessionFactory for HttpSessionFactory {
    type Session = HttpListingSession;

    fn create(&self, url: &str) -> Self::Session {
        HttpListingSession::new(
            Arc::clone(&self.client),
            self.selectors.clone(),
            url,
            self.open_timeout,
            self.poll_interval,
        )
    }
}
