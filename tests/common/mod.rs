//! Scripted listing sessions for driving the pipeline without a network.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use aufgebotsdaten::application::normalizer::RawRow;
use aufgebotsdaten::infrastructure::{
    ListingSession, NextControlLocator, SessionError, SessionFactory,
};

/// One synthetic listing page.
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub rows: Vec<RawRow>,
    pub indicator: Option<String>,
}

/// Convenience constructor for a page of (troop, start, end) rows.
pub fn page(rows: &[[&str; 3]], indicator: &str) -> ScriptedPage {
    ScriptedPage {
        rows: rows.iter().map(|cells| RawRow::new(cells.to_vec())).collect(),
        indicator: Some(indicator.to_string()),
    }
}

/// Counters a test can inspect after the session was consumed.
#[derive(Debug, Default)]
pub struct SessionTelemetry {
    pub activations: Mutex<u32>,
    pub waits: Mutex<u32>,
    pub closed: Mutex<bool>,
}

impl SessionTelemetry {
    pub fn activations(&self) -> u32 {
        *self.activations.lock().unwrap()
    }

    pub fn waits(&self) -> u32 {
        *self.waits.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

/// A listing session that walks a scripted page sequence.
pub struct ScriptedSession {
    pages: Vec<ScriptedPage>,
    index: usize,
    fail_open: bool,
    freeze_indicator: bool,
    pub telemetry: Arc<SessionTelemetry>,
}

impl ScriptedSession {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages,
            index: 0,
            fail_open: false,
            freeze_indicator: false,
            telemetry: Arc::new(SessionTelemetry::default()),
        }
    }

    /// The listing root never appears.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// The next control activates but the view never moves.
    pub fn with_frozen_indicator(mut self) -> Self {
        self.freeze_indicator = true;
        self
    }
}

#[async_trait]
impl ListingSession for ScriptedSession {
    async fn open(&mut self) -> Result<(), SessionError> {
        if self.fail_open {
            return Err(SessionError::Navigation {
                url: "scripted://source".to_string(),
                reason: "listing root not found".to_string(),
            });
        }
        Ok(())
    }

    fn visible_rows(&self) -> Vec<RawRow> {
        self.pages
            .get(self.index)
            .map(|p| p.rows.clone())
            .unwrap_or_default()
    }

    fn page_indicator(&self) -> Option<String> {
        self.pages.get(self.index).and_then(|p| p.indicator.clone())
    }

    async fn activate_next(
        &mut self,
        _locators: &[NextControlLocator],
    ) -> Result<bool, SessionError> {
        *self.telemetry.activations.lock().unwrap() += 1;
        if self.freeze_indicator {
            // The control is clickable, the page just never changes.
            return Ok(true);
        }
        if self.index + 1 < self.pages.len() {
            self.index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn await_indicator_change(
        &mut self,
        previous: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        *self.telemetry.waits.lock().unwrap() += 1;
        match self.page_indicator() {
            Some(current) if current != previous => Ok(current),
            _ => Err(SessionError::Stall {
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn close(&mut self) {
        *self.telemetry.closed.lock().unwrap() = true;
    }
}

/// Per-URL script for a factory-created session.
#[derive(Clone, Default)]
pub struct ScriptSpec {
    pub pages: Vec<ScriptedPage>,
    pub fail_open: bool,
    pub freeze_indicator: bool,
}

impl ScriptSpec {
    pub fn pages(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

/// Shared log of sessions a factory handed out, by source URL.
pub type SessionLog = Arc<Mutex<Vec<(String, Arc<SessionTelemetry>)>>>;

/// Session factory handing out scripted sessions by source URL.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: HashMap<String, ScriptSpec>,
    created: SessionLog,
}

impl ScriptedFactory {
    pub fn new(scripts: HashMap<String, ScriptSpec>) -> Self {
        Self {
            scripts,
            created: SessionLog::default(),
        }
    }

    /// Handle to the creation log; survives moving the factory into an
    /// orchestrator.
    pub fn session_log(&self) -> SessionLog {
        Arc::clone(&self.created)
    }
}

impl SessionFactory for ScriptedFactory {
    type Session = ScriptedSession;

    fn create(&self, url: &str) -> Self::Session {
        let spec = self.scripts.get(url).cloned().unwrap_or_default();
        let mut session = ScriptedSession::new(spec.pages);
        if spec.fail_open {
            session = session.failing_open();
        }
        if spec.freeze_indicator {
            session = session.with_frozen_indicator();
        }
        self.created
            .lock()
            .unwrap()
            .push((url.to_string(), Arc::clone(&session.telemetry)));
        session
    }
}
