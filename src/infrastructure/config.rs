//! Configuration infrastructure
//!
//! Configuration for the service-date scraper: source listings, scraping
//! behaviour, persistence, export and logging. Persisted as a JSON file
//! next to the data directory; a default file is written on first run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::domain::record::Language;
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::session::{ListingSelectors, NextControlLocator};

/// Built-in defaults.
pub mod defaults {
    pub const MAX_PAGES: u32 = 50;
    pub const PAGE_LOAD_TIMEOUT_SECONDS: u64 = 10;
    pub const INDICATOR_TIMEOUT_SECONDS: u64 = 10;
    pub const POLL_INTERVAL_MS: u64 = 500;
    pub const DATABASE_URL: &str = "sqlite:data/service_dates.db";
    pub const EXPORT_DIRECTORY: &str = "data";
    pub const CONFIG_PATH: &str = "data/aufgebotsdaten.json";
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIRECTORY: &str = "logs";
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// The paginated listings to scrape, one per language.
    pub sources: Vec<SourceConfig>,

    /// Pagination and extraction behaviour.
    pub scraping: ScrapingConfig,

    /// HTTP client settings.
    pub http: HttpClientConfig,

    /// SQLite storage.
    pub database: DatabaseConfig,

    /// JSON export target.
    pub export: ExportConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// One (language, URL) pair representing one paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub language: Language,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Hard cap on pages walked per source, whatever the indicator claims.
    pub max_pages: u32,

    /// Bounded wait for the listing root to appear.
    pub page_load_timeout_seconds: u64,

    /// Bounded wait for the pagination indicator to change after advancing.
    pub indicator_timeout_seconds: u64,

    /// Poll interval inside the bounded waits.
    pub poll_interval_ms: u64,

    /// CSS selectors for the listing table and pager.
    pub selectors: ListingSelectors,

    /// Ordered strategies for locating the next-page control.
    pub next_locators: Vec<NextControlLocator>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::MAX_PAGES,
            page_load_timeout_seconds: defaults::PAGE_LOAD_TIMEOUT_SECONDS,
            indicator_timeout_seconds: defaults::INDICATOR_TIMEOUT_SECONDS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            selectors: ListingSelectors::default(),
            next_locators: NextControlLocator::default_set(),
        }
    }
}

impl ScrapingConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_seconds)
    }

    pub fn indicator_timeout(&self) -> Duration {
        Duration::from_secs(self.indicator_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:data/service_dates.db`.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory the timestamped JSON exports are written to.
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::EXPORT_DIRECTORY),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,

    /// Enable console output.
    pub console_output: bool,

    /// Enable file output.
    pub file_output: bool,

    /// Directory for log files.
    pub directory: PathBuf,

    /// Module-specific log level filters (e.g. "sqlx": "warn").
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: false,
            directory: PathBuf::from(defaults::LOG_DIRECTORY),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// The three armee.ch listings, one per language.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            language: Language::De,
            url: "https://www.armee.ch/de/aufgebotsdaten".to_string(),
        },
        SourceConfig {
            language: Language::Fr,
            url: "https://www.armee.ch/fr/dates-de-convocation".to_string(),
        },
        SourceConfig {
            language: Language::It,
            url: "https://www.armee.ch/it/date-di-chiamata-in-servizio".to_string(),
        },
    ]
}

impl AppConfig {
    /// A ready-to-run configuration with the built-in source set.
    pub fn with_default_sources() -> Self {
        Self {
            sources: default_sources(),
            ..Self::default()
        }
    }

    /// Load the configuration file, writing a default one on first run.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            info!("No config file found, creating default at {}", path.display());
            let config = Self::with_default_sources();
            config.save(path).await?;
            Ok(config)
        }
    }

    /// Persist the configuration as pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
