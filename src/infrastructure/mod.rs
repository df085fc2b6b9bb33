//! Infrastructure layer - configuration, HTTP, sessions and persistence

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod repository;
pub mod session;

pub use config::AppConfig;
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig};
pub use repository::{HistoryRecord, ReconcileSummary, ServiceDateRepository};
pub use session::{
    HttpListingSession, HttpSessionFactory, ListingSelectors, ListingSession, NextControlLocator,
    SessionError, SessionFactory,
};
