//! Application layer - the scrape-and-reconcile pipeline
//!
//! Normalization, pagination driving, per-source orchestration and run
//! coordination. Everything here works against the session and repository
//! seams from the infrastructure layer.

pub mod coordinator;
pub mod export;
pub mod normalizer;
pub mod orchestrator;
pub mod pagination;

pub use coordinator::RunCoordinator;
pub use orchestrator::{OrchestratorReport, SourceOrchestrator};
pub use pagination::{Harvest, PaginationDriver, Termination};
