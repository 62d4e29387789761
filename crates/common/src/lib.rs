//! PeerDesk Common Library
//!
//! Shared code for the PeerDesk services including:
//! - Domain model (submissions, reviews, users)
//! - Submission lifecycle and review assignment engine
//! - Journal store interface with in-memory and PostgreSQL backends
//! - Manuscript storage and notification dispatch
//! - Error types, configuration, authentication, metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod manuscripts;
pub mod metrics;
pub mod notifications;

// Re-export commonly used types
pub use auth::{Actor, Role};
pub use config::AppConfig;
pub use db::JournalStore;
pub use errors::{AppError, Result};
pub use lifecycle::JournalService;
pub use manuscripts::ManuscriptStore;
pub use notifications::Dispatcher;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
