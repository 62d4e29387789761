//! Configuration management for PeerDesk services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Journal store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Manuscript store configuration
    #[serde(default)]
    pub manuscripts: ManuscriptConfig,

    /// Notification dispatcher configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Persistence backend behind the journal store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Which backend to use
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Database URL (required for postgres)
    pub url: Option<String>,

    /// Apply migrations at startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Backend behind the manuscript store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManuscriptBackend {
    Memory,
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManuscriptConfig {
    #[serde(default = "default_manuscript_backend")]
    pub backend: ManuscriptBackend,

    /// Directory for the local backend
    #[serde(default = "default_manuscript_root")]
    pub root_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[serde(default = "default_manuscript_max_bytes")]
    pub max_bytes: usize,
}

/// Where notifications are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSinkKind {
    Log,
    Webhook,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_sink")]
    pub sink: NotificationSinkKind,

    /// Target for the webhook sink
    pub webhook_url: Option<String>,

    /// Pending notifications held before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-delivery timeout in seconds
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret shared with the identity provider for token validation
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds (token tooling only)
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_store_backend() -> StoreBackend { StoreBackend::Memory }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_manuscript_backend() -> ManuscriptBackend { ManuscriptBackend::Memory }
fn default_manuscript_root() -> PathBuf { PathBuf::from("manuscripts") }
fn default_manuscript_max_bytes() -> usize { 50 * 1024 * 1024 }
fn default_notification_sink() -> NotificationSinkKind { NotificationSinkKind::Log }
fn default_queue_capacity() -> usize { 1024 }
fn default_notification_timeout() -> u64 { 5 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "peerdesk".to_string() }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__DATABASE__BACKEND=postgres
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            run_migrations: default_enabled(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for ManuscriptConfig {
    fn default() -> Self {
        Self {
            backend: default_manuscript_backend(),
            root_dir: default_manuscript_root(),
            max_bytes: default_manuscript_max_bytes(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sink: default_notification_sink(),
            webhook_url: None,
            queue_capacity: default_queue_capacity(),
            timeout_secs: default_notification_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.manuscripts.backend, ManuscriptBackend::Memory);
        assert_eq!(config.notifications.sink, NotificationSinkKind::Log);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peerdesk.toml");
        std::fs::write(
            &path,
            r#"
            [database]
            backend = "postgres"
            url = "postgres://localhost/peerdesk"

            [notifications]
            sink = "webhook"
            webhook_url = "http://localhost:9000/hooks"
            "#,
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.database.backend, StoreBackend::Postgres);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.notifications.sink, NotificationSinkKind::Webhook);
        assert_eq!(config.notifications.queue_capacity, 1024);
        assert_eq!(config.server.port, 8080);
    }
}
