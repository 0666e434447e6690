//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Token and invite settings.
    pub auth: AuthConfig,
    /// Uploaded media storage.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Background maintenance loop.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    #[serde(default = "default_url")]
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Require TLS for the connection.
    #[serde(default)]
    pub ssl: bool,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access and refresh tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: i64,
    /// Days before a pending organization invite expires.
    #[serde(default = "default_invite_ttl_days")]
    pub invite_ttl_days: i64,
}

/// Storage configuration for uploaded media.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory files are written to.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Public URL prefix; derived from `server.url` when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Maximum size of a single file in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Maximum number of files accepted by one request.
    #[serde(default = "default_max_files")]
    pub max_files_per_request: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            base_url: None,
            max_file_size: default_max_file_size(),
            max_files_per_request: default_max_files(),
        }
    }
}

/// Maintenance loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Whether the loop runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between runs.
    #[serde(default = "default_maintenance_interval")]
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_maintenance_interval(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_access_ttl() -> i64 {
    15 * 60
}

const fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

const fn default_invite_ttl_days() -> i64 {
    7
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./uploads")
}

const fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

const fn default_max_files() -> usize {
    10
}

const fn default_maintenance_interval() -> u64 {
    60
}

const fn default_true() -> bool {
    true
}

/// Plain environment variables accepted alongside the prefixed ones.
const COMPAT_ENV_OVERRIDES: [(&str, &str); 5] = [
    ("PORT", "server.port"),
    ("BASE_URL", "server.url"),
    ("JWT_SECRET", "auth.jwt_secret"),
    ("DATABASE_URL", "database.url"),
    ("DATABASE_SSL", "database.ssl"),
];

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `POLLHUB_ENV`)
    /// 4. Environment variables with `POLLHUB_` prefix
    /// 5. `PORT`, `BASE_URL`, `JWT_SECRET`, `DATABASE_URL`, `DATABASE_SSL`
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("POLLHUB_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("POLLHUB")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in COMPAT_ENV_OVERRIDES {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("POLLHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Public URL prefix for stored files.
    #[must_use]
    pub fn storage_base_url(&self) -> String {
        self.storage.base_url.clone().unwrap_or_else(|| {
            format!("{}/uploads", self.server.url.trim_end_matches('/'))
        })
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if self.auth.access_token_ttl_secs <= 0 || self.auth.refresh_token_ttl_secs <= 0 {
            return Err(config::ConfigError::Message(
                "token lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Config, config::ConfigError> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults_are_applied() {
        let config = parse(
            r#"
            [server]
            [database]
            url = "postgres://localhost/pollhub"
            [auth]
            jwt_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(!config.database.ssl);
        assert_eq!(config.auth.access_token_ttl_secs, 900);
        assert_eq!(config.auth.refresh_token_ttl_secs, 604_800);
        assert_eq!(config.auth.invite_ttl_days, 7);
        assert_eq!(config.storage.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.storage_base_url(), "http://localhost:3000/uploads");
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let result = parse(
            r#"
            [server]
            [database]
            url = "postgres://localhost/pollhub"
            [auth]
            jwt_secret = "  "
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_storage_url_wins() {
        let config = parse(
            r#"
            [server]
            url = "https://polls.example.com/"
            [database]
            url = "postgres://localhost/pollhub"
            ssl = true
            [auth]
            jwt_secret = "secret"
            [storage]
            base_url = "https://cdn.example.com/media"
            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.database.ssl);
        assert_eq!(config.storage_base_url(), "https://cdn.example.com/media");
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
