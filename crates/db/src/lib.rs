//! Database layer for pollhub.

pub mod entities;
pub mod migrations;
pub mod repositories;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use pollhub_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Connection URL with TLS required when `ssl` is set.
fn connection_url(url: &str, ssl: bool) -> String {
    if !ssl || url.contains("sslmode=") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}sslmode=require")
}

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(connection_url(&config.database.url, config.database.ssl));

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::connection_url;

    #[test]
    fn test_connection_url_ssl() {
        assert_eq!(
            connection_url("postgres://localhost/pollhub", true),
            "postgres://localhost/pollhub?sslmode=require"
        );
        assert_eq!(
            connection_url("postgres://localhost/pollhub?application_name=x", true),
            "postgres://localhost/pollhub?application_name=x&sslmode=require"
        );
        assert_eq!(
            connection_url("postgres://localhost/pollhub?sslmode=disable", true),
            "postgres://localhost/pollhub?sslmode=disable"
        );
        assert_eq!(
            connection_url("postgres://localhost/pollhub", false),
            "postgres://localhost/pollhub"
        );
    }
}
