//! Database connection handling
//!
//! A [`DatabaseConnection`] is an explicit session value handed to the
//! analyzer and the executor; nothing here is global.

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;

use crate::config::ConnectionProfile;
use crate::error::{Error, Result};

/// MySQL session used for one reconciliation run
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: MySqlPool,
    database: String,
}

impl DatabaseConnection {
    /// Connect using a profile from the declarative document
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let timeout_seconds = profile.timeout_seconds.unwrap_or(30);
        let port: u16 = profile.port.trim().parse().map_err(|_| {
            Error::ConfigError(format!("port {} of database {} is not a number", profile.port, profile.name))
        })?;

        let options = MySqlConnectOptions::new()
            .host(&profile.host)
            .port(port)
            .username(&profile.user)
            .password(&profile.pass)
            .database(&profile.name)
            .charset(primary_charset(&profile.charset))
            .collation(&profile.collation);

        // DDL runs strictly one statement at a time over a single session
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::DatabaseError(format!(
                    "Failed to connect to {}@{}:{}/{}: {}",
                    profile.user, profile.host, port, profile.name, e
                ))
            })?;

        tracing::info!(host = %profile.host, port, database = %profile.name, "Connected");

        Ok(Self {
            pool,
            database: profile.name.clone(),
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Schema the connection was opened on
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Execute a SQL statement
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// `utf8mb4,utf8` lists fallbacks; the driver takes the first one
fn primary_charset(charset: &str) -> &str {
    charset
        .split(',')
        .map(str::trim)
        .find(|c| !c.is_empty())
        .unwrap_or("utf8mb4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_listed_charset_wins() {
        assert_eq!(primary_charset("utf8mb4,utf8"), "utf8mb4");
        assert_eq!(primary_charset(" latin1 "), "latin1");
        assert_eq!(primary_charset(""), "utf8mb4");
    }
}
