use matchcast_models::{MatchcastError, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::migrations::MIGRATOR;

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Server-side cap on every statement. Zero leaves the server default.
    pub statement_timeout: Duration,
}

/// Owns at most one live pool per process.
///
/// The pool is created on first use, shared by every invocation after that,
/// and rebuilt if it is found closed or fails a health check.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    connect_options: PgConnectOptions,
    pool: Mutex<Option<PgPool>>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        if settings.url.trim().is_empty() {
            return Err(MatchcastError::Config("database url is not set".to_string()));
        }
        let options = PgConnectOptions::from_str(&settings.url)
            .map_err(|e| MatchcastError::Config(format!("invalid database url: {e}")))?;
        Ok(Self::with_connect_options(options, settings))
    }

    /// Connects with `options` instead of parsing `settings.url`.
    pub fn with_connect_options(options: PgConnectOptions, settings: ConnectionSettings) -> Self {
        let connect_options = if settings.statement_timeout.is_zero() {
            options
        } else {
            options.options([(
                "statement_timeout",
                settings.statement_timeout.as_millis().to_string(),
            )])
        };
        Self {
            settings,
            connect_options,
            pool: Mutex::new(None),
        }
    }

    pub async fn pool(&self) -> Result<PgPool> {
        let mut slot = self.pool.lock().await;
        if let Some(pool) = slot.as_ref() {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
            warn!("database pool was closed, reconnecting");
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.settings.acquire_timeout)
            .connect_with(self.connect_options.clone())
            .await?;
        info!(
            max_connections = self.settings.max_connections,
            statement_timeout_ms = self.settings.statement_timeout.as_millis(),
            "database connected"
        );

        *slot = Some(pool.clone());
        Ok(pool)
    }

    /// Pings the database. A failed ping drops the pool so the next
    /// `pool()` call reconnects.
    pub async fn health_check(&self) -> Result<bool> {
        let pool = self.pool().await?;
        match sqlx::query("SELECT 1 AS health").fetch_one(&pool).await {
            Ok(row) => Ok(row.get::<i32, _>("health") == 1),
            Err(e) => {
                warn!(error = %e, "database health check failed, dropping pool");
                pool.close().await;
                self.pool.lock().await.take();
                Ok(false)
            }
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let pool = self.pool().await?;
        MIGRATOR.run(&pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}
