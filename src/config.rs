use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use matchcast_db::ConnectionSettings;
use matchcast_services::{AnalystConfig, GeneratorConfig, LedgerConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub analyst: AnalystSettings,
    pub generator: GeneratorSettings,
    pub ledger: LedgerSettings,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Per-statement server timeout; 0 disables it.
    pub statement_timeout_secs: u64,
    /// Keep everything in process memory instead of Postgres.
    pub in_memory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub horizon_hours: i64,
    pub max_per_run: u32,
    pub call_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub min_competition_sample: i64,
    pub default_weeks: u32,
    pub max_weeks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub cron_secret: Option<String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Self::defaults()?
            // Add in settings from configuration file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // MATCHCAST__ANALYST__MODEL=... etc.
            .add_source(Environment::with_prefix("MATCHCAST").separator("__"))
            // Well-known variables win over everything else
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("analyst.api_key", env::var("OPENAI_API_KEY").ok())?
            .set_override_option("scheduler.cron_secret", env::var("CRON_SECRET").ok())?
            .build()?;

        config.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.url", "postgresql://localhost:5432/matchcast_dev")?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 10)?
            .set_default("database.statement_timeout_secs", 15)?
            .set_default("database.in_memory", false)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("analyst.base_url", "https://api.openai.com/v1")?
            .set_default("analyst.model", "gpt-4o-mini")?
            .set_default("analyst.timeout_secs", 30)?
            .set_default("analyst.temperature", 0.7)?
            .set_default("analyst.max_tokens", 1200)?
            .set_default("generator.horizon_hours", 48)?
            .set_default("generator.max_per_run", 20)?
            .set_default("generator.call_delay_ms", 2000)?
            .set_default("ledger.min_competition_sample", 3)?
            .set_default("ledger.default_weeks", 8)?
            .set_default("ledger.max_weeks", 52)?
            .set_default("scheduler.enabled", false)?
            .set_default("scheduler.interval_secs", 3600)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            acquire_timeout: Duration::from_secs(self.database.acquire_timeout_secs),
            statement_timeout: Duration::from_secs(self.database.statement_timeout_secs),
        }
    }

    pub fn analyst_config(&self) -> AnalystConfig {
        AnalystConfig {
            api_key: self.analyst.api_key.clone(),
            base_url: self.analyst.base_url.clone(),
            model: self.analyst.model.clone(),
            timeout_secs: self.analyst.timeout_secs,
            temperature: self.analyst.temperature,
            max_tokens: self.analyst.max_tokens,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            horizon: chrono::Duration::hours(self.generator.horizon_hours),
            max_per_run: self.generator.max_per_run,
            call_delay: Duration::from_millis(self.generator.call_delay_ms),
            // Leave the HTTP client's own timeout room to fire first
            call_timeout: Duration::from_secs(self.analyst.timeout_secs + 15),
        }
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            min_competition_sample: self.ledger.min_competition_sample,
            default_weeks: self.ledger.default_weeks,
            max_weeks: self.ledger.max_weeks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AppConfig = AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert!(config.analyst.api_key.is_none());
        assert!(!config.scheduler.enabled);
        let database = config.connection_settings();
        assert_eq!(database.acquire_timeout, Duration::from_secs(10));
        assert_eq!(database.statement_timeout, Duration::from_secs(15));

        let generator = config.generator_config();
        assert_eq!(generator.horizon, chrono::Duration::hours(48));
        assert_eq!(generator.max_per_run, 20);
        assert_eq!(generator.call_delay, Duration::from_millis(2000));
        assert_eq!(generator.call_timeout, Duration::from_secs(45));

        assert_eq!(config.ledger_config().min_competition_sample, 3);
        assert_eq!(config.analyst_config().model, "gpt-4o-mini");
    }
}
