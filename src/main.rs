mod config;

use anyhow::{Context, Result};
use crate::config::AppConfig;
use matchcast_api::{create_app, AppState};
use matchcast_db::{
    AccuracyStore, ConnectionManager, FixtureStore, MemoryStore, PredictionStore, Repository,
};
use matchcast_services::{
    AccuracyLedger, HourlyCycle, OpenAiAnalyst, OutcomeResolver, PipelineMetrics,
    PredictionGenerator,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    fixtures: Arc<dyn FixtureStore>,
    predictions: Arc<dyn PredictionStore>,
    accuracy: Arc<dyn AccuracyStore>,
    database: Option<Arc<ConnectionManager>>,
}

async fn open_stores(config: &AppConfig) -> Result<Stores> {
    if config.database.in_memory {
        warn!("using the in-memory store; nothing survives a restart");
        let store = Arc::new(MemoryStore::new());
        return Ok(Stores {
            fixtures: store.clone(),
            predictions: store.clone(),
            accuracy: store,
            database: None,
        });
    }

    let db = Arc::new(ConnectionManager::new(config.connection_settings())?);
    db.run_migrations().await.context("failed to run database migrations")?;
    let repository = Arc::new(Repository::new(db.clone()));
    Ok(Stores {
        fixtures: repository.clone(),
        predictions: repository.clone(),
        accuracy: repository,
        database: Some(db),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting matchcast");

    let config = AppConfig::new().context("failed to load configuration")?;
    info!(
        addr = %config.server_addr(),
        in_memory = config.database.in_memory,
        "configuration loaded"
    );
    if config.analyst.api_key.is_none() {
        warn!("OPENAI_API_KEY not set; generation runs will fail until it is configured");
    }

    let stores = open_stores(&config).await?;
    let metrics = Arc::new(PipelineMetrics::new()?);
    let analyst = Arc::new(OpenAiAnalyst::new(config.analyst_config())?);

    let generator = Arc::new(PredictionGenerator::new(
        stores.fixtures.clone(),
        stores.predictions.clone(),
        analyst,
        metrics.clone(),
        config.generator_config(),
    ));
    let resolver = Arc::new(OutcomeResolver::new(
        stores.fixtures.clone(),
        stores.predictions.clone(),
        stores.accuracy.clone(),
        metrics.clone(),
    ));
    let ledger = Arc::new(AccuracyLedger::new(stores.accuracy.clone(), config.ledger_config()));
    let cycle = Arc::new(HourlyCycle::new(generator.clone(), resolver.clone()));

    let scheduler = config.scheduler.enabled.then(|| {
        let period = Duration::from_secs(config.scheduler.interval_secs.max(1));
        info!(interval_secs = period.as_secs(), "in-process scheduler enabled");
        cycle.clone().spawn(period)
    });

    let state = AppState {
        generator,
        resolver,
        ledger,
        cycle,
        predictions: stores.predictions,
        metrics,
        database: stores.database,
        cron_secret: config.scheduler.cron_secret.clone(),
        started_at: Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr()))?;
    info!(addr = %config.server_addr(), "listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("shutting down");
    if let Some(handle) = scheduler {
        handle.abort();
    }

    Ok(())
}
