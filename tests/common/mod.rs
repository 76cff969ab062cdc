// Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matchcast_api::AppState;
use matchcast_db::MemoryStore;
use matchcast_models::{Fixture, MatchEstimate, Result};
use matchcast_services::{
    AccuracyLedger, GeneratorConfig, HourlyCycle, LedgerConfig, MatchAnalyst, MatchContext,
    OutcomeResolver, PipelineMetrics, PredictionGenerator,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Answers every fixture with the same expected goals, going through the
/// same JSON parsing path as the real client.
pub struct ScriptedAnalyst {
    configured: bool,
    home_xg: f64,
    away_xg: f64,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedAnalyst {
    pub fn new(home_xg: f64, away_xg: f64) -> Self {
        Self {
            configured: true,
            home_xg,
            away_xg,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(1.0, 1.0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchAnalyst for ScriptedAnalyst {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn estimate(&self, context: &MatchContext) -> Result<MatchEstimate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let raw = json!({
            "homeXG": self.home_xg,
            "awayXG": self.away_xg,
            // The label is advisory and deliberately contrarian
            "predictedWinner": "away",
            "confidenceScore": 68,
            "keyFacts": [format!("{} at home", context.home_team)],
            "analysis": format!(
                "Our model predicts {} against {}.",
                context.home_team, context.away_team
            ),
            "metaDescription": format!("{} vs {} preview", context.home_team, context.away_team)
        })
        .to_string();
        Ok(MatchEstimate::parse_str(&raw)?)
    }
}

pub fn scheduled_fixture(id: i64, kickoff: DateTime<Utc>) -> Fixture {
    Fixture::new(
        id,
        format!("Home FC {id}"),
        format!("Away United {id}"),
        Some("Premier League".to_string()),
        kickoff,
    )
}

/// Every service wired over one in-memory store.
pub struct Pipeline {
    pub store: Arc<MemoryStore>,
    pub analyst: Arc<ScriptedAnalyst>,
    pub metrics: Arc<PipelineMetrics>,
    pub generator: Arc<PredictionGenerator>,
    pub resolver: Arc<OutcomeResolver>,
    pub ledger: Arc<AccuracyLedger>,
    pub cycle: Arc<HourlyCycle>,
}

impl Pipeline {
    pub fn new(analyst: ScriptedAnalyst) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), analyst)
    }

    pub fn with_store(store: Arc<MemoryStore>, analyst: ScriptedAnalyst) -> Self {
        let analyst = Arc::new(analyst);
        let metrics = Arc::new(PipelineMetrics::new().unwrap());
        let generator = Arc::new(PredictionGenerator::new(
            store.clone(),
            store.clone(),
            analyst.clone(),
            metrics.clone(),
            GeneratorConfig {
                call_delay: Duration::ZERO,
                ..GeneratorConfig::default()
            },
        ));
        let resolver = Arc::new(OutcomeResolver::new(
            store.clone(),
            store.clone(),
            store.clone(),
            metrics.clone(),
        ));
        let ledger = Arc::new(AccuracyLedger::new(store.clone(), LedgerConfig::default()));
        let cycle = Arc::new(HourlyCycle::new(generator.clone(), resolver.clone()));

        Self {
            store,
            analyst,
            metrics,
            generator,
            resolver,
            ledger,
            cycle,
        }
    }

    pub fn app_state(&self, cron_secret: Option<&str>) -> AppState {
        AppState {
            generator: self.generator.clone(),
            resolver: self.resolver.clone(),
            ledger: self.ledger.clone(),
            cycle: self.cycle.clone(),
            predictions: self.store.clone(),
            metrics: self.metrics.clone(),
            database: None,
            cron_secret: cron_secret.map(String::from),
            started_at: Instant::now(),
        }
    }
}
