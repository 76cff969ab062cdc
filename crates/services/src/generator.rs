use chrono::{DateTime, Duration as ChronoDuration, Utc};
use matchcast_db::{FixtureStore, PredictionStore, UpsertOutcome};
use matchcast_models::{Fixture, MatchcastError, Outcome, Prediction, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::analyst::{MatchAnalyst, MatchContext};
use crate::metrics::{LatencyTracker, PipelineMetrics};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// How far ahead of now a kickoff may be to qualify.
    pub horizon: ChronoDuration,
    /// Cap on model calls per run.
    pub max_per_run: u32,
    /// Pause between consecutive model calls.
    pub call_delay: Duration,
    /// Upper bound on a single model call.
    pub call_timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            horizon: ChronoDuration::hours(48),
            max_per_run: 20,
            call_delay: Duration::from_secs(2),
            call_timeout: Duration::from_secs(45),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Generate for this fixture only, ignoring the kickoff window.
    pub fixture_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub fixture_id: i64,
    #[serde(rename = "match")]
    pub fixture: String,
    pub winner: Outcome,
    pub confidence: u8,
    pub home_win_probability: u8,
    pub draw_probability: u8,
    pub away_win_probability: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub generated: u32,
    pub skipped: u32,
    pub results: Vec<MatchSummary>,
    pub timestamp: DateTime<Utc>,
}

pub struct PredictionGenerator {
    fixtures: Arc<dyn FixtureStore>,
    predictions: Arc<dyn PredictionStore>,
    analyst: Arc<dyn MatchAnalyst>,
    metrics: Arc<PipelineMetrics>,
    config: GeneratorConfig,
}

impl PredictionGenerator {
    pub fn new(
        fixtures: Arc<dyn FixtureStore>,
        predictions: Arc<dyn PredictionStore>,
        analyst: Arc<dyn MatchAnalyst>,
        metrics: Arc<PipelineMetrics>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            fixtures,
            predictions,
            analyst,
            metrics,
            config,
        }
    }

    /// Predicts every eligible fixture, one at a time.
    ///
    /// Per-fixture failures are counted as skipped and the fixture stays
    /// eligible for the next run. Only configuration and store failures end
    /// the run early with an error.
    pub async fn run(
        &self,
        request: GenerationRequest,
        now: DateTime<Utc>,
    ) -> Result<GenerationSummary> {
        if !self.analyst.is_configured() {
            return Err(MatchcastError::Config("OPENAI_API_KEY not set".to_string()));
        }

        let fixtures = self.select_fixtures(request, now).await?;
        info!(
            candidates = fixtures.len(),
            single = request.fixture_id.is_some(),
            "generating predictions"
        );

        let mut summary = GenerationSummary {
            generated: 0,
            skipped: 0,
            results: Vec::with_capacity(fixtures.len()),
            timestamp: now,
        };

        for (i, fixture) in fixtures.iter().enumerate() {
            if i > 0 && !self.config.call_delay.is_zero() {
                sleep(self.config.call_delay).await;
            }

            match self.generate_one(fixture, now).await {
                Ok((prediction, UpsertOutcome::Inserted | UpsertOutcome::Replaced)) => {
                    summary.generated += 1;
                    self.metrics.predictions_generated.inc();
                    summary.results.push(MatchSummary {
                        fixture_id: prediction.fixture_id,
                        fixture: prediction.title(),
                        winner: prediction.predicted_winner,
                        confidence: prediction.confidence_score,
                        home_win_probability: prediction.home_win_probability,
                        draw_probability: prediction.draw_probability,
                        away_win_probability: prediction.away_win_probability,
                    });
                }
                Ok((_, UpsertOutcome::AlreadyResolved)) => {
                    summary.skipped += 1;
                    self.metrics.predictions_skipped.inc();
                    info!(
                        fixture_id = fixture.external_id,
                        "prediction already resolved, left untouched"
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    summary.skipped += 1;
                    self.metrics.predictions_skipped.inc();
                    warn!(
                        fixture_id = fixture.external_id,
                        fixture = %fixture.title(),
                        error = %e,
                        "skipping fixture"
                    );
                }
            }
        }

        info!(generated = summary.generated, skipped = summary.skipped, "generation finished");
        Ok(summary)
    }

    async fn select_fixtures(
        &self,
        request: GenerationRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Fixture>> {
        let Some(fixture_id) = request.fixture_id else {
            return self
                .fixtures
                .eligible_fixtures(now, now + self.config.horizon, self.config.max_per_run)
                .await;
        };

        let Some(fixture) = self.fixtures.fixture(fixture_id).await? else {
            warn!(fixture_id, "requested fixture not found");
            return Ok(Vec::new());
        };
        if !fixture.status.is_scheduled() {
            info!(fixture_id, status = %fixture.status, "requested fixture is not scheduled");
            return Ok(Vec::new());
        }
        if self.predictions.prediction_for_fixture(fixture_id).await?.is_some() {
            info!(fixture_id, "requested fixture already has a prediction");
            return Ok(Vec::new());
        }
        Ok(vec![fixture])
    }

    async fn generate_one(
        &self,
        fixture: &Fixture,
        now: DateTime<Utc>,
    ) -> Result<(Prediction, UpsertOutcome)> {
        let context = MatchContext::from_fixture(fixture);

        let tracker = LatencyTracker::start();
        let estimate = timeout(self.config.call_timeout, self.analyst.estimate(&context))
            .await
            .map_err(|_| MatchcastError::Timeout {
                operation: format!("estimate for fixture {}", fixture.external_id),
                seconds: self.config.call_timeout.as_secs(),
            })??;
        tracker.finish(&self.metrics.analyst_latency);

        let forecast = matchcast_ml::forecast(estimate.home_xg, estimate.away_xg);
        let prediction = Prediction::from_estimate(
            fixture,
            &estimate,
            forecast.probabilities,
            forecast.over25,
            now,
        );

        if let Some(advisory) = estimate.advisory_winner {
            if advisory != prediction.predicted_winner {
                debug!(
                    fixture_id = fixture.external_id,
                    model_pick = %advisory,
                    winner = %prediction.predicted_winner,
                    "model pick overridden by probabilities"
                );
            }
        }

        let outcome = self.predictions.upsert_prediction(&prediction).await?;
        Ok((prediction, outcome))
    }
}
