use chrono::{DateTime, Utc};
use matchcast_db::{AccuracyStore, FixtureStore, PredictionStore};
use matchcast_models::{week_key, AccuracyKey, MatchcastError, Prediction, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::metrics::PipelineMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    pub resolved: u32,
    pub correct: u32,
    pub pending: u32,
    pub failed: u32,
    /// Overall accuracy for the current ISO week, if anything resolved in it.
    pub current_week_accuracy: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    NotFinished,
    MissingScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Resolved { correct: bool },
    Pending(PendingReason),
    /// Another run got there first; counters were left alone.
    AlreadyResolved,
}

pub struct OutcomeResolver {
    fixtures: Arc<dyn FixtureStore>,
    predictions: Arc<dyn PredictionStore>,
    accuracy: Arc<dyn AccuracyStore>,
    metrics: Arc<PipelineMetrics>,
}

impl OutcomeResolver {
    pub fn new(
        fixtures: Arc<dyn FixtureStore>,
        predictions: Arc<dyn PredictionStore>,
        accuracy: Arc<dyn AccuracyStore>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            fixtures,
            predictions,
            accuracy,
            metrics,
        }
    }

    /// Scans every unresolved prediction once. Fixtures that have not
    /// finished stay pending and are picked up again on the next run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ResolutionSummary> {
        let pending = self.predictions.unresolved_predictions().await?;
        info!(pending = pending.len(), "resolving predictions");

        let mut summary = ResolutionSummary {
            resolved: 0,
            correct: 0,
            pending: 0,
            failed: 0,
            current_week_accuracy: None,
            timestamp: now,
        };

        for prediction in &pending {
            match self.resolve_one(prediction, now).await {
                Ok(ItemOutcome::Resolved { correct }) => {
                    summary.resolved += 1;
                    if correct {
                        summary.correct += 1;
                    }
                    self.metrics.record_resolved(correct);
                }
                Ok(ItemOutcome::Pending(reason)) => {
                    summary.pending += 1;
                    debug!(fixture_id = prediction.fixture_id, ?reason, "prediction still pending");
                }
                Ok(ItemOutcome::AlreadyResolved) => {
                    debug!(
                        fixture_id = prediction.fixture_id,
                        "prediction resolved by another run"
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    summary.failed += 1;
                    self.metrics.resolution_failures.inc();
                    warn!(
                        fixture_id = prediction.fixture_id,
                        error = %e,
                        "failed to resolve prediction"
                    );
                }
            }
        }

        summary.current_week_accuracy = self
            .accuracy
            .bucket(&AccuracyKey::overall(week_key(now)))
            .await?
            .filter(|bucket| bucket.total > 0)
            .map(|bucket| bucket.accuracy());

        info!(
            resolved = summary.resolved,
            correct = summary.correct,
            pending = summary.pending,
            failed = summary.failed,
            "resolution finished"
        );
        Ok(summary)
    }

    pub async fn resolve_one(
        &self,
        prediction: &Prediction,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome> {
        let fixture = self
            .fixtures
            .fixture(prediction.fixture_id)
            .await?
            .ok_or(MatchcastError::FixtureNotFound {
                fixture_id: prediction.fixture_id,
            })?;

        if !fixture.status.is_finished() {
            return Ok(ItemOutcome::Pending(PendingReason::NotFinished));
        }
        let Some((goals_home, goals_away)) = fixture.final_score() else {
            warn!(
                fixture_id = fixture.external_id,
                status = %fixture.status,
                "finished fixture has no score"
            );
            return Ok(ItemOutcome::Pending(PendingReason::MissingScore));
        };

        let resolution = prediction.evaluate(goals_home, goals_away, now);
        let week = week_key(fixture.kickoff_time);
        let buckets = [
            AccuracyKey::overall(week.clone()),
            AccuracyKey::competition(week, fixture.competition_key()),
        ];

        if !self
            .predictions
            .record_resolution(prediction.id, &resolution, &buckets)
            .await?
        {
            return Ok(ItemOutcome::AlreadyResolved);
        }

        debug!(
            fixture_id = fixture.external_id,
            score = %format!("{goals_home}-{goals_away}"),
            predicted = %prediction.predicted_winner,
            actual = %resolution.actual_result,
            correct = resolution.prediction_correct,
            "prediction resolved"
        );
        Ok(ItemOutcome::Resolved {
            correct: resolution.prediction_correct,
        })
    }
}
