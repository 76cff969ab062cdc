use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::generator::{GenerationRequest, GenerationSummary, PredictionGenerator};
use crate::resolver::{OutcomeResolver, ResolutionSummary};

/// Result of one step in a cycle. A failed step does not stop the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum StepResult<T> {
    Ok(T),
    Error(String),
}

impl<T> StepResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepResult::Ok(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub generation: StepResult<GenerationSummary>,
    pub resolution: StepResult<ResolutionSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Generate then resolve, the unit of work behind the hourly trigger.
pub struct HourlyCycle {
    generator: Arc<PredictionGenerator>,
    resolver: Arc<OutcomeResolver>,
}

impl HourlyCycle {
    pub fn new(generator: Arc<PredictionGenerator>, resolver: Arc<OutcomeResolver>) -> Self {
        Self { generator, resolver }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> CycleReport {
        info!("hourly cycle started");

        let generation = match self.generator.run(GenerationRequest::default(), now).await {
            Ok(summary) => StepResult::Ok(summary),
            Err(e) => {
                error!(error = %e, "generation step failed");
                StepResult::Error(e.to_string())
            }
        };

        let resolution = match self.resolver.run(now).await {
            Ok(summary) => StepResult::Ok(summary),
            Err(e) => {
                error!(error = %e, "resolution step failed");
                StepResult::Error(e.to_string())
            }
        };

        info!(
            generation_ok = generation.is_ok(),
            resolution_ok = resolution.is_ok(),
            "hourly cycle finished"
        );
        CycleReport {
            generation,
            resolution,
            timestamp: now,
        }
    }

    /// Runs the cycle on a fixed period until the task is aborted. The first
    /// cycle starts immediately.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }
}
