use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Prometheus instruments for the generation and resolution runs, kept on a
/// per-process registry so tests can build as many as they like.
pub struct PipelineMetrics {
    registry: Registry,
    pub predictions_generated: IntCounter,
    pub predictions_skipped: IntCounter,
    pub predictions_resolved: IntCounterVec,
    pub resolution_failures: IntCounter,
    pub analyst_latency: Histogram,
}

#[derive(Debug)]
pub struct LatencyTracker {
    start_time: Instant,
}

impl LatencyTracker {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn finish(self, histogram: &Histogram) {
        histogram.observe(self.start_time.elapsed().as_secs_f64());
    }
}

impl PipelineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("matchcast".to_string()), None)?;

        let predictions_generated = IntCounter::new(
            "predictions_generated_total",
            "Predictions written by the generator",
        )?;
        let predictions_skipped = IntCounter::new(
            "predictions_skipped_total",
            "Eligible fixtures the generator could not predict",
        )?;
        let predictions_resolved = IntCounterVec::new(
            Opts::new("predictions_resolved_total", "Predictions resolved against a final score"),
            &["correct"],
        )?;
        let resolution_failures = IntCounter::new(
            "resolution_failures_total",
            "Predictions the resolver failed to process",
        )?;
        let analyst_latency = Histogram::with_opts(
            HistogramOpts::new("analyst_call_seconds", "Latency of match estimate requests")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;

        registry.register(Box::new(predictions_generated.clone()))?;
        registry.register(Box::new(predictions_skipped.clone()))?;
        registry.register(Box::new(predictions_resolved.clone()))?;
        registry.register(Box::new(resolution_failures.clone()))?;
        registry.register(Box::new(analyst_latency.clone()))?;

        Ok(Self {
            registry,
            predictions_generated,
            predictions_skipped,
            predictions_resolved,
            resolution_failures,
            analyst_latency,
        })
    }

    pub fn record_resolved(&self, correct: bool) {
        self.predictions_resolved
            .with_label_values(&[if correct { "true" } else { "false" }])
            .inc();
    }

    /// Text exposition format for a `/metrics` scrape.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.predictions_generated.inc();
        metrics.predictions_generated.inc();
        metrics.record_resolved(true);
        metrics.record_resolved(false);
        metrics.record_resolved(true);
        LatencyTracker::start().finish(&metrics.analyst_latency);

        let text = metrics.render();
        assert!(text.contains("matchcast_predictions_generated_total 2"));
        assert!(text.contains("matchcast_predictions_resolved_total{correct=\"true\"} 2"));
        assert!(text.contains("matchcast_analyst_call_seconds_count 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = PipelineMetrics::new().unwrap();
        let b = PipelineMetrics::new().unwrap();
        a.resolution_failures.inc();
        assert_eq!(a.resolution_failures.get(), 1);
        assert_eq!(b.resolution_failures.get(), 0);
    }
}
