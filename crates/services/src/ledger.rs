use matchcast_db::AccuracyStore;
use matchcast_models::{
    AccuracyRecord, AccuracyReport, AccuracyStat, CompetitionAccuracy, Result, WeeklyAccuracy,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Competitions with fewer resolved predictions are left out of the report.
    pub min_competition_sample: i64,
    pub default_weeks: u32,
    pub max_weeks: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_competition_sample: 3,
            default_weeks: 8,
            max_weeks: 52,
        }
    }
}

/// Read side of the accuracy buckets.
pub struct AccuracyLedger {
    store: Arc<dyn AccuracyStore>,
    config: LedgerConfig,
}

impl AccuracyLedger {
    pub fn new(store: Arc<dyn AccuracyStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub async fn report(&self, weeks: Option<u32>) -> Result<AccuracyReport> {
        let weeks = weeks
            .unwrap_or(self.config.default_weeks)
            .clamp(1, self.config.max_weeks.max(1));

        let recent = self.store.recent_overall(weeks).await?;
        let competitions = self.store.competition_buckets().await?;
        debug!(
            weeks,
            overall = recent.len(),
            competition = competitions.len(),
            "building accuracy report"
        );

        Ok(summarize(&recent, &competitions, self.config.min_competition_sample))
    }
}

/// Folds raw buckets into a report. `recent_overall` becomes the weekly trend;
/// the all-time figure is summed from every competition bucket, including
/// those below `min_sample`.
pub fn summarize(
    recent_overall: &[AccuracyRecord],
    competition_buckets: &[AccuracyRecord],
    min_sample: i64,
) -> AccuracyReport {
    let mut weekly_trend: Vec<WeeklyAccuracy> = recent_overall
        .iter()
        .map(|record| WeeklyAccuracy {
            week: record.key.window_key.clone(),
            stat: AccuracyStat::new(record.total, record.correct),
        })
        .collect();
    weekly_trend.sort_by(|a, b| b.week.cmp(&a.week));

    let mut totals: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for record in competition_buckets {
        let name = record.key.competition.as_deref().unwrap_or_default();
        let entry = totals.entry(name).or_default();
        entry.0 += record.total;
        entry.1 += record.correct;
    }

    let (total, correct) = totals
        .values()
        .fold((0, 0), |(t, c), (total, correct)| (t + total, c + correct));

    let mut by_competition: Vec<CompetitionAccuracy> = totals
        .into_iter()
        .filter(|(_, (total, _))| *total >= min_sample)
        .map(|(name, (total, correct))| CompetitionAccuracy {
            competition: name.to_string(),
            stat: AccuracyStat::new(total, correct),
        })
        .collect();
    by_competition.sort_by(|a, b| {
        b.stat
            .accuracy
            .cmp(&a.stat.accuracy)
            .then_with(|| a.competition.cmp(&b.competition))
    });

    AccuracyReport {
        overall: AccuracyStat::new(total, correct),
        weekly_trend,
        by_competition,
    }
}
