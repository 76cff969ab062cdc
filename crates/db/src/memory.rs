// In-process store, used by tests and local runs without Postgres

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use matchcast_models::{
    AccuracyKey, AccuracyKind, AccuracyRecord, Fixture, Prediction, Resolution, Result,
};
use uuid::Uuid;

use crate::repository::{AccuracyStore, FixtureStore, PredictionStore, UpsertOutcome};

/// Mirrors the Postgres constraints: one prediction per fixture id, and
/// per-key atomic counter updates through the map's entry API.
#[derive(Default)]
pub struct MemoryStore {
    fixtures: DashMap<i64, Fixture>,
    predictions: DashMap<i64, Prediction>,
    accuracy: DashMap<AccuracyKey, AccuracyRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a fixture, standing in for the ingestion job.
    pub fn put_fixture(&self, fixture: Fixture) {
        self.fixtures.insert(fixture.external_id, fixture);
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.len()
    }

    fn bump(&self, key: &AccuracyKey, correct: bool, at: DateTime<Utc>) -> AccuracyRecord {
        let mut record = self
            .accuracy
            .entry(key.clone())
            .or_insert_with(|| AccuracyRecord::empty(key.clone(), at));
        record.increment(correct, at);
        record.clone()
    }

    fn sorted_records(&self, kind: AccuracyKind) -> Vec<AccuracyRecord> {
        let mut records: Vec<AccuracyRecord> = self
            .accuracy
            .iter()
            .filter(|entry| entry.key().kind == kind)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.key
                .window_key
                .cmp(&a.key.window_key)
                .then_with(|| a.key.competition.cmp(&b.key.competition))
        });
        records
    }
}

#[async_trait]
impl FixtureStore for MemoryStore {
    async fn eligible_fixtures(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Fixture>> {
        let mut eligible: Vec<Fixture> = self
            .fixtures
            .iter()
            .filter(|f| f.status.is_scheduled())
            .filter(|f| f.kickoff_time >= from && f.kickoff_time <= to)
            .filter(|f| !self.predictions.contains_key(&f.external_id))
            .map(|f| f.value().clone())
            .collect();

        eligible.sort_by_key(|f| (f.kickoff_time, f.external_id));
        eligible.truncate(limit as usize);
        Ok(eligible)
    }

    async fn fixture(&self, external_id: i64) -> Result<Option<Fixture>> {
        Ok(self.fixtures.get(&external_id).map(|f| f.value().clone()))
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<UpsertOutcome> {
        match self.predictions.entry(prediction.fixture_id) {
            Entry::Vacant(slot) => {
                slot.insert(prediction.clone());
                Ok(UpsertOutcome::Inserted)
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.is_resolved {
                    return Ok(UpsertOutcome::AlreadyResolved);
                }
                let (id, created_at) = (existing.id, existing.created_at);
                *existing = Prediction {
                    id,
                    created_at,
                    updated_at: prediction.created_at,
                    ..prediction.clone()
                };
                Ok(UpsertOutcome::Replaced)
            }
        }
    }

    async fn prediction_for_fixture(&self, fixture_id: i64) -> Result<Option<Prediction>> {
        Ok(self.predictions.get(&fixture_id).map(|p| p.value().clone()))
    }

    async fn unresolved_predictions(&self) -> Result<Vec<Prediction>> {
        let mut pending: Vec<Prediction> = self
            .predictions
            .iter()
            .filter(|p| !p.is_resolved)
            .map(|p| p.value().clone())
            .collect();
        pending.sort_by_key(|p| (p.kickoff_time, p.fixture_id));
        Ok(pending)
    }

    async fn record_resolution(
        &self,
        prediction_id: Uuid,
        resolution: &Resolution,
        buckets: &[AccuracyKey],
    ) -> Result<bool> {
        let fixture_id = self
            .predictions
            .iter()
            .find(|p| p.id == prediction_id)
            .map(|p| *p.key());
        let Some(fixture_id) = fixture_id else {
            return Ok(false);
        };

        // The prediction's shard stays locked until the counters are bumped
        let Some(mut prediction) = self.predictions.get_mut(&fixture_id) else {
            return Ok(false);
        };
        if !prediction.apply_resolution(resolution) {
            return Ok(false);
        }
        for key in buckets {
            self.bump(key, resolution.prediction_correct, resolution.resolved_at);
        }
        drop(prediction);
        Ok(true)
    }
}

#[async_trait]
impl AccuracyStore for MemoryStore {
    async fn increment(&self, key: &AccuracyKey, correct: bool) -> Result<AccuracyRecord> {
        Ok(self.bump(key, correct, Utc::now()))
    }

    async fn bucket(&self, key: &AccuracyKey) -> Result<Option<AccuracyRecord>> {
        Ok(self.accuracy.get(key).map(|r| r.value().clone()))
    }

    async fn recent_overall(&self, limit: u32) -> Result<Vec<AccuracyRecord>> {
        let mut records = self.sorted_records(AccuracyKind::Overall);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn competition_buckets(&self) -> Result<Vec<AccuracyRecord>> {
        Ok(self.sorted_records(AccuracyKind::Competition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use matchcast_models::{FixtureStatus, MatchEstimate, OutcomeProbabilities};
    use std::sync::Arc;

    fn fixture(id: i64, kickoff_in_hours: i64) -> Fixture {
        Fixture::new(
            id,
            format!("Home {id}"),
            format!("Away {id}"),
            Some("Serie A".to_string()),
            Utc::now() + Duration::hours(kickoff_in_hours),
        )
    }

    fn prediction_for(fixture: &Fixture) -> Prediction {
        let estimate = MatchEstimate {
            home_xg: 1.5,
            away_xg: 1.1,
            advisory_winner: None,
            confidence: 60,
            analysis: None,
            key_facts: vec![],
            seo_title: None,
            meta_description: None,
        };
        let probabilities = OutcomeProbabilities { home_win: 46, draw: 26, away_win: 28 };
        Prediction::from_estimate(fixture, &estimate, probabilities, 48, Utc::now())
    }

    #[tokio::test]
    async fn test_eligibility_filters() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.put_fixture(fixture(1, 2));
        store.put_fixture(fixture(2, 72)); // outside the window
        store.put_fixture(fixture(3, -1)); // already kicked off
        store.put_fixture(fixture(4, 3).with_status(FixtureStatus::Postponed));
        store.put_fixture(fixture(5, 1));
        let predicted = fixture(6, 4);
        store.upsert_prediction(&prediction_for(&predicted)).await.unwrap();
        store.put_fixture(predicted);

        let eligible = store
            .eligible_fixtures(now, now + Duration::hours(48), 20)
            .await
            .unwrap();
        let ids: Vec<i64> = eligible.iter().map(|f| f.external_id).collect();
        assert_eq!(ids, vec![5, 1]);

        let capped = store.eligible_fixtures(now, now + Duration::hours(48), 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_fixture() {
        let store = MemoryStore::new();
        let f = fixture(555, 2);
        let first = prediction_for(&f);
        let second = prediction_for(&f);

        assert_eq!(store.upsert_prediction(&first).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_prediction(&second).await.unwrap(), UpsertOutcome::Replaced);
        assert_eq!(store.prediction_count(), 1);

        let stored = store.prediction_for_fixture(555).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_resolution_is_applied_once() {
        let store = MemoryStore::new();
        let f = fixture(555, 2);
        let prediction = prediction_for(&f);
        store.upsert_prediction(&prediction).await.unwrap();

        let keys = [
            AccuracyKey::overall("2026-W08"),
            AccuracyKey::competition("2026-W08", "Serie A"),
        ];
        let resolution = prediction.evaluate(2, 1, Utc::now());
        assert!(store.record_resolution(prediction.id, &resolution, &keys).await.unwrap());
        assert!(!store.record_resolution(prediction.id, &resolution, &keys).await.unwrap());

        for key in &keys {
            let bucket = store.bucket(key).await.unwrap().unwrap();
            assert_eq!(bucket.total, 1);
            assert_eq!(bucket.correct, 1);
        }
        assert!(store.unresolved_predictions().await.unwrap().is_empty());

        // Resolved rows are not replaced by a late generation
        let late = prediction_for(&f);
        assert_eq!(store.upsert_prediction(&late).await.unwrap(), UpsertOutcome::AlreadyResolved);
        assert!(store.prediction_for_fixture(555).await.unwrap().unwrap().is_resolved);
    }

    #[tokio::test]
    async fn test_unknown_prediction_is_not_resolved() {
        let store = MemoryStore::new();
        let f = fixture(1, 2);
        let resolution = prediction_for(&f).evaluate(0, 0, Utc::now());
        let resolved = store
            .record_resolution(Uuid::new_v4(), &resolution, &[AccuracyKey::overall("2026-W08")])
            .await
            .unwrap();
        assert!(!resolved);
        assert!(store.recent_overall(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let key = AccuracyKey::competition("2026-W08", "Eredivisie");

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                let key = key.clone();
                tokio::spawn(async move { store.increment(&key, i % 2 == 0).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let bucket = store.bucket(&key).await.unwrap().unwrap();
        assert_eq!(bucket.total, 50);
        assert_eq!(bucket.correct, 25);
    }

    #[tokio::test]
    async fn test_recent_overall_orders_by_window_desc() {
        let store = MemoryStore::new();
        for week in ["2026-W06", "2026-W08", "2025-W52", "2026-W07"] {
            store.increment(&AccuracyKey::overall(week), true).await.unwrap();
        }
        store.increment(&AccuracyKey::competition("2026-W08", "Ligue 1"), true).await.unwrap();

        let recent = store.recent_overall(3).await.unwrap();
        let weeks: Vec<&str> = recent.iter().map(|r| r.key.window_key.as_str()).collect();
        assert_eq!(weeks, vec!["2026-W08", "2026-W07", "2026-W06"]);
        assert_eq!(store.competition_buckets().await.unwrap().len(), 1);
    }
}
