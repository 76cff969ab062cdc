use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matchcast_models::{AccuracyKey, AccuracyRecord, Fixture, Prediction, Resolution, Result};
use sqlx::{PgExecutor, PgPool};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::connection::ConnectionManager;
use crate::schema::{competition_column, AccuracyRecordRow, FixtureRecord, PredictionRecord};

/// What a generation upsert did to the `fixture_id` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// The existing row is resolved and was left untouched.
    AlreadyResolved,
}

/// Read access to fixtures written by the ingestion job.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    /// Scheduled fixtures kicking off within `[from, to]` that have no
    /// prediction yet, earliest kickoff first.
    async fn eligible_fixtures(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Fixture>>;

    async fn fixture(&self, external_id: i64) -> Result<Option<Fixture>>;
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Insert-or-replace keyed by `fixture_id`. Resolved rows are never replaced.
    async fn upsert_prediction(&self, prediction: &Prediction) -> Result<UpsertOutcome>;

    async fn prediction_for_fixture(&self, fixture_id: i64) -> Result<Option<Prediction>>;

    async fn unresolved_predictions(&self) -> Result<Vec<Prediction>>;

    /// Marks the prediction resolved and increments every bucket in `buckets`
    /// as one atomic unit. Returns false, changing nothing, if the prediction
    /// was already resolved.
    async fn record_resolution(
        &self,
        prediction_id: Uuid,
        resolution: &Resolution,
        buckets: &[AccuracyKey],
    ) -> Result<bool>;
}

#[async_trait]
pub trait AccuracyStore: Send + Sync {
    /// Atomic `total += 1, correct += correct as i64` on a single bucket,
    /// creating it on first write.
    ///
    /// Resolution goes through [`PredictionStore::record_resolution`], which
    /// applies the same increment inside its transaction. This is the
    /// standalone form, used for seeding and backfills.
    async fn increment(&self, key: &AccuracyKey, correct: bool) -> Result<AccuracyRecord>;

    async fn bucket(&self, key: &AccuracyKey) -> Result<Option<AccuracyRecord>>;

    /// Most recent overall buckets, window key descending.
    async fn recent_overall(&self, limit: u32) -> Result<Vec<AccuracyRecord>>;

    async fn competition_buckets(&self) -> Result<Vec<AccuracyRecord>>;
}

/// Postgres-backed implementation of every store.
pub struct Repository {
    db: Arc<ConnectionManager>,
}

impl Repository {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    async fn pool(&self) -> Result<PgPool> {
        self.db.pool().await
    }
}

const FIXTURE_COLUMNS: &str = "external_id, slug, home_team, away_team, competition_name, \
     competition_country, kickoff_time, status, goals_home, goals_away";

const PREDICTION_COLUMNS: &str = "id, fixture_id, slug, home_team, away_team, competition_name, \
     competition_country, kickoff_time, home_win_probability, draw_probability, \
     away_win_probability, over25_probability, home_expected_goals, away_expected_goals, \
     predicted_winner, confidence_score, analysis, key_facts, seo_title, meta_description, \
     is_resolved, actual_result, prediction_correct, actual_goals_home, actual_goals_away, \
     resolved_at, created_at, updated_at";

const ACCURACY_COLUMNS: &str =
    "window_key, kind, competition, total, correct, created_at, updated_at";

async fn increment_bucket<'e, E: PgExecutor<'e>>(
    executor: E,
    key: &AccuracyKey,
    correct: bool,
    at: DateTime<Utc>,
) -> Result<AccuracyRecord> {
    let row: AccuracyRecordRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO accuracy_records
            (window_key, kind, competition, total, correct, created_at, updated_at)
        VALUES ($1, $2, $3, 1, $4, $5, $5)
        ON CONFLICT (window_key, kind, competition) DO UPDATE
        SET total = accuracy_records.total + 1,
            correct = accuracy_records.correct + EXCLUDED.correct,
            updated_at = EXCLUDED.updated_at
        RETURNING {ACCURACY_COLUMNS}
        "#
    ))
    .bind(&key.window_key)
    .bind(key.kind.as_str())
    .bind(competition_column(key))
    .bind(i64::from(correct))
    .bind(at)
    .fetch_one(executor)
    .await?;

    row.try_into()
}

#[async_trait]
impl FixtureStore for Repository {
    async fn eligible_fixtures(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Fixture>> {
        let pool = self.pool().await?;
        let rows: Vec<FixtureRecord> = sqlx::query_as(&format!(
            r#"
            SELECT {FIXTURE_COLUMNS}
            FROM fixtures f
            WHERE UPPER(TRIM(f.status)) IN ('NS', 'TBD')
              AND f.kickoff_time BETWEEN $1 AND $2
              AND NOT EXISTS (SELECT 1 FROM predictions p WHERE p.fixture_id = f.external_id)
            ORDER BY f.kickoff_time ASC
            LIMIT $3
            "#
        ))
        .bind(from)
        .bind(to)
        .bind(i64::from(limit))
        .fetch_all(&pool)
        .await?;

        Ok(rows.into_iter().map(Fixture::from).collect())
    }

    async fn fixture(&self, external_id: i64) -> Result<Option<Fixture>> {
        let pool = self.pool().await?;
        let row: Option<FixtureRecord> = sqlx::query_as(&format!(
            "SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&pool)
        .await?;

        Ok(row.map(Fixture::from))
    }
}

#[async_trait]
impl PredictionStore for Repository {
    async fn upsert_prediction(&self, p: &Prediction) -> Result<UpsertOutcome> {
        let pool = self.pool().await?;
        let inserted: Option<bool> = sqlx::query_scalar(&format!(
            r#"
            INSERT INTO predictions ({PREDICTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, FALSE, NULL, NULL, NULL, NULL, NULL, $21, $21)
            ON CONFLICT (fixture_id) DO UPDATE
            SET slug = EXCLUDED.slug,
                home_team = EXCLUDED.home_team,
                away_team = EXCLUDED.away_team,
                competition_name = EXCLUDED.competition_name,
                competition_country = EXCLUDED.competition_country,
                kickoff_time = EXCLUDED.kickoff_time,
                home_win_probability = EXCLUDED.home_win_probability,
                draw_probability = EXCLUDED.draw_probability,
                away_win_probability = EXCLUDED.away_win_probability,
                over25_probability = EXCLUDED.over25_probability,
                home_expected_goals = EXCLUDED.home_expected_goals,
                away_expected_goals = EXCLUDED.away_expected_goals,
                predicted_winner = EXCLUDED.predicted_winner,
                confidence_score = EXCLUDED.confidence_score,
                analysis = EXCLUDED.analysis,
                key_facts = EXCLUDED.key_facts,
                seo_title = EXCLUDED.seo_title,
                meta_description = EXCLUDED.meta_description,
                updated_at = EXCLUDED.updated_at
            WHERE predictions.is_resolved = FALSE
            RETURNING (xmax = 0) AS inserted
            "#
        ))
        .bind(p.id)
        .bind(p.fixture_id)
        .bind(&p.slug)
        .bind(&p.home_team)
        .bind(&p.away_team)
        .bind(&p.competition_name)
        .bind(&p.competition_country)
        .bind(p.kickoff_time)
        .bind(i16::from(p.home_win_probability))
        .bind(i16::from(p.draw_probability))
        .bind(i16::from(p.away_win_probability))
        .bind(i16::from(p.over25_probability))
        .bind(p.home_expected_goals)
        .bind(p.away_expected_goals)
        .bind(p.predicted_winner.as_str())
        .bind(i16::from(p.confidence_score))
        .bind(&p.analysis)
        .bind(&p.key_facts)
        .bind(&p.seo_title)
        .bind(&p.meta_description)
        .bind(p.created_at)
        .fetch_optional(&pool)
        .await?;

        let outcome = match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Replaced,
            None => UpsertOutcome::AlreadyResolved,
        };
        debug!(fixture_id = p.fixture_id, ?outcome, "prediction upserted");
        Ok(outcome)
    }

    async fn prediction_for_fixture(&self, fixture_id: i64) -> Result<Option<Prediction>> {
        let pool = self.pool().await?;
        let row: Option<PredictionRecord> = sqlx::query_as(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE fixture_id = $1"
        ))
        .bind(fixture_id)
        .fetch_optional(&pool)
        .await?;

        row.map(Prediction::try_from).transpose()
    }

    async fn unresolved_predictions(&self) -> Result<Vec<Prediction>> {
        let pool = self.pool().await?;
        let rows: Vec<PredictionRecord> = sqlx::query_as(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions \
             WHERE is_resolved = FALSE ORDER BY kickoff_time ASC"
        ))
        .fetch_all(&pool)
        .await?;

        rows.into_iter().map(Prediction::try_from).collect()
    }

    async fn record_resolution(
        &self,
        prediction_id: Uuid,
        resolution: &Resolution,
        buckets: &[AccuracyKey],
    ) -> Result<bool> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE predictions
            SET is_resolved = TRUE,
                actual_result = $2,
                prediction_correct = $3,
                actual_goals_home = $4,
                actual_goals_away = $5,
                resolved_at = $6,
                updated_at = $6
            WHERE id = $1 AND is_resolved = FALSE
            "#,
        )
        .bind(prediction_id)
        .bind(resolution.actual_result.as_str())
        .bind(resolution.prediction_correct)
        .bind(resolution.actual_goals_home)
        .bind(resolution.actual_goals_away)
        .bind(resolution.resolved_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for key in buckets {
            increment_bucket(&mut *tx, key, resolution.prediction_correct, resolution.resolved_at)
                .await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AccuracyStore for Repository {
    async fn increment(&self, key: &AccuracyKey, correct: bool) -> Result<AccuracyRecord> {
        let pool = self.pool().await?;
        increment_bucket(&pool, key, correct, Utc::now()).await
    }

    async fn bucket(&self, key: &AccuracyKey) -> Result<Option<AccuracyRecord>> {
        let pool = self.pool().await?;
        let row: Option<AccuracyRecordRow> = sqlx::query_as(&format!(
            "SELECT {ACCURACY_COLUMNS} FROM accuracy_records \
             WHERE window_key = $1 AND kind = $2 AND competition = $3"
        ))
        .bind(&key.window_key)
        .bind(key.kind.as_str())
        .bind(competition_column(key))
        .fetch_optional(&pool)
        .await?;

        row.map(AccuracyRecord::try_from).transpose()
    }

    async fn recent_overall(&self, limit: u32) -> Result<Vec<AccuracyRecord>> {
        let pool = self.pool().await?;
        let rows: Vec<AccuracyRecordRow> = sqlx::query_as(&format!(
            "SELECT {ACCURACY_COLUMNS} FROM accuracy_records \
             WHERE kind = 'overall' ORDER BY window_key DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&pool)
        .await?;

        rows.into_iter().map(AccuracyRecord::try_from).collect()
    }

    async fn competition_buckets(&self) -> Result<Vec<AccuracyRecord>> {
        let pool = self.pool().await?;
        let rows: Vec<AccuracyRecordRow> = sqlx::query_as(&format!(
            "SELECT {ACCURACY_COLUMNS} FROM accuracy_records \
             WHERE kind = 'competition' ORDER BY window_key DESC, competition ASC"
        ))
        .fetch_all(&pool)
        .await?;

        rows.into_iter().map(AccuracyRecord::try_from).collect()
    }
}
