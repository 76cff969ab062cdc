use chrono::{DateTime, Utc};
use matchcast_models::{
    AccuracyKey, AccuracyKind, AccuracyRecord as Accuracy, Fixture, FixtureStatus, MatchcastError,
    Outcome, Prediction, Result,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub external_id: i64,
    pub slug: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub competition_name: Option<String>,
    pub competition_country: Option<String>,
    pub kickoff_time: DateTime<Utc>,
    pub status: String,
    pub goals_home: Option<i32>,
    pub goals_away: Option<i32>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub fixture_id: i64,
    pub slug: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub competition_name: Option<String>,
    pub competition_country: Option<String>,
    pub kickoff_time: DateTime<Utc>,
    pub home_win_probability: i16,
    pub draw_probability: i16,
    pub away_win_probability: i16,
    pub over25_probability: i16,
    pub home_expected_goals: f64,
    pub away_expected_goals: f64,
    pub predicted_winner: String,
    pub confidence_score: i16,
    pub analysis: String,
    pub key_facts: Vec<String>,
    pub seo_title: String,
    pub meta_description: String,
    pub is_resolved: bool,
    pub actual_result: Option<String>,
    pub prediction_correct: Option<bool>,
    pub actual_goals_home: Option<i32>,
    pub actual_goals_away: Option<i32>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccuracyRecordRow {
    pub window_key: String,
    pub kind: String,
    pub competition: String,
    pub total: i64,
    pub correct: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FixtureRecord> for Fixture {
    fn from(row: FixtureRecord) -> Self {
        Self {
            external_id: row.external_id,
            slug: row.slug,
            home_team: row.home_team,
            away_team: row.away_team,
            competition_name: row.competition_name,
            competition_country: row.competition_country,
            kickoff_time: row.kickoff_time,
            status: FixtureStatus::from_code(&row.status),
            goals_home: row.goals_home,
            goals_away: row.goals_away,
        }
    }
}

fn percentage(field: &'static str, value: i16) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| MatchcastError::InvalidRecord {
            field,
            value: value.to_string(),
        })
}

impl TryFrom<PredictionRecord> for Prediction {
    type Error = MatchcastError;

    fn try_from(row: PredictionRecord) -> Result<Self> {
        Ok(Self {
            id: row.id,
            fixture_id: row.fixture_id,
            slug: row.slug,
            home_team: row.home_team,
            away_team: row.away_team,
            competition_name: row.competition_name,
            competition_country: row.competition_country,
            kickoff_time: row.kickoff_time,
            home_win_probability: percentage("home_win_probability", row.home_win_probability)?,
            draw_probability: percentage("draw_probability", row.draw_probability)?,
            away_win_probability: percentage("away_win_probability", row.away_win_probability)?,
            over25_probability: percentage("over25_probability", row.over25_probability)?,
            home_expected_goals: row.home_expected_goals,
            away_expected_goals: row.away_expected_goals,
            predicted_winner: row.predicted_winner.parse()?,
            confidence_score: percentage("confidence_score", row.confidence_score)?,
            analysis: row.analysis,
            key_facts: row.key_facts,
            seo_title: row.seo_title,
            meta_description: row.meta_description,
            is_resolved: row.is_resolved,
            actual_result: row
                .actual_result
                .as_deref()
                .map(str::parse::<Outcome>)
                .transpose()?,
            prediction_correct: row.prediction_correct,
            actual_goals_home: row.actual_goals_home,
            actual_goals_away: row.actual_goals_away,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<AccuracyRecordRow> for Accuracy {
    type Error = MatchcastError;

    fn try_from(row: AccuracyRecordRow) -> Result<Self> {
        let kind: AccuracyKind = row.kind.parse()?;
        let competition = match kind {
            AccuracyKind::Overall => None,
            AccuracyKind::Competition => Some(row.competition),
        };
        Ok(Self {
            key: AccuracyKey {
                window_key: row.window_key,
                kind,
                competition,
            },
            total: row.total,
            correct: row.correct,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column value for the competition part of the composite key.
pub(crate) fn competition_column(key: &AccuracyKey) -> &str {
    key.competition.as_deref().unwrap_or("")
}
