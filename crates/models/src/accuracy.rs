use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MatchcastError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyKind {
    Overall,
    Competition,
}

impl AccuracyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccuracyKind::Overall => "overall",
            AccuracyKind::Competition => "competition",
        }
    }
}

impl fmt::Display for AccuracyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccuracyKind {
    type Err = MatchcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "overall" => Ok(AccuracyKind::Overall),
            "competition" => Ok(AccuracyKind::Competition),
            other => Err(MatchcastError::InvalidRecord {
                field: "kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Composite key of an accuracy bucket. `competition` is set only for
/// per-competition buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyKey {
    pub window_key: String,
    pub kind: AccuracyKind,
    pub competition: Option<String>,
}

impl AccuracyKey {
    pub fn overall(window_key: impl Into<String>) -> Self {
        Self {
            window_key: window_key.into(),
            kind: AccuracyKind::Overall,
            competition: None,
        }
    }

    pub fn competition(window_key: impl Into<String>, competition: impl Into<String>) -> Self {
        Self {
            window_key: window_key.into(),
            kind: AccuracyKind::Competition,
            competition: Some(competition.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyRecord {
    #[serde(flatten)]
    pub key: AccuracyKey,
    pub total: i64,
    pub correct: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccuracyRecord {
    pub fn empty(key: AccuracyKey, at: DateTime<Utc>) -> Self {
        Self {
            key,
            total: 0,
            correct: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn increment(&mut self, correct: bool, at: DateTime<Utc>) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
        self.updated_at = at;
    }

    pub fn accuracy(&self) -> u32 {
        accuracy_percent(self.correct, self.total)
    }
}

/// ISO-8601 week key, e.g. `2026-W08`. The year is the ISO week-numbering
/// year, so 2027-01-01 falls in `2026-W53`.
pub fn week_key(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Rounded integer percentage; 0 when there is no sample.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn accuracy_percent(correct: i64, total: i64) -> u32 {
    if total <= 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyStat {
    pub total: i64,
    pub correct: i64,
    pub accuracy: u32,
}

impl AccuracyStat {
    pub fn new(total: i64, correct: i64) -> Self {
        Self {
            total,
            correct,
            accuracy: accuracy_percent(correct, total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAccuracy {
    pub week: String,
    #[serde(flatten)]
    pub stat: AccuracyStat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionAccuracy {
    pub competition: String,
    #[serde(flatten)]
    pub stat: AccuracyStat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    pub overall: AccuracyStat,
    pub weekly_trend: Vec<WeeklyAccuracy>,
    pub by_competition: Vec<CompetitionAccuracy>,
}
