use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel competition key used when a fixture carries no competition name.
pub const UNKNOWN_COMPETITION: &str = "Unknown";

/// A fixture as written by the ingestion job. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub external_id: i64,
    pub slug: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub competition_name: Option<String>,
    pub competition_country: Option<String>,
    pub kickoff_time: DateTime<Utc>,
    pub status: FixtureStatus,
    pub goals_home: Option<i32>,
    pub goals_away: Option<i32>,
}

/// Fixture lifecycle as reported by the sports data provider.
///
/// Stored and exchanged using the provider's short codes (`NS`, `FT`, `AET`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FixtureStatus {
    Scheduled,
    Live(String),
    Finished,
    FinishedExtraTime,
    FinishedPenalties,
    Postponed,
    Cancelled,
    Abandoned,
    Other(String),
}

impl FixtureStatus {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "NS" | "TBD" => FixtureStatus::Scheduled,
            "FT" => FixtureStatus::Finished,
            "AET" => FixtureStatus::FinishedExtraTime,
            "PEN" => FixtureStatus::FinishedPenalties,
            "PST" => FixtureStatus::Postponed,
            "CANC" => FixtureStatus::Cancelled,
            "ABD" | "AWD" | "WO" => FixtureStatus::Abandoned,
            live @ ("1H" | "HT" | "2H" | "ET" | "BT" | "P" | "SUSP" | "INT" | "LIVE") => {
                FixtureStatus::Live(live.to_string())
            }
            other => FixtureStatus::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            FixtureStatus::Scheduled => "NS",
            FixtureStatus::Finished => "FT",
            FixtureStatus::FinishedExtraTime => "AET",
            FixtureStatus::FinishedPenalties => "PEN",
            FixtureStatus::Postponed => "PST",
            FixtureStatus::Cancelled => "CANC",
            FixtureStatus::Abandoned => "ABD",
            FixtureStatus::Live(code) | FixtureStatus::Other(code) => code,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, FixtureStatus::Scheduled)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, FixtureStatus::Live(_))
    }

    /// Full time, after extra time, or decided on penalties.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            FixtureStatus::Finished
                | FixtureStatus::FinishedExtraTime
                | FixtureStatus::FinishedPenalties
        )
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for FixtureStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for FixtureStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(FixtureStatus::from_code(&code))
    }
}

impl Fixture {
    pub fn new(
        external_id: i64,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        competition_name: Option<String>,
        kickoff_time: DateTime<Utc>,
    ) -> Self {
        Self {
            external_id,
            slug: None,
            home_team: home_team.into(),
            away_team: away_team.into(),
            competition_name,
            competition_country: None,
            kickoff_time,
            status: FixtureStatus::Scheduled,
            goals_home: None,
            goals_away: None,
        }
    }

    pub fn with_status(mut self, status: FixtureStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_score(mut self, home: i32, away: i32) -> Self {
        self.goals_home = Some(home);
        self.goals_away = Some(away);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.competition_country = Some(country.into());
        self
    }

    /// Final score, available only once both goal counts are known.
    pub fn final_score(&self) -> Option<(i32, i32)> {
        Some((self.goals_home?, self.goals_away?))
    }

    /// Competition key for accuracy bucketing.
    pub fn competition_key(&self) -> &str {
        self.competition_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNKNOWN_COMPETITION)
    }

    pub fn title(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}
