use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{MatchcastError, Result};
use crate::estimate::MatchEstimate;
use crate::fixtures::Fixture;

/// Three-way match result, used both for predicted winners and actual results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Argmax over a probability triple. Ties prefer draw, then home, then away.
    pub fn from_probabilities(home: u8, draw: u8, away: u8) -> Self {
        let max = home.max(draw).max(away);
        if draw == max {
            Outcome::Draw
        } else if home == max {
            Outcome::Home
        } else {
            Outcome::Away
        }
    }

    pub fn from_score(goals_home: i32, goals_away: i32) -> Self {
        match goals_home.cmp(&goals_away) {
            std::cmp::Ordering::Greater => Outcome::Home,
            std::cmp::Ordering::Less => Outcome::Away,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Home => "home",
            Outcome::Draw => "draw",
            Outcome::Away => "away",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = MatchcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Outcome::Home),
            "draw" => Ok(Outcome::Draw),
            "away" => Ok(Outcome::Away),
            other => Err(MatchcastError::InvalidRecord {
                field: "outcome",
                value: other.to_string(),
            }),
        }
    }
}

/// Integer percentages for the three outcomes. Always sums to 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeProbabilities {
    pub home_win: u8,
    pub draw: u8,
    pub away_win: u8,
}

impl OutcomeProbabilities {
    pub fn total(&self) -> u32 {
        u32::from(self.home_win) + u32::from(self.draw) + u32::from(self.away_win)
    }

    pub fn predicted_winner(&self) -> Outcome {
        Outcome::from_probabilities(self.home_win, self.draw, self.away_win)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: Uuid,
    pub fixture_id: i64,

    // Snapshot of the fixture at generation time
    pub slug: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub competition_name: Option<String>,
    pub competition_country: Option<String>,
    pub kickoff_time: DateTime<Utc>,

    pub home_win_probability: u8,
    pub draw_probability: u8,
    pub away_win_probability: u8,
    pub over25_probability: u8,
    pub home_expected_goals: f64,
    pub away_expected_goals: f64,
    pub predicted_winner: Outcome,
    pub confidence_score: u8,

    pub analysis: String,
    pub key_facts: Vec<String>,
    pub seo_title: String,
    pub meta_description: String,

    pub is_resolved: bool,
    pub actual_result: Option<Outcome>,
    pub prediction_correct: Option<bool>,
    pub actual_goals_home: Option<i32>,
    pub actual_goals_away: Option<i32>,
    pub resolved_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of comparing a prediction against the final score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub actual_result: Outcome,
    pub prediction_correct: bool,
    pub actual_goals_home: i32,
    pub actual_goals_away: i32,
    pub resolved_at: DateTime<Utc>,
}

impl Prediction {
    /// Builds an unresolved prediction. The winner label always comes from
    /// `probabilities`, never from the estimate.
    pub fn from_estimate(
        fixture: &Fixture,
        estimate: &MatchEstimate,
        probabilities: OutcomeProbabilities,
        over25_probability: u8,
        created_at: DateTime<Utc>,
    ) -> Self {
        let seo_title = estimate.seo_title.clone().unwrap_or_else(|| {
            format!(
                "{} vs {} Prediction – {}",
                fixture.home_team,
                fixture.away_team,
                fixture.competition_key()
            )
        });

        Self {
            id: Uuid::new_v4(),
            fixture_id: fixture.external_id,
            slug: fixture.slug.clone(),
            home_team: fixture.home_team.clone(),
            away_team: fixture.away_team.clone(),
            competition_name: fixture.competition_name.clone(),
            competition_country: fixture.competition_country.clone(),
            kickoff_time: fixture.kickoff_time,
            home_win_probability: probabilities.home_win,
            draw_probability: probabilities.draw,
            away_win_probability: probabilities.away_win,
            over25_probability,
            home_expected_goals: estimate.home_xg,
            away_expected_goals: estimate.away_xg,
            predicted_winner: probabilities.predicted_winner(),
            confidence_score: estimate.confidence,
            analysis: estimate.analysis.clone().unwrap_or_default(),
            key_facts: estimate.key_facts.clone(),
            seo_title,
            meta_description: estimate.meta_description.clone().unwrap_or_default(),
            is_resolved: false,
            actual_result: None,
            prediction_correct: None,
            actual_goals_home: None,
            actual_goals_away: None,
            resolved_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn probabilities(&self) -> OutcomeProbabilities {
        OutcomeProbabilities {
            home_win: self.home_win_probability,
            draw: self.draw_probability,
            away_win: self.away_win_probability,
        }
    }

    /// Scores this prediction against a final score. Pure; nothing is mutated.
    pub fn evaluate(&self, goals_home: i32, goals_away: i32, at: DateTime<Utc>) -> Resolution {
        let actual_result = Outcome::from_score(goals_home, goals_away);
        Resolution {
            actual_result,
            prediction_correct: self.predicted_winner == actual_result,
            actual_goals_home: goals_home,
            actual_goals_away: goals_away,
            resolved_at: at,
        }
    }

    /// Applies the pending → resolved transition. Returns false, leaving the
    /// record untouched, when it is already resolved.
    pub fn apply_resolution(&mut self, resolution: &Resolution) -> bool {
        if self.is_resolved {
            return false;
        }
        self.is_resolved = true;
        self.actual_result = Some(resolution.actual_result);
        self.prediction_correct = Some(resolution.prediction_correct);
        self.actual_goals_home = Some(resolution.actual_goals_home);
        self.actual_goals_away = Some(resolution.actual_goals_away);
        self.resolved_at = Some(resolution.resolved_at);
        self.updated_at = resolution.resolved_at;
        true
    }

    pub fn title(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_prediction(probabilities: OutcomeProbabilities) -> Prediction {
        let fixture = Fixture::new(
            555,
            "Arsenal",
            "Chelsea",
            Some("Premier League".to_string()),
            Utc::now() + Duration::hours(2),
        );
        let estimate = MatchEstimate {
            home_xg: 1.5,
            away_xg: 1.1,
            advisory_winner: Some(Outcome::Away),
            confidence: 70,
            analysis: None,
            key_facts: vec![],
            seo_title: None,
            meta_description: None,
        };
        Prediction::from_estimate(&fixture, &estimate, probabilities, 50, Utc::now())
    }

    #[test]
    fn test_tie_break_ordering() {
        assert_eq!(Outcome::from_probabilities(33, 34, 33), Outcome::Draw);
        assert_eq!(Outcome::from_probabilities(40, 40, 20), Outcome::Draw);
        assert_eq!(Outcome::from_probabilities(40, 20, 40), Outcome::Home);
        assert_eq!(Outcome::from_probabilities(20, 40, 40), Outcome::Draw);
        assert_eq!(Outcome::from_probabilities(30, 30, 40), Outcome::Away);
        assert_eq!(Outcome::from_probabilities(50, 25, 25), Outcome::Home);
    }

    #[test]
    fn test_outcome_from_score() {
        assert_eq!(Outcome::from_score(2, 1), Outcome::Home);
        assert_eq!(Outcome::from_score(0, 3), Outcome::Away);
        assert_eq!(Outcome::from_score(1, 1), Outcome::Draw);
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!("Home".parse::<Outcome>().unwrap(), Outcome::Home);
        assert_eq!("draw".parse::<Outcome>().unwrap(), Outcome::Draw);
        assert!("1".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_winner_comes_from_probabilities_not_estimate() {
        let prediction =
            test_prediction(OutcomeProbabilities { home_win: 47, draw: 27, away_win: 26 });
        assert_eq!(prediction.predicted_winner, Outcome::Home);
        assert_eq!(prediction.probabilities().total(), 100);
        assert_eq!(prediction.seo_title, "Arsenal vs Chelsea Prediction – Premier League");
        assert!(!prediction.is_resolved);
    }

    #[test]
    fn test_resolution_applies_once() {
        let mut prediction =
            test_prediction(OutcomeProbabilities { home_win: 47, draw: 27, away_win: 26 });
        let first_at = Utc::now();
        let resolution = prediction.evaluate(2, 1, first_at);
        assert_eq!(resolution.actual_result, Outcome::Home);
        assert!(resolution.prediction_correct);

        assert!(prediction.apply_resolution(&resolution));
        assert!(prediction.is_resolved);
        assert_eq!(prediction.resolved_at, Some(first_at));

        let later = prediction.evaluate(0, 3, first_at + Duration::hours(1));
        assert!(!prediction.apply_resolution(&later));
        assert_eq!(prediction.actual_result, Some(Outcome::Home));
        assert_eq!(prediction.resolved_at, Some(first_at));
    }

    #[test]
    fn test_incorrect_prediction() {
        let prediction =
            test_prediction(OutcomeProbabilities { home_win: 30, draw: 40, away_win: 30 });
        let resolution = prediction.evaluate(0, 1, Utc::now());
        assert_eq!(resolution.actual_result, Outcome::Away);
        assert!(!resolution.prediction_correct);
    }
}
