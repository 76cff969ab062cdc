//! Parse-and-validate step for the language model's match estimate.
//!
//! The payload is untrusted: every numeric field is checked for presence and
//! type, then clamped into its domain. Values that cannot be salvaged (missing,
//! non-numeric, negative expected goals) reject the whole estimate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::predictions::Outcome;

pub const MIN_EXPECTED_GOALS: f64 = 0.1;
pub const MAX_EXPECTED_GOALS: f64 = 6.0;
pub const MIN_CONFIDENCE: u8 = 30;
pub const MAX_CONFIDENCE: u8 = 95;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("response is not a JSON object: {0}")]
    NotJson(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not numeric: {raw}")]
    NotNumeric { field: &'static str, raw: String },

    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// A validated, clamped estimate. Prose fields are carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEstimate {
    pub home_xg: f64,
    pub away_xg: f64,
    /// The model's own winner pick. Informational only.
    pub advisory_winner: Option<Outcome>,
    pub confidence: u8,
    pub analysis: Option<String>,
    pub key_facts: Vec<String>,
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
}

impl MatchEstimate {
    pub fn parse_str(content: &str) -> Result<Self, EstimateError> {
        let value: Value = serde_json::from_str(content.trim())
            .map_err(|e| EstimateError::NotJson(e.to_string()))?;
        Self::parse(&value)
    }

    pub fn parse(value: &Value) -> Result<Self, EstimateError> {
        let object = value
            .as_object()
            .ok_or_else(|| EstimateError::NotJson(truncate(&value.to_string())))?;

        let home_xg = clamp_expected_goals("homeXG", number(object.get("homeXG"), "homeXG")?)?;
        let away_xg = clamp_expected_goals("awayXG", number(object.get("awayXG"), "awayXG")?)?;
        let confidence =
            clamp_confidence(number(object.get("confidenceScore"), "confidenceScore")?);

        let advisory_winner = object
            .get("predictedWinner")
            .and_then(Value::as_str)
            .and_then(|label| label.parse().ok());

        let key_facts = object
            .get("keyFacts")
            .and_then(Value::as_array)
            .map(|facts| {
                facts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|fact| !fact.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            home_xg,
            away_xg,
            advisory_winner,
            confidence,
            analysis: text(object.get("analysis")),
            key_facts,
            seo_title: text(object.get("seoTitle")),
            meta_description: text(object.get("metaDescription")),
        })
    }
}

fn number(value: Option<&Value>, field: &'static str) -> Result<f64, EstimateError> {
    let parsed = match value {
        None | Some(Value::Null) => return Err(EstimateError::MissingField(field)),
        Some(Value::Number(n)) => n.as_f64(),
        // Models occasionally quote numbers
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(EstimateError::NotNumeric {
            field,
            raw: value.map(Value::to_string).unwrap_or_default(),
        }),
    }
}

fn clamp_expected_goals(field: &'static str, xg: f64) -> Result<f64, EstimateError> {
    if xg < 0.0 {
        return Err(EstimateError::OutOfRange { field, value: xg });
    }
    Ok(xg.clamp(MIN_EXPECTED_GOALS, MAX_EXPECTED_GOALS))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_confidence(confidence: f64) -> u8 {
    confidence
        .round()
        .clamp(f64::from(MIN_CONFIDENCE), f64::from(MAX_CONFIDENCE)) as u8
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn truncate(raw: &str) -> String {
    raw.chars().take(80).collect()
}
