//! Client for the language model that supplies expected goals and match copy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matchcast_models::{Fixture, MatchEstimate, MatchcastError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// What the model is told about a fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchContext {
    pub fixture_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub competition: String,
    pub country: Option<String>,
    pub kickoff_time: DateTime<Utc>,
}

impl MatchContext {
    pub fn from_fixture(fixture: &Fixture) -> Self {
        Self {
            fixture_id: fixture.external_id,
            home_team: fixture.home_team.clone(),
            away_team: fixture.away_team.clone(),
            competition: fixture.competition_key().to_string(),
            country: fixture.competition_country.clone(),
            kickoff_time: fixture.kickoff_time,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchAnalyst: Send + Sync {
    /// False when credentials are missing; generation then fails as a
    /// configuration error before any fixture is touched.
    fn is_configured(&self) -> bool;

    async fn estimate(&self, context: &MatchContext) -> Result<MatchEstimate>;
}

#[derive(Debug, Clone)]
pub struct AnalystConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            temperature: 0.7,
            max_tokens: 1200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

const SYSTEM_PROMPT: &str = "You are a professional football statistics analyst. \
Always respond with valid JSON only. No markdown, no explanation outside JSON.";

/// OpenAI-compatible chat completions client.
pub struct OpenAiAnalyst {
    config: AnalystConfig,
    http: Client,
}

impl OpenAiAnalyst {
    pub fn new(config: AnalystConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MatchcastError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn prompt(context: &MatchContext) -> String {
        let date = context.kickoff_time.format("%A %-d %B %Y");
        let league = match &context.country {
            Some(country) => format!("{} ({country})", context.competition),
            None => context.competition.clone(),
        };
        format!(
            r#"Produce a JSON match preview for:
- Home team: {home}
- Away team: {away}
- Competition: {league}
- Date: {date}

Return ONLY a JSON object with these fields:
{{
  "homeXG": <expected goals for {home}, number 0.5-3.5>,
  "awayXG": <expected goals for {away}, number 0.5-3.5>,
  "predictedWinner": "<home|draw|away>",
  "confidenceScore": <number 45-90>,
  "keyFacts": ["<home form>", "<away form>", "<head to head or table context>", "<tactical or injury note>"],
  "analysis": "<400-500 word match analysis naming both teams, ending with the predicted outcome. No gambling language; say 'our model predicts'.>",
  "seoTitle": "{home} vs {away} Prediction – {competition} {date}",
  "metaDescription": "<155-160 character summary mentioning both teams, the competition, the date and the key prediction>"
}}"#,
            home = context.home_team,
            away = context.away_team,
            competition = context.competition,
        )
    }
}

#[async_trait]
impl MatchAnalyst for OpenAiAnalyst {
    fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    async fn estimate(&self, context: &MatchContext) -> Result<MatchEstimate> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| MatchcastError::Config("OPENAI_API_KEY not set".to_string()))?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(context),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        debug!(
            fixture_id = context.fixture_id,
            model = %self.config.model,
            "requesting match estimate"
        );

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body: ChatResponse = response.json().await.map_err(|e| self.transport_error(&e))?;

        if let Some(error) = body.error {
            warn!(fixture_id = context.fixture_id, %status, "analyst API error: {}", error.message);
            return Err(MatchcastError::Analyst(error.message));
        }
        if !status.is_success() {
            return Err(MatchcastError::Analyst(format!("analyst API returned {status}")));
        }

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| MatchcastError::Analyst("response contained no choices".to_string()))?;

        Ok(MatchEstimate::parse_str(&content)?)
    }
}

impl OpenAiAnalyst {
    fn transport_error(&self, error: &reqwest::Error) -> MatchcastError {
        if error.is_timeout() {
            MatchcastError::Timeout {
                operation: "analyst request".to_string(),
                seconds: self.config.timeout_secs,
            }
        } else {
            MatchcastError::Analyst(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> MatchContext {
        let fixture = Fixture::new(
            555,
            "Arsenal",
            "Chelsea",
            Some("Premier League".to_string()),
            Utc.with_ymd_and_hms(2026, 2, 21, 15, 0, 0).unwrap(),
        )
        .with_country("England");
        MatchContext::from_fixture(&fixture)
    }

    #[test]
    fn test_prompt_mentions_fixture_details() {
        let prompt = OpenAiAnalyst::prompt(&context());
        assert!(prompt.contains("Home team: Arsenal"));
        assert!(prompt.contains("Away team: Chelsea"));
        assert!(prompt.contains("Premier League (England)"));
        assert!(prompt.contains("Saturday 21 February 2026"));
        assert!(prompt.contains("\"homeXG\""));
    }

    #[test]
    fn test_context_uses_competition_sentinel() {
        let fixture = Fixture::new(9, "A", "B", None, Utc::now());
        assert_eq!(MatchContext::from_fixture(&fixture).competition, "Unknown");
    }

    #[test]
    fn test_configuration_check() {
        let missing = OpenAiAnalyst::new(AnalystConfig::default()).unwrap();
        assert!(!missing.is_configured());

        let blank = OpenAiAnalyst::new(AnalystConfig {
            api_key: Some("  ".to_string()),
            ..AnalystConfig::default()
        })
        .unwrap();
        assert!(!blank.is_configured());

        let configured = OpenAiAnalyst::new(AnalystConfig {
            api_key: Some("sk-test".to_string()),
            ..AnalystConfig::default()
        })
        .unwrap();
        assert!(configured.is_configured());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_item_error() {
        let analyst = OpenAiAnalyst::new(AnalystConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://127.0.0.1:1/v1".to_string(),
            timeout_secs: 2,
            ..AnalystConfig::default()
        })
        .unwrap();
        let err = analyst.estimate(&context()).await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_chat_response_shapes() {
        let ok: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"homeXG\":1.2}"}}]}"#,
        )
        .unwrap();
        assert_eq!(ok.choices.len(), 1);
        assert!(ok.error.is_none());

        let err: ChatResponse =
            serde_json::from_str(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#)
                .unwrap();
        assert!(err.choices.is_empty());
        assert_eq!(err.error.unwrap().message, "Rate limit reached");
    }
}
