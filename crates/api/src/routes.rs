use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use matchcast_db::{ConnectionManager, PredictionStore};
use matchcast_models::{AccuracyReport, Prediction};
use matchcast_services::{
    AccuracyLedger, CycleReport, GenerationRequest, GenerationSummary, HourlyCycle, OutcomeResolver,
    PipelineMetrics, PredictionGenerator, ResolutionSummary,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<PredictionGenerator>,
    pub resolver: Arc<OutcomeResolver>,
    pub ledger: Arc<AccuracyLedger>,
    pub cycle: Arc<HourlyCycle>,
    pub predictions: Arc<dyn PredictionStore>,
    pub metrics: Arc<PipelineMetrics>,
    /// Absent when running on the in-memory store.
    pub database: Option<Arc<ConnectionManager>>,
    /// When set, `/api/v1/cron/hourly` requires it in `x-cron-secret`.
    pub cron_secret: Option<String>,
    pub started_at: Instant,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParams {
    pub fixture_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccuracyParams {
    pub weeks: Option<u32>,
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        // Triggers
        .route("/api/v1/predictions/generate", post(generate_predictions))
        .route("/api/v1/predictions/resolve", post(resolve_predictions))
        .route("/api/v1/cron/hourly", post(run_hourly_cycle))
        // Reads
        .route("/api/v1/predictions/:fixture_id", get(get_prediction_by_fixture))
        .route("/api/v1/accuracy", get(get_accuracy))
}

/// Full application router with tracing and read-only CORS.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    create_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.database {
        None => "memory",
        Some(db) => match db.health_check().await {
            Ok(true) => "connected",
            _ => "unavailable",
        },
    };

    Json(HealthResponse {
        status: if database == "unavailable" { "degraded" } else { "healthy" }.to_string(),
        database: database.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn generate_predictions(
    State(state): State<AppState>,
    Query(params): Query<GenerateParams>,
) -> Result<Json<ApiResponse<GenerationSummary>>, ApiError> {
    let request = GenerationRequest {
        fixture_id: params.fixture_id,
    };
    let summary = state.generator.run(request, Utc::now()).await?;
    Ok(ApiResponse::ok(summary))
}

async fn resolve_predictions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResolutionSummary>>, ApiError> {
    let summary = state.resolver.run(Utc::now()).await?;
    Ok(ApiResponse::ok(summary))
}

async fn run_hourly_cycle(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<CycleReport>>, ApiError> {
    if let Some(secret) = state.cron_secret.as_deref().filter(|s| !s.is_empty()) {
        let provided = headers
            .get(CRON_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(secret) {
            warn!("rejected hourly trigger with missing or wrong secret");
            return Err(ApiError::unauthorized());
        }
    }

    info!("hourly cycle triggered over HTTP");
    Ok(ApiResponse::ok(state.cycle.run_once(Utc::now()).await))
}

async fn get_prediction_by_fixture(
    State(state): State<AppState>,
    Path(fixture_id): Path<i64>,
) -> Result<Json<ApiResponse<Prediction>>, ApiError> {
    state
        .predictions
        .prediction_for_fixture(fixture_id)
        .await?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found(format!("No prediction for fixture {fixture_id}")))
}

async fn get_accuracy(
    State(state): State<AppState>,
    Query(params): Query<AccuracyParams>,
) -> Result<Json<ApiResponse<AccuracyReport>>, ApiError> {
    let report = state.ledger.report(params.weeks).await?;
    Ok(ApiResponse::ok(report))
}
