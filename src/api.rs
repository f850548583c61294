// src/api.rs
//! Local HTTP surface over the rating service and the settings store.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::badge::{self, Badge};
use crate::fetcher::OmdbClient;
use crate::ratings::{RatingOrigin, RatingService, Resolution};
use crate::record::RatingRecord;
use crate::settings::{SettingsError, SettingsStore};
use crate::sites::SiteRegistry;
use crate::thresholds::{RangeIssue, Scale, ThresholdClassifier, Thresholds, ThresholdsInput};

/// Width used for badge geometry when the caller gives none.
const DEFAULT_WIDTH: f64 = 200.0;

#[derive(Clone)]
pub struct AppState {
    pub ratings: RatingService,
    pub classifier: Arc<ThresholdClassifier>,
    pub sites: Arc<SiteRegistry>,
    /// Probes new API keys before they are stored; `None` stores them unchecked.
    pub key_probe: Option<Arc<OmdbClient>>,
}

impl AppState {
    fn settings(&self) -> &SettingsStore {
        self.ratings.settings()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ratings", get(get_ratings))
        .route("/classify", get(classify))
        .route("/settings", get(get_settings))
        .route("/settings/api-key", put(put_api_key))
        .route("/settings/ranges", put(put_ranges))
        .route("/settings/ranges/reset", post(reset_ranges))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body: `{"error": "..."}`, plus per-scale lists for range failures.
pub struct ApiError(SettingsError);

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        Self(e)
    }
}

fn messages(issues: &[RangeIssue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            SettingsError::InvalidRanges { decimal, percent } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "range validation failed",
                    "imdb": messages(&decimal),
                    "rt": messages(&percent),
                })),
            )
                .into_response(),
            e @ (SettingsError::EmptyApiKey | SettingsError::InvalidApiKey) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
            SettingsError::Store(e) => {
                tracing::error!(target: "settings", error = %e, "settings store failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "settings store unavailable" })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Deserialize)]
struct RatingsQuery {
    title: String,
    #[serde(default)]
    width: Option<f64>,
    /// Page host; picks the site's size multiplier.
    #[serde(default)]
    host: Option<String>,
}

#[derive(Serialize)]
struct RatingsResp {
    title: String,
    origin: RatingOrigin,
    record: RatingRecord,
    /// Absent when neither score is known.
    badge: Option<Badge>,
}

async fn get_ratings(
    State(state): State<AppState>,
    Query(q): Query<RatingsQuery>,
) -> Response {
    let title = q.title.trim();
    if title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "title is required" })),
        )
            .into_response();
    }

    let (record, origin) = match state.ratings.resolve(title).await {
        Resolution::NoApiKey => {
            return (
                StatusCode::PRECONDITION_FAILED,
                Json(json!({ "error": "no API key configured" })),
            )
                .into_response();
        }
        Resolution::Found { record, origin } => (record, origin),
    };

    let multiplier = q
        .host
        .as_deref()
        .and_then(|h| state.sites.resolve(h))
        .map_or(1.0, |site| site.size_multiplier());
    let width = q.width.filter(|w| *w > 0.0).unwrap_or(DEFAULT_WIDTH);
    let badge = (!record.is_all_sentinel())
        .then(|| badge::render(title, &record, width, multiplier, &state.classifier));

    Json(RatingsResp {
        title: title.to_string(),
        origin,
        record,
        badge,
    })
    .into_response()
}

#[derive(Deserialize)]
struct ClassifyQuery {
    value: String,
    scale: Scale,
}

async fn classify(
    State(state): State<AppState>,
    Query(q): Query<ClassifyQuery>,
) -> Json<serde_json::Value> {
    let color = state.classifier.classify(&q.value, q.scale);
    Json(json!({
        "value": q.value,
        "scale": q.scale,
        "color": color,
        "fill_percent": badge::fill_percentage(&q.value, q.scale),
    }))
}

#[derive(Serialize)]
struct SettingsResp {
    api_key_set: bool,
    #[serde(flatten)]
    thresholds: Thresholds,
}

async fn get_settings(State(state): State<AppState>) -> Json<SettingsResp> {
    Json(SettingsResp {
        api_key_set: state.settings().api_key().await.is_some(),
        thresholds: state.settings().thresholds().await,
    })
}

#[derive(Deserialize)]
struct ApiKeyReq {
    api_key: String,
}

async fn put_api_key(
    State(state): State<AppState>,
    Json(body): Json<ApiKeyReq>,
) -> Result<StatusCode, ApiError> {
    let key = body.api_key.trim();
    if key.is_empty() {
        return Err(SettingsError::EmptyApiKey.into());
    }
    if let Some(probe) = &state.key_probe {
        if !probe.validate_key(key).await {
            return Err(SettingsError::InvalidApiKey.into());
        }
    }
    state.settings().set_api_key(key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_ranges(
    State(state): State<AppState>,
    Json(body): Json<ThresholdsInput>,
) -> Result<Json<Thresholds>, ApiError> {
    let (decimal, percent) = body.into_ranges();
    let saved = state.settings().save_ranges(decimal, percent).await?;
    state.classifier.reload(state.settings()).await;
    Ok(Json(saved))
}

async fn reset_ranges(State(state): State<AppState>) -> Result<Json<Thresholds>, ApiError> {
    let t = state.settings().reset_ranges().await?;
    state.classifier.reload(state.settings()).await;
    Ok(Json(t))
}
