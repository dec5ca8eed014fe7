use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{RecommendationRequest, RecommendationResponse},
    services::Outcome,
};

use super::AppState;

const NO_RECOMMENDATIONS: &str = "No recommendations found";

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Content-based recommendations for the given movie ids
pub async fn content_based(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let movie_ids = request
        .movie_ids
        .ok_or_else(|| AppError::InvalidInput("movie_ids is required".to_string()))?;

    if movie_ids.is_empty() {
        return Err(AppError::InvalidInput(
            "movie_ids must not be empty".to_string(),
        ));
    }

    tracing::info!(
        request_id = %request_id,
        movie_count = movie_ids.len(),
        "Processing content-based recommendation request"
    );

    let outcome = state
        .recommender
        .content_based(&movie_ids, state.recommendation_count)
        .await;

    respond(&request_id, outcome)
}

/// Collaborative recommendations, degrading to content-based
///
/// A missing or empty `movie_ids` is not rejected up front; it simply
/// yields no recommendations.
pub async fn collaborative(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let movie_ids = request.movie_ids.unwrap_or_default();

    tracing::info!(
        request_id = %request_id,
        movie_count = movie_ids.len(),
        "Processing collaborative recommendation request"
    );

    let outcome = state
        .recommender
        .collaborative(&movie_ids, state.recommendation_count)
        .await;

    if let Outcome::Fallback { reason, .. } = &outcome {
        tracing::info!(
            request_id = %request_id,
            reason = %reason,
            "Served content-based fallback"
        );
    }

    respond(&request_id, outcome)
}

fn respond(request_id: &RequestId, outcome: Outcome) -> AppResult<Json<RecommendationResponse>> {
    let recommendations = outcome.into_recommendations();

    if recommendations.is_empty() {
        tracing::info!(request_id = %request_id, "No recommendations found");
        return Err(AppError::NotFound(NO_RECOMMENDATIONS.to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        result_count = recommendations.len(),
        "Recommendations served"
    );

    Ok(Json(RecommendationResponse { recommendations }))
}
