use crate::error::ApiResult;
use crate::services::PipelineAnalytics;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};

/// GET /api/analytics
pub async fn get_analytics(State(state): State<AppState>) -> ApiResult<Json<PipelineAnalytics>> {
    Ok(Json(state.services.analytics.get_analytics().await?))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/api/analytics", get(get_analytics))
}
