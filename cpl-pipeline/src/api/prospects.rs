//! Prospect endpoints: CRUD, scoring, gaps, import, activities, conversion

use super::ActingUser;
use crate::error::{ApiError, ApiResult};
use crate::services::{ConversionResult, ConvertRequest, GeographicGap, ImportResult};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cpl_common::models::{
    ActivityType, FitScore, Location, OrganizationType, PartnerType, PipelineStage, Prospect,
    ProspectActivity, ProspectSource,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ProspectFilter {
    pub stage: Option<String>,
    #[serde(rename = "type")]
    pub organization_type: Option<String>,
}

/// GET /api/prospects
pub async fn list_prospects(
    State(state): State<AppState>,
    Query(filter): Query<ProspectFilter>,
) -> ApiResult<Json<Vec<Prospect>>> {
    let stage = match filter.stage.as_deref() {
        Some(raw) => Some(
            PipelineStage::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown pipeline stage: {}", raw)))?,
        ),
        None => None,
    };
    let organization_type = filter.organization_type.as_deref().map(OrganizationType::parse);

    let prospects = state
        .services
        .repos
        .prospects
        .query(&|p: &Prospect| {
            stage.map_or(true, |s| p.pipeline_stage == s)
                && organization_type.as_ref().map_or(true, |t| &p.organization_type == t)
        })
        .await?;

    Ok(Json(prospects))
}

#[derive(Debug, Deserialize)]
pub struct CreateProspectRequest {
    pub name: String,
    #[serde(default)]
    pub organization_type: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub population: Option<u64>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub contact_title: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// POST /api/prospects
///
/// Creates the prospect at stage `New` and scores it immediately.
pub async fn create_prospect(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(request): Json<CreateProspectRequest>,
) -> ApiResult<(StatusCode, Json<Prospect>)> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let mut location = Location::new(&request.city, &request.region, &request.country);
    if let (Some(lat), Some(lon)) = (request.latitude, request.longitude) {
        location = location.with_coordinates(lat, lon);
    }

    let mut prospect = Prospect::new(
        &request.name,
        OrganizationType::parse(request.organization_type.as_deref().unwrap_or("Other")),
        location,
        ProspectSource::Manual,
        user_id,
    );
    prospect.population = request.population;
    prospect.contact_email = request.contact_email;
    prospect.contact_name = request.contact_name;
    prospect.contact_title = request.contact_title;
    prospect.website = request.website;
    prospect.notes = request.notes;

    let services = &state.services;
    let prospect = services.repos.prospects.add(prospect).await?;
    services.scoring.calculate_fit_score(prospect.id).await?;
    let prospect = services
        .repos
        .prospects
        .get(prospect.id)
        .await?
        .ok_or_else(|| ApiError::Internal("Prospect vanished after creation".to_string()))?;

    info!(prospect_id = %prospect.id, score = prospect.fit_score.total, "Prospect created");
    Ok((StatusCode::CREATED, Json(prospect)))
}

/// GET /api/prospects/:id
pub async fn get_prospect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Prospect>> {
    state
        .services
        .repos
        .prospects
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prospect {}", id)))
}

/// POST /api/prospects/:id/score
pub async fn score_prospect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FitScore>> {
    state
        .services
        .scoring
        .calculate_fit_score(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prospect {}", id)))
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub updated: usize,
}

/// POST /api/prospects/scores/recalculate
pub async fn recalculate_scores(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> ApiResult<Json<RecalculateResponse>> {
    let updated = state.services.scoring.recalculate_all_scores(user_id).await?;
    Ok(Json(RecalculateResponse { updated }))
}

/// GET /api/prospects/gaps
pub async fn geographic_gaps(State(state): State<AppState>) -> ApiResult<Json<Vec<GeographicGap>>> {
    Ok(Json(state.services.scoring.get_geographic_gaps().await?))
}

/// POST /api/prospects/import (raw CSV body)
pub async fn import_prospects(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    body: Bytes,
) -> ApiResult<Json<ImportResult>> {
    let result = state.services.importer.import_prospects(&body[..], user_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AddActivityRequest {
    pub activity_type: ActivityType,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub details: String,
}

/// GET /api/prospects/:id/activities
pub async fn list_activities(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ProspectActivity>>> {
    Ok(Json(state.services.activity.list_activities(id).await?))
}

/// POST /api/prospects/:id/activities
pub async fn add_activity(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddActivityRequest>,
) -> ApiResult<(StatusCode, Json<ProspectActivity>)> {
    let activity = ProspectActivity::new(
        id,
        request.activity_type,
        &request.subject,
        &request.details,
        user_id,
    );
    let activity = state.services.activity.add_activity(activity, user_id).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertBody {
    #[serde(default)]
    pub partner_type: Option<PartnerType>,
    #[serde(default)]
    pub send_welcome_email: bool,
}

/// POST /api/prospects/:id/convert
///
/// 404 for an unknown prospect, 409 when the conversion is refused.
pub async fn convert_prospect(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ConvertBody>,
) -> ApiResult<(StatusCode, Json<ConversionResult>)> {
    if state.services.repos.prospects.get(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Prospect {}", id)));
    }

    let request = ConvertRequest {
        prospect_id: id,
        partner_type: body.partner_type,
        send_welcome_email: body.send_welcome_email,
    };
    let result = state.services.conversion.convert_to_partner(&request, user_id).await?;
    let status = if result.success {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(result)))
}

pub fn prospect_routes() -> Router<AppState> {
    Router::new()
        .route("/api/prospects", get(list_prospects).post(create_prospect))
        .route("/api/prospects/gaps", get(geographic_gaps))
        .route("/api/prospects/import", post(import_prospects))
        .route("/api/prospects/scores/recalculate", post(recalculate_scores))
        .route("/api/prospects/:id", get(get_prospect))
        .route("/api/prospects/:id/score", post(score_prospect))
        .route("/api/prospects/:id/activities", get(list_activities).post(add_activity))
        .route("/api/prospects/:id/convert", post(convert_prospect))
}
