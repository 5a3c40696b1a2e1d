//! Outreach endpoints: preview, send, history, batch, follow-ups, delivery webhook

use super::ActingUser;
use crate::error::{ApiError, ApiResult};
use crate::services::outreach::{BatchOutreachResult, OutreachPreview};
use crate::services::{OutreachRejection, PreviewOutcome, SendOutcome};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use cpl_common::models::{EmailStatus, OutreachEmail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body returned for a single send
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outreach_email_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence_step: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<OutreachRejection>,
}

impl From<SendOutcome> for SendResponse {
    fn from(outcome: SendOutcome) -> Self {
        let message = outcome.message();
        match outcome {
            SendOutcome::Sent {
                outreach_email_id,
                cadence_step,
                ..
            } => Self {
                success: true,
                message,
                outreach_email_id: Some(outreach_email_id),
                cadence_step: Some(cadence_step),
                rejection: None,
            },
            SendOutcome::Rejected(reason) => Self {
                success: false,
                message,
                outreach_email_id: None,
                cadence_step: None,
                rejection: Some(reason),
            },
            SendOutcome::Failed {
                outreach_email_id,
                cadence_step,
                ..
            } => Self {
                success: false,
                message,
                outreach_email_id: Some(outreach_email_id),
                cadence_step: Some(cadence_step),
                rejection: None,
            },
        }
    }
}

/// GET /api/prospects/:id/outreach/preview
pub async fn preview_outreach(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OutreachPreview>> {
    match state.services.outreach.preview_outreach(id).await? {
        PreviewOutcome::Ready(preview) => Ok(Json(preview)),
        PreviewOutcome::Rejected(OutreachRejection::NotFound) => {
            Err(ApiError::NotFound(format!("Prospect {}", id)))
        }
        PreviewOutcome::Rejected(reason) => Err(ApiError::Conflict(reason.message().to_string())),
    }
}

/// POST /api/prospects/:id/outreach
///
/// Refusals other than an unknown prospect are reported in the body with
/// `success: false`.
pub async fn send_outreach(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SendResponse>> {
    match state.services.outreach.send_outreach(id, user_id).await? {
        SendOutcome::Rejected(OutreachRejection::NotFound) => {
            Err(ApiError::NotFound(format!("Prospect {}", id)))
        }
        outcome => Ok(Json(outcome.into())),
    }
}

/// GET /api/prospects/:id/outreach
pub async fn outreach_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<OutreachEmail>>> {
    Ok(Json(state.services.outreach.list_outreach_history(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub prospect_ids: Vec<Uuid>,
}

/// POST /api/outreach/batch
pub async fn send_batch(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchOutreachResult>> {
    let result = state
        .services
        .outreach
        .send_batch_outreach(&request.prospect_ids, user_id)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct FollowUpResponse {
    pub sent: usize,
}

/// POST /api/outreach/followups
pub async fn process_followups(State(state): State<AppState>) -> ApiResult<Json<FollowUpResponse>> {
    let sent = state.services.outreach.process_due_followups().await?;
    Ok(Json(FollowUpResponse { sent }))
}

#[derive(Debug, Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: String,
}

/// POST /api/outreach/emails/:id/status
pub async fn record_delivery_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DeliveryStatusRequest>,
) -> ApiResult<Json<OutreachEmail>> {
    let status = EmailStatus::parse(&request.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown email status: {}", request.status)))?;
    Ok(Json(state.services.outreach.record_delivery_status(id, status).await?))
}

pub fn outreach_routes() -> Router<AppState> {
    Router::new()
        .route("/api/prospects/:id/outreach", get(outreach_history).post(send_outreach))
        .route("/api/prospects/:id/outreach/preview", get(preview_outreach))
        .route("/api/outreach/batch", post(send_batch))
        .route("/api/outreach/followups", post(process_followups))
        .route("/api/outreach/emails/:id/status", post(record_delivery_status))
}
