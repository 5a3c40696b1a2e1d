//! HTTP API handlers
//!
//! REST endpoints under `/api`, a Server-Sent Events stream of pipeline
//! events, and `/health`. The acting user comes from the `X-User-Id` header.

pub mod analytics;
pub mod health;
pub mod outreach;
pub mod prospects;
pub mod sse;

pub use analytics::analytics_routes;
pub use health::health_routes;
pub use outreach::outreach_routes;
pub use prospects::prospect_routes;
pub use sse::event_stream;

use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// User on whose behalf the request acts; the nil UUID when absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(ActingUser(Uuid::nil()));
        };

        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(ActingUser)
            .ok_or_else(|| ApiError::BadRequest("X-User-Id must be a UUID".to_string()))
    }
}
