//! # Community Partner Pipeline service
//!
//! Engines for scoring, importing, nurturing, and converting prospective
//! community partners, plus the HTTP API that exposes them.

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use cpl_common::events::EventBus;
use services::Services;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: Arc<Services>, event_bus: EventBus) -> Self {
        Self {
            services,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::prospect_routes())
        .merge(api::outreach_routes())
        .merge(api::analytics_routes())
        .route("/api/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
