//! Entity builders and a wired in-memory service stack

use super::fakes::{RecordingEmailSender, ScriptedSentiment};
use chrono::{Duration, Utc};
use cpl_common::events::EventBus;
use cpl_common::models::{
    Audit, EventStatus, Location, OrganizationType, Partner, PartnerStatus, PartnerType,
    PlatformEvent, Prospect, ProspectSource, Sentiment,
};
use cpl_pipeline::clients::{FallbackAi, PlatformInfo, RepositoryPartnerManager};
use cpl_pipeline::services::{Clients, OutreachConfig, Repositories, Services};
use std::sync::Arc;
use uuid::Uuid;

pub const SEATTLE: (f64, f64) = (47.6062, -122.3321);
pub const PORTLAND: (f64, f64) = (45.5152, -122.6784);
pub const SPOKANE: (f64, f64) = (47.6588, -117.4260);
/// About 6 miles east of Seattle
pub const BELLEVUE: (f64, f64) = (47.6101, -122.2015);

/// Prospect without coordinates
pub fn prospect(name: &str, organization_type: OrganizationType) -> Prospect {
    Prospect::new(
        name,
        organization_type,
        Location::new("Springfield", "IL", "US"),
        ProspectSource::Manual,
        Uuid::nil(),
    )
}

/// Prospect located at `point`, with a contact email
pub fn prospect_at(name: &str, city: &str, point: (f64, f64)) -> Prospect {
    let mut prospect = Prospect::new(
        name,
        OrganizationType::Nonprofit,
        Location::new(city, "WA", "US").with_coordinates(point.0, point.1),
        ProspectSource::Manual,
        Uuid::nil(),
    );
    prospect.contact_email = Some(format!("{}@example.org", city.to_lowercase()));
    prospect.contact_name = Some("Pat Organizer".to_string());
    prospect
}

pub fn event_at(city: &str, point: (f64, f64), status: EventStatus) -> PlatformEvent {
    PlatformEvent {
        id: Uuid::new_v4(),
        name: format!("{} cleanup", city),
        status,
        location: Location::new(city, "WA", "US").with_coordinates(point.0, point.1),
        event_date: Utc::now() + Duration::days(3),
        audit: Audit::new(Uuid::nil()),
    }
}

/// Active, publicly listed partner at `point`
pub fn partner_at(name: &str, city: &str, point: (f64, f64)) -> Partner {
    Partner {
        id: Uuid::new_v4(),
        name: name.to_string(),
        partner_type: PartnerType::Community,
        status: PartnerStatus::Active,
        is_publicly_listed: true,
        location: Location::new(city, "WA", "US").with_coordinates(point.0, point.1),
        website: None,
        primary_email: None,
        notes: None,
        audit: Audit::new(Uuid::nil()),
    }
}

/// Outreach on, live mode, generous limits
pub fn enabled_config() -> OutreachConfig {
    OutreachConfig {
        enabled: true,
        test_mode: false,
        max_daily: 100,
        ..OutreachConfig::default()
    }
}

/// Engines over in-memory repositories with recording fakes
pub struct TestContext {
    pub repos: Repositories,
    pub services: Arc<Services>,
    pub email: Arc<RecordingEmailSender>,
    pub sentiment: Arc<ScriptedSentiment>,
    pub event_bus: EventBus,
}

impl TestContext {
    pub fn new(config: OutreachConfig) -> Self {
        Self::with_repos(Repositories::in_memory(), config)
    }

    pub fn with_repos(repos: Repositories, config: OutreachConfig) -> Self {
        let email = Arc::new(RecordingEmailSender::new());
        let sentiment = Arc::new(ScriptedSentiment::new(Sentiment::Neutral));
        let event_bus = EventBus::new(100);
        let platform = PlatformInfo::default();

        let clients = Clients {
            content: Arc::new(FallbackAi::new(platform.clone())),
            sentiment: sentiment.clone(),
            email: email.clone(),
            partner_manager: Arc::new(RepositoryPartnerManager::new(
                repos.partners.clone(),
                repos.partner_admins.clone(),
            )),
            platform,
        };
        let services = Arc::new(Services::new(repos.clone(), clients, config, event_bus.clone()));

        Self {
            repos,
            services,
            email,
            sentiment,
            event_bus,
        }
    }

    pub async fn add_prospect(&self, prospect: Prospect) -> Prospect {
        self.repos.prospects.add(prospect).await.unwrap()
    }

    pub async fn reload(&self, id: Uuid) -> Prospect {
        self.repos.prospects.get(id).await.unwrap().unwrap()
    }
}
