//! Pipeline engines
//!
//! Leaves first: scoring feeds import; activity drives the stage consumed by
//! outreach and conversion; analytics reads snapshots independently.

pub mod activity;
pub mod analytics;
pub mod conversion;
pub mod csv_import;
pub mod outreach;
pub mod scoring;

pub use activity::ActivityEngine;
pub use analytics::{AnalyticsEngine, PipelineAnalytics};
pub use conversion::{ConversionEngine, ConversionResult, ConvertRequest};
pub use csv_import::{CsvImporter, ImportResult};
pub use outreach::{OutreachConfig, OutreachEngine, OutreachRejection, PreviewOutcome, SendOutcome};
pub use scoring::{GeographicGap, ScoringEngine};

use crate::clients::{
    ContentGenerator, EmailSender, PartnerManager, PlatformInfo, SentimentAnalyzer,
};
use cpl_common::events::EventBus;
use cpl_common::models::{
    OutreachEmail, Partner, PartnerAdmin, PlatformEvent, Prospect, ProspectActivity,
};
use cpl_common::{InMemoryRepository, SharedRepository};
use std::sync::Arc;

/// One repository per entity type
#[derive(Clone)]
pub struct Repositories {
    pub prospects: SharedRepository<Prospect>,
    pub activities: SharedRepository<ProspectActivity>,
    pub outreach_emails: SharedRepository<OutreachEmail>,
    pub partners: SharedRepository<Partner>,
    pub partner_admins: SharedRepository<PartnerAdmin>,
    pub events: SharedRepository<PlatformEvent>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            prospects: Arc::new(InMemoryRepository::<Prospect>::new()),
            activities: Arc::new(InMemoryRepository::<ProspectActivity>::new()),
            outreach_emails: Arc::new(InMemoryRepository::<OutreachEmail>::new()),
            partners: Arc::new(InMemoryRepository::<Partner>::new()),
            partner_admins: Arc::new(InMemoryRepository::<PartnerAdmin>::new()),
            events: Arc::new(InMemoryRepository::<PlatformEvent>::new()),
        }
    }

    pub fn sqlite(pool: sqlx::SqlitePool) -> Self {
        use cpl_common::db::SqliteRepository;
        Self {
            prospects: Arc::new(SqliteRepository::<Prospect>::new(pool.clone())),
            activities: Arc::new(SqliteRepository::<ProspectActivity>::new(pool.clone())),
            outreach_emails: Arc::new(SqliteRepository::<OutreachEmail>::new(pool.clone())),
            partners: Arc::new(SqliteRepository::<Partner>::new(pool.clone())),
            partner_admins: Arc::new(SqliteRepository::<PartnerAdmin>::new(pool.clone())),
            events: Arc::new(SqliteRepository::<PlatformEvent>::new(pool)),
        }
    }
}

/// External collaborators injected into the engines
#[derive(Clone)]
pub struct Clients {
    pub content: Arc<dyn ContentGenerator>,
    pub sentiment: Arc<dyn SentimentAnalyzer>,
    pub email: Arc<dyn EmailSender>,
    pub partner_manager: Arc<dyn PartnerManager>,
    pub platform: PlatformInfo,
}

/// All engines wired over one set of repositories
pub struct Services {
    pub repos: Repositories,
    pub scoring: Arc<ScoringEngine>,
    pub importer: CsvImporter,
    pub activity: ActivityEngine,
    pub outreach: OutreachEngine,
    pub conversion: ConversionEngine,
    pub analytics: AnalyticsEngine,
}

impl Services {
    pub fn new(
        repos: Repositories,
        clients: Clients,
        outreach_config: OutreachConfig,
        event_bus: EventBus,
    ) -> Self {
        let scoring = Arc::new(ScoringEngine::new(
            repos.prospects.clone(),
            repos.events.clone(),
            repos.partners.clone(),
            event_bus.clone(),
        ));

        let importer =
            CsvImporter::new(repos.prospects.clone(), scoring.clone(), event_bus.clone());

        let activity = ActivityEngine::new(
            repos.prospects.clone(),
            repos.activities.clone(),
            clients.sentiment,
            event_bus.clone(),
        );

        let outreach = OutreachEngine::new(
            outreach_config,
            &repos,
            scoring.clone(),
            clients.content,
            clients.email.clone(),
            event_bus.clone(),
        );

        let conversion = ConversionEngine::new(
            repos.prospects.clone(),
            repos.activities.clone(),
            clients.partner_manager,
            clients.email,
            clients.platform,
            event_bus,
        );

        let analytics =
            AnalyticsEngine::new(repos.prospects.clone(), repos.outreach_emails.clone());

        Self {
            repos,
            scoring,
            importer,
            activity,
            outreach,
            conversion,
            analytics,
        }
    }
}
