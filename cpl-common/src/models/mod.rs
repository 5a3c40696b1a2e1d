//! Pipeline domain model

mod entities;
mod kinds;

pub use entities::{
    Audit, Entity, FitScore, Location, OutreachEmail, Partner, PartnerAdmin, PlatformEvent,
    Prospect, ProspectActivity, ProspectSource,
};
pub use kinds::{
    ActivityType, EmailStatus, EventStatus, OrganizationType, PartnerStatus, PartnerType,
    PipelineStage, Sentiment,
};
