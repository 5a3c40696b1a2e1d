//! Persisted pipeline entities

use super::kinds::{
    ActivityType, EmailStatus, EventStatus, OrganizationType, PartnerStatus, PartnerType,
    PipelineStage, Sentiment,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A keyed record stored through a [`crate::repository::Repository`]
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Storage table (or collection) name
    const TABLE: &'static str;

    fn id(&self) -> Uuid;

    /// Audit timestamps for the record
    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;
}

/// Creator/updater bookkeeping carried by every entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            created_by: user_id,
            created_at: now,
            updated_by: user_id,
            updated_at: now,
        }
    }

    /// Record a modification by `user_id`
    pub fn touch(&mut self, user_id: Uuid) {
        self.updated_by = user_id;
        self.updated_at = Utc::now();
    }
}

/// Where an organization is located
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(city: &str, region: &str, country: &str) -> Self {
        Self {
            city: city.trim().to_string(),
            region: region.trim().to_string(),
            country: country.trim().to_string(),
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// `(latitude, longitude)` when both are known
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Case-insensitive equality of city, region, and country
    pub fn same_place(&self, city: &str, region: &str, country: &str) -> bool {
        eq_folded(&self.city, city)
            && eq_folded(&self.region, region)
            && eq_folded(&self.country, country)
    }
}

fn eq_folded(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Fit score breakdown (total is the sum of the four parts, 0-100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitScore {
    pub total: u32,
    pub type_score: u32,
    pub population_score: u32,
    pub density_score: u32,
    pub gap_score: u32,
}

impl FitScore {
    pub fn from_parts(
        type_score: u32,
        population_score: u32,
        density_score: u32,
        gap_score: u32,
    ) -> Self {
        let total = (type_score + population_score + density_score + gap_score).min(100);
        Self {
            total,
            type_score,
            population_score,
            density_score,
            gap_score,
        }
    }
}

/// How a prospect entered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProspectSource {
    Manual,
    AiDiscovery,
    CsvImport,
}

/// A candidate community partner organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: Uuid,
    pub name: String,
    pub organization_type: OrganizationType,
    pub location: Location,
    pub population: Option<u64>,
    pub pipeline_stage: PipelineStage,
    pub fit_score: FitScore,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub contact_title: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub source: ProspectSource,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub next_follow_up_at: Option<DateTime<Utc>>,
    /// Set only when the prospect is converted into a partner
    pub converted_partner_id: Option<Uuid>,
    pub audit: Audit,
}

impl Prospect {
    /// New prospect at stage `New` with an empty score
    pub fn new(
        name: &str,
        organization_type: OrganizationType,
        location: Location,
        source: ProspectSource,
        user_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            organization_type,
            location,
            population: None,
            pipeline_stage: PipelineStage::New,
            fit_score: FitScore::default(),
            contact_email: None,
            contact_name: None,
            contact_title: None,
            website: None,
            notes: None,
            source,
            last_contacted_at: None,
            next_follow_up_at: None,
            converted_partner_id: None,
            audit: Audit::new(user_id),
        }
    }

    /// Duplicate detection key: same name and place, ignoring case
    pub fn is_same_organization(
        &self,
        name: &str,
        city: &str,
        region: &str,
        country: &str,
    ) -> bool {
        eq_folded(&self.name, name) && self.location.same_place(city, region, country)
    }

    /// Usable contact email, if any
    pub fn contact_address(&self) -> Option<&str> {
        self.contact_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn is_converted(&self) -> bool {
        self.converted_partner_id.is_some()
    }
}

impl Entity for Prospect {
    const TABLE: &'static str = "prospects";

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// Append-only interaction log entry for a prospect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectActivity {
    pub id: Uuid,
    pub prospect_id: Uuid,
    pub activity_type: ActivityType,
    pub subject: String,
    pub details: String,
    /// Populated only for `Reply` activities
    pub sentiment: Option<Sentiment>,
    pub audit: Audit,
}

impl ProspectActivity {
    pub fn new(
        prospect_id: Uuid,
        activity_type: ActivityType,
        subject: &str,
        details: &str,
        user_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prospect_id,
            activity_type,
            subject: subject.to_string(),
            details: details.to_string(),
            sentiment: None,
            audit: Audit::new(user_id),
        }
    }
}

impl Entity for ProspectActivity {
    const TABLE: &'static str = "prospect_activities";

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// One email of a prospect's outreach cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachEmail {
    pub id: Uuid,
    pub prospect_id: Uuid,
    /// 1-4, contiguous per prospect
    pub cadence_step: u8,
    pub subject: String,
    pub html_body: String,
    pub recipient: String,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub test_mode: bool,
    pub tokens_used: u32,
    pub sent_at: DateTime<Utc>,
    pub audit: Audit,
}

impl Entity for OutreachEmail {
    const TABLE: &'static str = "outreach_emails";

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// An active community partner organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub partner_type: PartnerType,
    pub status: PartnerStatus,
    pub is_publicly_listed: bool,
    pub location: Location,
    pub website: Option<String>,
    pub primary_email: Option<String>,
    pub notes: Option<String>,
    pub audit: Audit,
}

impl Partner {
    /// Counts as coverage for geographic-gap purposes
    pub fn serves_public(&self) -> bool {
        self.status == PartnerStatus::Active && self.is_publicly_listed
    }
}

impl Entity for Partner {
    const TABLE: &'static str = "partners";

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// Grants a user administrative rights over a partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerAdmin {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub user_id: Uuid,
    pub audit: Audit,
}

impl Entity for PartnerAdmin {
    const TABLE: &'static str = "partner_admins";

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// A volunteer event hosted on the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub id: Uuid,
    pub name: String,
    pub status: EventStatus,
    pub location: Location,
    pub event_date: DateTime<Utc>,
    pub audit: Audit,
}

impl PlatformEvent {
    /// Cancelled events are ignored by density and gap calculations
    pub fn is_active(&self) -> bool {
        self.status != EventStatus::Cancelled
    }
}

impl Entity for PlatformEvent {
    const TABLE: &'static str = "events";

    fn id(&self) -> Uuid {
        self.id
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}
