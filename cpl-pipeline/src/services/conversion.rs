//! Prospect to partner conversion
//!
//! Conversion creates the partner, registers the acting user as its admin,
//! then marks the prospect `Converted`. These are separate writes: a failure
//! after the partner is created leaves an orphan partner and an unconverted
//! prospect, which a retry will not detect.

use crate::clients::email::message_model;
use crate::clients::templates::{self, PARTNER_WELCOME};
use crate::clients::{EmailRecipient, EmailSender, PartnerManager, PlatformInfo};
use chrono::Utc;
use cpl_common::events::{EventBus, PipelineEvent};
use cpl_common::models::{
    ActivityType, Audit, Partner, PartnerStatus, PartnerType, PipelineStage, Prospect,
    ProspectActivity,
};
use cpl_common::{Result, SharedRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvertRequest {
    pub prospect_id: Uuid,
    /// Overrides the type derived from the organization type
    #[serde(default)]
    pub partner_type: Option<PartnerType>,
    #[serde(default)]
    pub send_welcome_email: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub success: bool,
    pub partner_id: Option<Uuid>,
    pub message: String,
}

impl ConversionResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            partner_id: None,
            message: message.into(),
        }
    }
}

pub struct ConversionEngine {
    prospects: SharedRepository<Prospect>,
    activities: SharedRepository<ProspectActivity>,
    partner_manager: Arc<dyn PartnerManager>,
    email: Arc<dyn EmailSender>,
    platform: PlatformInfo,
    event_bus: EventBus,
}

impl ConversionEngine {
    pub fn new(
        prospects: SharedRepository<Prospect>,
        activities: SharedRepository<ProspectActivity>,
        partner_manager: Arc<dyn PartnerManager>,
        email: Arc<dyn EmailSender>,
        platform: PlatformInfo,
        event_bus: EventBus,
    ) -> Self {
        Self {
            prospects,
            activities,
            partner_manager,
            email,
            platform,
            event_bus,
        }
    }

    pub async fn convert_to_partner(
        &self,
        request: &ConvertRequest,
        user_id: Uuid,
    ) -> Result<ConversionResult> {
        let Some(mut prospect) = self.prospects.get(request.prospect_id).await? else {
            return Ok(ConversionResult::failed("Prospect not found"));
        };

        if prospect.is_converted() {
            return Ok(ConversionResult::failed("Prospect has already been converted"));
        }

        let partner = Partner {
            id: Uuid::new_v4(),
            name: prospect.name.clone(),
            partner_type: request
                .partner_type
                .unwrap_or_else(|| PartnerType::for_organization(&prospect.organization_type)),
            status: PartnerStatus::Active,
            is_publicly_listed: true,
            location: prospect.location.clone(),
            website: prospect.website.clone(),
            primary_email: prospect.contact_address().map(str::to_string),
            notes: prospect.notes.clone(),
            audit: Audit::new(user_id),
        };

        let partner = self.partner_manager.create_partner(partner, user_id).await?;
        self.partner_manager.add_partner_admin(partner.id, user_id).await?;

        let old_stage = prospect.pipeline_stage;
        prospect.converted_partner_id = Some(partner.id);
        prospect.pipeline_stage = PipelineStage::Converted;
        prospect.next_follow_up_at = None;
        prospect.audit.touch(user_id);
        let prospect = self.prospects.update(prospect).await?;

        self.activities
            .add(ProspectActivity::new(
                prospect.id,
                ActivityType::StatusChange,
                "Converted to Partner",
                &format!("Converted to partner {} ({})", partner.name, partner.id),
                user_id,
            ))
            .await?;

        info!(
            prospect_id = %prospect.id,
            partner_id = %partner.id,
            "Prospect converted to partner"
        );

        let now = Utc::now();
        self.event_bus.emit_lossy(PipelineEvent::StageChanged {
            prospect_id: prospect.id,
            old_stage,
            new_stage: PipelineStage::Converted,
            timestamp: now,
        });
        self.event_bus.emit_lossy(PipelineEvent::ProspectConverted {
            prospect_id: prospect.id,
            partner_id: partner.id,
            timestamp: now,
        });

        if request.send_welcome_email {
            self.send_welcome(&prospect, &partner).await;
        }

        Ok(ConversionResult {
            success: true,
            partner_id: Some(partner.id),
            message: format!("{} is now a community partner", partner.name),
        })
    }

    /// Best effort; failures are logged and never undo the conversion
    async fn send_welcome(&self, prospect: &Prospect, partner: &Partner) {
        let Some(address) = partner.primary_email.as_deref() else {
            warn!(
                partner_id = %partner.id,
                "Welcome email requested but partner has no contact email"
            );
            return;
        };

        let template = match self.email.get_html_template(PARTNER_WELCOME).await {
            Ok(template) => template,
            Err(e) => {
                warn!(partner_id = %partner.id, "Welcome template unavailable: {}", e);
                return;
            }
        };

        let user_name = templates::escape_html(
            prospect.contact_name.as_deref().unwrap_or(partner.name.as_str()),
        );
        let community = templates::escape_html(&partner.name);
        let content = format!(
            "<p>Your partner page on {} is live. Visit <a href=\"{url}\">{url}</a> to manage it and connect with local volunteers.</p>",
            templates::escape_html(&self.platform.name),
            url = templates::escape_html(&self.platform.site_url)
        );
        let html = templates::render(
            &template,
            &[
                ("UserName", user_name.as_str()),
                ("CommunityName", community.as_str()),
                ("personalizedContent", content.as_str()),
            ],
        );
        let subject = format!("Welcome to {}, {}!", self.platform.name, partner.name);

        let recipients = [EmailRecipient::new(address, prospect.contact_name.as_deref())];
        match self
            .email
            .send_templated_email(
                &subject,
                PARTNER_WELCOME,
                "v1",
                &message_model(&subject, &html),
                &recipients,
            )
            .await
        {
            Ok(()) => info!(partner_id = %partner.id, "Welcome email sent"),
            Err(e) => warn!(partner_id = %partner.id, "Welcome email failed: {}", e),
        }
    }
}
