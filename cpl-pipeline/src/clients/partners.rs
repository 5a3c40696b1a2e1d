//! Partner and partner-admin management used at the conversion boundary

use async_trait::async_trait;
use cpl_common::models::{Audit, Partner, PartnerAdmin};
use cpl_common::{Result, SharedRepository};
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait PartnerManager: Send + Sync {
    /// Persist a new partner organization
    async fn create_partner(&self, partner: Partner, user_id: Uuid) -> Result<Partner>;

    /// Grant `user_id` administrative rights over `partner_id`
    async fn add_partner_admin(&self, partner_id: Uuid, user_id: Uuid) -> Result<PartnerAdmin>;
}

/// [`PartnerManager`] over the partner and partner-admin repositories
pub struct RepositoryPartnerManager {
    partners: SharedRepository<Partner>,
    partner_admins: SharedRepository<PartnerAdmin>,
}

impl RepositoryPartnerManager {
    pub fn new(
        partners: SharedRepository<Partner>,
        partner_admins: SharedRepository<PartnerAdmin>,
    ) -> Self {
        Self {
            partners,
            partner_admins,
        }
    }
}

#[async_trait]
impl PartnerManager for RepositoryPartnerManager {
    async fn create_partner(&self, mut partner: Partner, user_id: Uuid) -> Result<Partner> {
        partner.audit = Audit::new(user_id);
        let partner = self.partners.add(partner).await?;
        info!(partner_id = %partner.id, name = %partner.name, "Partner created");
        Ok(partner)
    }

    async fn add_partner_admin(&self, partner_id: Uuid, user_id: Uuid) -> Result<PartnerAdmin> {
        let existing = self
            .partner_admins
            .query(&|admin: &PartnerAdmin| {
                admin.partner_id == partner_id && admin.user_id == user_id
            })
            .await?;
        if let Some(admin) = existing.into_iter().next() {
            return Ok(admin);
        }

        self.partner_admins
            .add(PartnerAdmin {
                id: Uuid::new_v4(),
                partner_id,
                user_id,
                audit: Audit::new(user_id),
            })
            .await
    }
}
