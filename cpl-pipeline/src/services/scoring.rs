//! Prospect fit scoring and geographic-gap detection
//!
//! A fit score (0-100) is the sum of four bounded parts:
//!
//! | Part        | Max | Input                                            |
//! |-------------|-----|--------------------------------------------------|
//! | type        | 15  | organization type                                |
//! | population  | 25  | population bucket (unknown scores 10)            |
//! | density     | 30  | active events within [`NEARBY_RADIUS_MILES`]     |
//! | gap         | 30  | distance to nearest public, active partner       |
//!
//! Cancelled events and inactive or unlisted partners are ignored.

use chrono::Utc;
use cpl_common::events::{EventBus, PipelineEvent};
use cpl_common::geo;
use cpl_common::models::{FitScore, OrganizationType, Partner, PlatformEvent, Prospect};
use cpl_common::{Result, SharedRepository};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Events within this distance of a prospect count toward density
pub const NEARBY_RADIUS_MILES: f64 = 25.0;

/// A gap whose nearest partner is this close is already served
pub const SERVED_RADIUS_MILES: f64 = 10.0;

/// Gap score for a prospect whose coordinates are unknown
pub const UNKNOWN_LOCATION_GAP_SCORE: u32 = 15;

pub const MAX_DENSITY_SCORE: u32 = 30;
pub const MAX_GAP_SCORE: u32 = 30;

pub fn type_score(organization_type: &OrganizationType) -> u32 {
    match organization_type {
        OrganizationType::Municipality => 15,
        OrganizationType::Nonprofit => 12,
        OrganizationType::CivicOrg => 10,
        OrganizationType::Hoa => 8,
        OrganizationType::Other | OrganizationType::Unrecognized(_) => 5,
    }
}

pub fn population_score(population: Option<u64>) -> u32 {
    match population {
        None => 10,
        Some(p) if p < 10_000 => 5,
        Some(p) if p < 50_000 => 15,
        Some(p) if p < 200_000 => 20,
        Some(_) => 25,
    }
}

/// 1.5 points per nearby event, saturating at 20 events
pub fn density_score(nearby_events: usize) -> u32 {
    let points = nearby_events.saturating_mul(3) / 2;
    points.min(MAX_DENSITY_SCORE as usize) as u32
}

/// Score by distance to the nearest serving partner; `None` means no partner exists
pub fn gap_score(nearest_partner_miles: Option<f64>) -> u32 {
    match nearest_partner_miles {
        Some(d) if d <= SERVED_RADIUS_MILES => 0,
        Some(d) if d <= NEARBY_RADIUS_MILES => 10,
        Some(d) if d <= 50.0 => 20,
        _ => MAX_GAP_SCORE,
    }
}

/// A city with event activity but no nearby partner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographicGap {
    pub city: String,
    pub region: String,
    pub country: String,
    pub event_count: usize,
    /// `None` when no serving partner exists anywhere
    pub nearest_partner_miles: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Event and partner coordinates loaded once, for scoring many prospects
#[derive(Debug, Default)]
pub struct ScoringSnapshot {
    event_points: Vec<(f64, f64)>,
    partner_points: Vec<(f64, f64)>,
}

impl ScoringSnapshot {
    fn nearby_events(&self, (lat, lon): (f64, f64)) -> usize {
        self.event_points
            .iter()
            .filter(|(elat, elon)| {
                geo::distance_miles(lat, lon, *elat, *elon) <= NEARBY_RADIUS_MILES
            })
            .count()
    }

    fn nearest_partner(&self, (lat, lon): (f64, f64)) -> Option<f64> {
        self.partner_points
            .iter()
            .map(|(plat, plon)| geo::distance_miles(lat, lon, *plat, *plon))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn score(&self, prospect: &Prospect) -> FitScore {
        let (density, gap) = match prospect.location.coordinates() {
            Some(point) => (
                density_score(self.nearby_events(point)),
                gap_score(self.nearest_partner(point)),
            ),
            None => (0, UNKNOWN_LOCATION_GAP_SCORE),
        };

        FitScore::from_parts(
            type_score(&prospect.organization_type),
            population_score(prospect.population),
            density,
            gap,
        )
    }
}

/// Scoring engine over prospects, platform events, and partners
pub struct ScoringEngine {
    prospects: SharedRepository<Prospect>,
    events: SharedRepository<PlatformEvent>,
    partners: SharedRepository<Partner>,
    event_bus: EventBus,
}

impl ScoringEngine {
    pub fn new(
        prospects: SharedRepository<Prospect>,
        events: SharedRepository<PlatformEvent>,
        partners: SharedRepository<Partner>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            prospects,
            events,
            partners,
            event_bus,
        }
    }

    /// Snapshot of current events and partners for scoring many prospects
    pub async fn snapshot(&self) -> Result<ScoringSnapshot> {
        let event_points = self
            .events
            .query(&|e: &PlatformEvent| e.is_active())
            .await?
            .iter()
            .filter_map(|e| e.location.coordinates())
            .collect();

        let partner_points = self.serving_partners().await?;

        Ok(ScoringSnapshot {
            event_points,
            partner_points,
        })
    }

    async fn serving_partners(&self) -> Result<Vec<(f64, f64)>> {
        Ok(self
            .partners
            .query(&|p: &Partner| p.serves_public())
            .await?
            .iter()
            .filter_map(|p| p.location.coordinates())
            .collect())
    }

    /// Compute a prospect's breakdown without persisting it
    pub async fn score(&self, prospect: &Prospect) -> Result<FitScore> {
        Ok(self.snapshot().await?.score(prospect))
    }

    /// Recompute and store the score of one prospect
    ///
    /// Returns `Ok(None)` when the prospect id is unknown.
    pub async fn calculate_fit_score(&self, prospect_id: Uuid) -> Result<Option<FitScore>> {
        let Some(mut prospect) = self.prospects.get(prospect_id).await? else {
            debug!(%prospect_id, "Score requested for unknown prospect");
            return Ok(None);
        };

        let score = self.score(&prospect).await?;
        if prospect.fit_score != score {
            prospect.fit_score = score;
            self.prospects.update(prospect).await?;
        }

        self.event_bus.emit_lossy(PipelineEvent::ProspectScored {
            prospect_id,
            total: score.total,
            timestamp: Utc::now(),
        });

        Ok(Some(score))
    }

    /// Rescore every prospect, writing only those whose breakdown changed
    pub async fn recalculate_all_scores(&self, user_id: Uuid) -> Result<usize> {
        let snapshot = self.snapshot().await?;
        let prospects = self.prospects.all().await?;
        let total = prospects.len();

        let mut updated = 0;
        for mut prospect in prospects {
            let score = snapshot.score(&prospect);
            if prospect.fit_score == score {
                continue;
            }
            prospect.fit_score = score;
            prospect.audit.touch(user_id);
            self.prospects.update(prospect).await?;
            updated += 1;
        }

        info!(total, updated, "Recalculated prospect scores");
        Ok(updated)
    }

    /// Active events within [`NEARBY_RADIUS_MILES`] of the prospect
    pub async fn count_nearby_events(&self, prospect: &Prospect) -> Result<usize> {
        let Some(point) = prospect.location.coordinates() else {
            return Ok(0);
        };
        Ok(self.snapshot().await?.nearby_events(point))
    }

    /// Cities with active events and no serving partner within [`SERVED_RADIUS_MILES`]
    ///
    /// Ordered by event count (descending), then city.
    pub async fn get_geographic_gaps(&self) -> Result<Vec<GeographicGap>> {
        let events = self.events.query(&|e: &PlatformEvent| e.is_active()).await?;
        let partner_points = self.serving_partners().await?;
        let context = ScoringSnapshot {
            event_points: Vec::new(),
            partner_points,
        };

        // Keyed case-insensitively; the first spelling seen is reported
        let mut groups: BTreeMap<(String, String, String), (&PlatformEvent, Vec<(f64, f64)>)> =
            BTreeMap::new();
        for event in &events {
            let Some(point) = event.location.coordinates() else {
                continue;
            };
            let key = (
                event.location.city.trim().to_lowercase(),
                event.location.region.trim().to_lowercase(),
                event.location.country.trim().to_lowercase(),
            );
            groups.entry(key).or_insert_with(|| (event, Vec::new())).1.push(point);
        }

        let mut gaps: Vec<GeographicGap> = groups
            .into_values()
            .filter_map(|(first, points)| {
                let (latitude, longitude) = geo::centroid(&points)?;
                let nearest = context.nearest_partner((latitude, longitude));
                if nearest.is_some_and(|d| d <= SERVED_RADIUS_MILES) {
                    return None;
                }
                Some(GeographicGap {
                    city: first.location.city.clone(),
                    region: first.location.region.clone(),
                    country: first.location.country.clone(),
                    event_count: points.len(),
                    nearest_partner_miles: nearest,
                    latitude,
                    longitude,
                })
            })
            .collect();

        gaps.sort_by(|a, b| {
            b.event_count
                .cmp(&a.event_count)
                .then_with(|| a.city.cmp(&b.city))
        });

        debug!(gaps = gaps.len(), "Computed geographic gaps");
        Ok(gaps)
    }
}
