//! Prospect activity log and reply-driven stage advancement
//!
//! Replies are classified by the sentiment analyzer and move the prospect
//! forward, never backward:
//! - `Contacted` + any reply => `Responded`
//! - `Responded` + positive reply => `Interested`
//!
//! Both rules apply in sequence, so a positive reply at `Contacted` lands on
//! `Interested`. The activity, the prospect update, and the status-change
//! entry are separate writes; a failure between them is not rolled back.

use crate::clients::SentimentAnalyzer;
use chrono::Utc;
use cpl_common::events::{EventBus, PipelineEvent};
use cpl_common::models::{ActivityType, Audit, PipelineStage, Prospect, ProspectActivity, Sentiment};
use cpl_common::{Error, Result, SharedRepository};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Stage after a reply with `sentiment` arrives at `stage`
pub fn stage_after_reply(stage: PipelineStage, sentiment: Sentiment) -> PipelineStage {
    let mut next = stage;
    if next == PipelineStage::Contacted {
        next = PipelineStage::Responded;
    }
    if next == PipelineStage::Responded && sentiment == Sentiment::Positive {
        next = PipelineStage::Interested;
    }
    next
}

pub struct ActivityEngine {
    prospects: SharedRepository<Prospect>,
    activities: SharedRepository<ProspectActivity>,
    sentiment: Arc<dyn SentimentAnalyzer>,
    event_bus: EventBus,
}

impl ActivityEngine {
    pub fn new(
        prospects: SharedRepository<Prospect>,
        activities: SharedRepository<ProspectActivity>,
        sentiment: Arc<dyn SentimentAnalyzer>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            prospects,
            activities,
            sentiment,
            event_bus,
        }
    }

    /// Record an activity; replies are classified and may advance the stage
    ///
    /// `Error::NotFound` if the owning prospect does not exist.
    pub async fn add_activity(
        &self,
        mut activity: ProspectActivity,
        user_id: Uuid,
    ) -> Result<ProspectActivity> {
        let prospect = self
            .prospects
            .get(activity.prospect_id)
            .await?
            .ok_or_else(|| Error::not_found("prospect", activity.prospect_id))?;

        activity.id = Uuid::new_v4();
        activity.audit = Audit::new(user_id);
        activity.sentiment = None;

        if activity.activity_type != ActivityType::Reply {
            return self.activities.add(activity).await;
        }

        let text = if activity.details.trim().is_empty() {
            activity.subject.as_str()
        } else {
            activity.details.as_str()
        };
        let sentiment = self.sentiment.analyze_sentiment(text).await;
        activity.sentiment = Some(sentiment);
        let activity = self.activities.add(activity).await?;

        debug!(prospect_id = %prospect.id, sentiment = sentiment.as_str(), "Reply recorded");

        let new_stage = stage_after_reply(prospect.pipeline_stage, sentiment);
        if new_stage != prospect.pipeline_stage {
            self.change_stage(prospect, new_stage, user_id).await?;
        }

        Ok(activity)
    }

    async fn change_stage(
        &self,
        mut prospect: Prospect,
        new_stage: PipelineStage,
        user_id: Uuid,
    ) -> Result<()> {
        let old_stage = prospect.pipeline_stage;
        prospect.pipeline_stage = new_stage;
        prospect.audit.touch(user_id);
        let prospect = self.prospects.update(prospect).await?;

        self.activities
            .add(ProspectActivity::new(
                prospect.id,
                ActivityType::StatusChange,
                "Stage changed",
                &format!("{} -> {}", old_stage, new_stage),
                user_id,
            ))
            .await?;

        info!(
            prospect_id = %prospect.id,
            %old_stage,
            %new_stage,
            "Pipeline stage advanced by reply"
        );
        self.event_bus.emit_lossy(PipelineEvent::StageChanged {
            prospect_id: prospect.id,
            old_stage,
            new_stage,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// A prospect's activities, newest first
    pub async fn list_activities(&self, prospect_id: Uuid) -> Result<Vec<ProspectActivity>> {
        let mut activities = self
            .activities
            .query(&|a: &ProspectActivity| a.prospect_id == prospect_id)
            .await?;
        // Ties keep the later insertion first
        activities.reverse();
        activities.sort_by(|a, b| b.audit.created_at.cmp(&a.audit.created_at));
        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_at_contacted_always_responds() {
        assert_eq!(
            stage_after_reply(PipelineStage::Contacted, Sentiment::Negative),
            PipelineStage::Responded
        );
        assert_eq!(
            stage_after_reply(PipelineStage::Contacted, Sentiment::Neutral),
            PipelineStage::Responded
        );
    }

    #[test]
    fn test_positive_reply_at_responded_is_interest() {
        assert_eq!(
            stage_after_reply(PipelineStage::Responded, Sentiment::Positive),
            PipelineStage::Interested
        );
        assert_eq!(
            stage_after_reply(PipelineStage::Responded, Sentiment::Negative),
            PipelineStage::Responded
        );
    }

    #[test]
    fn test_reply_elsewhere_never_moves_stage() {
        for stage in [
            PipelineStage::New,
            PipelineStage::Interested,
            PipelineStage::Onboarding,
            PipelineStage::Converted,
            PipelineStage::Declined,
        ] {
            assert_eq!(stage_after_reply(stage, Sentiment::Positive), stage);
        }
    }
}
