//! Pipeline events and the broadcast EventBus
//!
//! Engines emit events as side information; nothing depends on them being
//! received. The HTTP service forwards them to Server-Sent Event clients.

use crate::models::PipelineStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A CSV import finished
    ProspectsImported {
        created: usize,
        skipped_duplicates: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },

    /// A prospect's fit score was (re)computed
    ProspectScored {
        prospect_id: Uuid,
        total: u32,
        timestamp: DateTime<Utc>,
    },

    /// A prospect moved to a new pipeline stage
    StageChanged {
        prospect_id: Uuid,
        old_stage: PipelineStage,
        new_stage: PipelineStage,
        timestamp: DateTime<Utc>,
    },

    /// An outreach email was dispatched
    OutreachSent {
        prospect_id: Uuid,
        outreach_email_id: Uuid,
        cadence_step: u8,
        test_mode: bool,
        timestamp: DateTime<Utc>,
    },

    /// Email dispatch failed
    OutreachFailed {
        prospect_id: Uuid,
        cadence_step: u8,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A prospect became a partner
    ProspectConverted {
        prospect_id: Uuid,
        partner_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A scheduled follow-up run completed
    FollowUpsProcessed {
        due: usize,
        sent: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Event type name, as used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::ProspectsImported { .. } => "ProspectsImported",
            PipelineEvent::ProspectScored { .. } => "ProspectScored",
            PipelineEvent::StageChanged { .. } => "StageChanged",
            PipelineEvent::OutreachSent { .. } => "OutreachSent",
            PipelineEvent::OutreachFailed { .. } => "OutreachFailed",
            PipelineEvent::ProspectConverted { .. } => "ProspectConverted",
            PipelineEvent::FollowUpsProcessed { .. } => "FollowUpsProcessed",
        }
    }
}

/// Broadcast bus for [`PipelineEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let prospect_id = Uuid::new_v4();
        bus.emit(PipelineEvent::StageChanged {
            prospect_id,
            old_stage: PipelineStage::Contacted,
            new_stage: PipelineStage::Responded,
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            PipelineEvent::StageChanged { prospect_id: id, new_stage, .. } => {
                assert_eq!(id, prospect_id);
                assert_eq!(new_stage, PipelineStage::Responded);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let event = PipelineEvent::FollowUpsProcessed {
            due: 0,
            sent: 0,
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_serialized_event_is_tagged() {
        let event = PipelineEvent::ProspectScored {
            prospect_id: Uuid::nil(),
            total: 72,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ProspectScored");
        assert_eq!(json["total"], 72);
        assert_eq!(event.event_type(), "ProspectScored");
    }
}
