//! Outreach cadence engine
//!
//! Each prospect receives at most [`CADENCE_LENGTH`] emails, one per cadence
//! step, numbered `1..=4` without gaps. The next step is always one more
//! than the number of emails already recorded for the prospect, including
//! failed dispatches.
//!
//! Business-rule refusals are returned as [`SendOutcome::Rejected`]; only
//! repository failures and malformed caller input surface as `Err`.
//!
//! In test mode every email goes to the configured test recipient with a
//! `[TEST] ` subject prefix.

use super::scoring::ScoringEngine;
use super::Repositories;
use crate::clients::email::message_model;
use crate::clients::templates::{self, PROSPECT_OUTREACH};
use crate::clients::{ContentGenerator, EmailRecipient, EmailSender, OutreachContent};
use chrono::{Duration, Utc};
use cpl_common::events::{EventBus, PipelineEvent};
use cpl_common::models::{
    ActivityType, Audit, EmailStatus, OutreachEmail, PipelineStage, Prospect, ProspectActivity,
};
use cpl_common::settings::{self, Settings};
use cpl_common::{Error, Result, SharedRepository};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Emails per prospect cadence
pub const CADENCE_LENGTH: u8 = 4;

/// Largest accepted batch request
pub const MAX_BATCH_SIZE: usize = 50;

pub const TEST_SUBJECT_PREFIX: &str = "[TEST] ";

const TEMPLATE_VERSION: &str = "v1";

/// Outreach behaviour, read once at construction
#[derive(Debug, Clone, PartialEq)]
pub struct OutreachConfig {
    pub enabled: bool,
    pub test_mode: bool,
    pub test_recipient: String,
    pub max_daily: u32,
    pub max_followups_per_run: u32,
    pub followup_interval: Duration,
}

impl OutreachConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.get_bool(settings::OUTREACH_ENABLED, false),
            test_mode: settings.get_bool(settings::OUTREACH_TEST_MODE, true),
            test_recipient: settings
                .get_string(settings::OUTREACH_TEST_RECIPIENT, settings::DEFAULT_TEST_RECIPIENT),
            max_daily: settings.get_u32(settings::OUTREACH_MAX_DAILY, 10),
            max_followups_per_run: settings.get_u32(settings::OUTREACH_MAX_FOLLOWUPS_PER_RUN, 10),
            followup_interval: Duration::days(i64::from(
                settings.get_u32(settings::OUTREACH_FOLLOWUP_INTERVAL_DAYS, 7),
            )),
        }
    }
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::with_defaults())
    }
}

/// Why a send (or preview) was refused before dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutreachRejection {
    Disabled,
    NotFound,
    WrongStage,
    CadenceComplete,
    NoContactEmail,
    DailyLimitReached,
}

impl OutreachRejection {
    pub fn message(self) -> &'static str {
        match self {
            OutreachRejection::Disabled => "Outreach is disabled",
            OutreachRejection::NotFound => "Prospect not found",
            OutreachRejection::WrongStage => "Prospect has already been converted",
            OutreachRejection::CadenceComplete => {
                "Outreach cadence complete: all 4 emails have been sent"
            }
            OutreachRejection::NoContactEmail => "Prospect has no contact email",
            OutreachRejection::DailyLimitReached => "Daily outreach limit reached",
        }
    }
}

/// Result of one send attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent {
        outreach_email_id: Uuid,
        cadence_step: u8,
        recipient: String,
        test_mode: bool,
        tokens_used: u32,
    },
    Rejected(OutreachRejection),
    /// Dispatch failed; the email is recorded with status `Failed`
    Failed {
        outreach_email_id: Uuid,
        cadence_step: u8,
        error: String,
    },
}

impl SendOutcome {
    pub fn success(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    pub fn message(&self) -> String {
        match self {
            SendOutcome::Sent {
                cadence_step,
                recipient,
                ..
            } => format!("Cadence step {} sent to {}", cadence_step, recipient),
            SendOutcome::Rejected(reason) => reason.message().to_string(),
            SendOutcome::Failed { error, .. } => format!("Email dispatch failed: {}", error),
        }
    }
}

/// Rendered email for human review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutreachPreview {
    pub prospect_id: Uuid,
    pub cadence_step: u8,
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub test_mode: bool,
    pub tokens_used: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewOutcome {
    Ready(OutreachPreview),
    Rejected(OutreachRejection),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemResult {
    pub prospect_id: Uuid,
    pub success: bool,
    pub message: String,
}

/// Tally of a batch send
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutreachResult {
    pub requested: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub items: Vec<BatchItemResult>,
}

/// A prospect that passed the pre-dispatch checks
struct Eligible {
    prospect: Prospect,
    cadence_step: u8,
    recipient: String,
}

/// Generated and rendered email ready for dispatch
struct Draft {
    subject: String,
    html_body: String,
    content: OutreachContent,
}

pub struct OutreachEngine {
    config: OutreachConfig,
    prospects: SharedRepository<Prospect>,
    outreach_emails: SharedRepository<OutreachEmail>,
    activities: SharedRepository<ProspectActivity>,
    scoring: Arc<ScoringEngine>,
    content: Arc<dyn ContentGenerator>,
    email: Arc<dyn EmailSender>,
    event_bus: EventBus,
    /// Serializes cadence-step allocation per prospect
    step_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl OutreachEngine {
    pub fn new(
        config: OutreachConfig,
        repos: &Repositories,
        scoring: Arc<ScoringEngine>,
        content: Arc<dyn ContentGenerator>,
        email: Arc<dyn EmailSender>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            prospects: repos.prospects.clone(),
            outreach_emails: repos.outreach_emails.clone(),
            activities: repos.activities.clone(),
            scoring,
            content,
            email,
            event_bus,
            step_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OutreachConfig {
        &self.config
    }

    async fn step_lock(&self, prospect_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.step_locks.lock().await;
        locks.entry(prospect_id).or_default().clone()
    }

    /// Forget a prospect's lock once no other send is holding or awaiting it
    async fn release_step_lock(&self, prospect_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.step_locks.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(&prospect_id);
        }
    }

    async fn existing_emails(&self, prospect_id: Uuid) -> Result<Vec<OutreachEmail>> {
        self.outreach_emails
            .query(&|e: &OutreachEmail| e.prospect_id == prospect_id)
            .await
    }

    /// Prospect lookup, stage, cadence, and contact checks
    async fn check_eligible(
        &self,
        prospect_id: Uuid,
    ) -> Result<std::result::Result<Eligible, OutreachRejection>> {
        let Some(prospect) = self.prospects.get(prospect_id).await? else {
            return Ok(Err(OutreachRejection::NotFound));
        };

        if prospect.pipeline_stage == PipelineStage::Converted {
            return Ok(Err(OutreachRejection::WrongStage));
        }

        let sent = self.existing_emails(prospect_id).await?.len();
        if sent >= CADENCE_LENGTH as usize {
            return Ok(Err(OutreachRejection::CadenceComplete));
        }
        let cadence_step = sent as u8 + 1;

        let recipient = if self.config.test_mode {
            self.config.test_recipient.clone()
        } else {
            match prospect.contact_address() {
                Some(address) => address.to_string(),
                None => return Ok(Err(OutreachRejection::NoContactEmail)),
            }
        };

        Ok(Ok(Eligible {
            prospect,
            cadence_step,
            recipient,
        }))
    }

    async fn draft(&self, eligible: &Eligible) -> Result<Draft> {
        let prospect = &eligible.prospect;
        let nearby = self.scoring.count_nearby_events(prospect).await?;
        let content = self
            .content
            .generate_outreach_content(prospect, eligible.cadence_step, nearby)
            .await;

        let subject = if self.config.test_mode {
            format!("{}{}", TEST_SUBJECT_PREFIX, content.subject)
        } else {
            content.subject.clone()
        };

        let html_body = match self.email.get_html_template(PROSPECT_OUTREACH).await {
            Ok(template) => {
                let community = templates::escape_html(&prospect.name);
                let user = templates::escape_html(
                    prospect.contact_name.as_deref().unwrap_or(prospect.name.as_str()),
                );
                templates::render(
                    &template,
                    &[
                        ("personalizedContent", content.html_body.as_str()),
                        ("CommunityName", community.as_str()),
                        ("UserName", user.as_str()),
                    ],
                )
            }
            Err(e) => {
                warn!(
                    prospect_id = %prospect.id,
                    "Outreach template unavailable, sending bare content: {}", e
                );
                content.html_body.clone()
            }
        };

        Ok(Draft {
            subject,
            html_body,
            content,
        })
    }

    /// Emails counted against today's (UTC) limit
    async fn sent_today(&self) -> Result<usize> {
        let today = Utc::now().date_naive();
        Ok(self
            .outreach_emails
            .query(&|e: &OutreachEmail| {
                e.status != EmailStatus::Failed && e.sent_at.date_naive() == today
            })
            .await?
            .len())
    }

    /// Send the next cadence email to one prospect
    pub async fn send_outreach(&self, prospect_id: Uuid, user_id: Uuid) -> Result<SendOutcome> {
        if !self.config.enabled {
            debug!(%prospect_id, "Outreach disabled, not sending");
            return Ok(SendOutcome::Rejected(OutreachRejection::Disabled));
        }

        let lock = self.step_lock(prospect_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.send_locked(prospect_id, user_id).await
        };
        self.release_step_lock(prospect_id, lock).await;
        outcome
    }

    /// Body of `send_outreach`, run under the prospect's step lock
    async fn send_locked(&self, prospect_id: Uuid, user_id: Uuid) -> Result<SendOutcome> {
        let eligible = match self.check_eligible(prospect_id).await? {
            Ok(eligible) => eligible,
            Err(reason) => {
                debug!(%prospect_id, ?reason, "Outreach not sent");
                return Ok(SendOutcome::Rejected(reason));
            }
        };

        let sent_today = self.sent_today().await?;
        if sent_today >= self.config.max_daily as usize {
            info!(
                %prospect_id,
                sent_today,
                max_daily = self.config.max_daily,
                "Daily outreach limit reached"
            );
            return Ok(SendOutcome::Rejected(OutreachRejection::DailyLimitReached));
        }

        let draft = self.draft(&eligible).await?;
        let Eligible {
            mut prospect,
            cadence_step,
            recipient,
        } = eligible;

        let display_name = if self.config.test_mode {
            None
        } else {
            prospect.contact_name.as_deref()
        };
        let dispatch = self
            .email
            .send_templated_email(
                &draft.subject,
                PROSPECT_OUTREACH,
                TEMPLATE_VERSION,
                &message_model(&draft.subject, &draft.html_body),
                &[EmailRecipient::new(&recipient, display_name)],
            )
            .await;

        let now = Utc::now();
        let mut record = OutreachEmail {
            id: Uuid::new_v4(),
            prospect_id,
            cadence_step,
            subject: draft.subject,
            html_body: draft.html_body,
            recipient: recipient.clone(),
            status: EmailStatus::Sent,
            error_message: None,
            test_mode: self.config.test_mode,
            tokens_used: draft.content.tokens_used,
            sent_at: now,
            audit: Audit::new(user_id),
        };

        if let Err(e) = dispatch {
            let error = e.to_string();
            warn!(%prospect_id, cadence_step, "Outreach dispatch failed: {}", error);
            record.status = EmailStatus::Failed;
            record.error_message = Some(error.clone());
            let record = self.outreach_emails.add(record).await?;

            // The failed step was the last one, so nothing further is due
            if cadence_step == CADENCE_LENGTH && prospect.next_follow_up_at.is_some() {
                prospect.next_follow_up_at = None;
                prospect.audit.touch(user_id);
                self.prospects.update(prospect).await?;
            }

            self.event_bus.emit_lossy(PipelineEvent::OutreachFailed {
                prospect_id,
                cadence_step,
                error: error.clone(),
                timestamp: now,
            });
            return Ok(SendOutcome::Failed {
                outreach_email_id: record.id,
                cadence_step,
                error,
            });
        }

        let record = self.outreach_emails.add(record).await?;

        self.activities
            .add(ProspectActivity::new(
                prospect_id,
                ActivityType::EmailSent,
                &record.subject,
                &format!("Cadence step {} sent to {}", cadence_step, recipient),
                user_id,
            ))
            .await?;

        let old_stage = prospect.pipeline_stage;
        prospect.last_contacted_at = Some(now);
        prospect.next_follow_up_at =
            (cadence_step < CADENCE_LENGTH).then(|| now + self.config.followup_interval);
        if old_stage == PipelineStage::New {
            prospect.pipeline_stage = PipelineStage::Contacted;
        }
        prospect.audit.touch(user_id);
        let prospect = self.prospects.update(prospect).await?;

        info!(
            %prospect_id,
            cadence_step,
            test_mode = self.config.test_mode,
            tokens_used = record.tokens_used,
            "Outreach email sent"
        );

        if prospect.pipeline_stage != old_stage {
            self.event_bus.emit_lossy(PipelineEvent::StageChanged {
                prospect_id,
                old_stage,
                new_stage: prospect.pipeline_stage,
                timestamp: now,
            });
        }
        self.event_bus.emit_lossy(PipelineEvent::OutreachSent {
            prospect_id,
            outreach_email_id: record.id,
            cadence_step,
            test_mode: record.test_mode,
            timestamp: now,
        });

        Ok(SendOutcome::Sent {
            outreach_email_id: record.id,
            cadence_step,
            recipient,
            test_mode: record.test_mode,
            tokens_used: record.tokens_used,
        })
    }

    /// The email `send_outreach` would send next, without sending or storing it
    pub async fn preview_outreach(&self, prospect_id: Uuid) -> Result<PreviewOutcome> {
        if !self.config.enabled {
            return Ok(PreviewOutcome::Rejected(OutreachRejection::Disabled));
        }

        let eligible = match self.check_eligible(prospect_id).await? {
            Ok(eligible) => eligible,
            Err(reason) => return Ok(PreviewOutcome::Rejected(reason)),
        };
        let draft = self.draft(&eligible).await?;

        Ok(PreviewOutcome::Ready(OutreachPreview {
            prospect_id,
            cadence_step: eligible.cadence_step,
            recipient: eligible.recipient,
            subject: draft.subject,
            html_body: draft.html_body,
            test_mode: self.config.test_mode,
            tokens_used: draft.content.tokens_used,
        }))
    }

    /// Send to each prospect in turn
    ///
    /// `Error::InvalidInput` for an empty list or more than [`MAX_BATCH_SIZE`]
    /// ids. Per-prospect problems are tallied and never stop the batch.
    pub async fn send_batch_outreach(
        &self,
        prospect_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<BatchOutreachResult> {
        if prospect_ids.is_empty() {
            return Err(Error::InvalidInput(
                "Batch outreach requires at least one prospect id".to_string(),
            ));
        }
        if prospect_ids.len() > MAX_BATCH_SIZE {
            return Err(Error::InvalidInput(format!(
                "Batch of {} prospects exceeds the maximum of {}",
                prospect_ids.len(),
                MAX_BATCH_SIZE
            )));
        }

        let mut result = BatchOutreachResult {
            requested: prospect_ids.len(),
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for &prospect_id in prospect_ids {
            if !seen.insert(prospect_id) {
                result.skipped += 1;
                result.items.push(BatchItemResult {
                    prospect_id,
                    success: false,
                    message: "Duplicate prospect id in batch".to_string(),
                });
                continue;
            }

            let (success, message) = match self.send_outreach(prospect_id, user_id).await {
                Ok(outcome @ SendOutcome::Sent { .. }) => {
                    result.sent += 1;
                    (true, outcome.message())
                }
                Ok(outcome @ SendOutcome::Rejected(_)) => {
                    result.skipped += 1;
                    (false, outcome.message())
                }
                Ok(outcome @ SendOutcome::Failed { .. }) => {
                    result.failed += 1;
                    (false, outcome.message())
                }
                Err(e) => {
                    warn!(%prospect_id, "Batch outreach item failed: {}", e);
                    result.failed += 1;
                    (false, e.to_string())
                }
            };
            result.items.push(BatchItemResult {
                prospect_id,
                success,
                message,
            });
        }

        info!(
            requested = result.requested,
            sent = result.sent,
            failed = result.failed,
            skipped = result.skipped,
            "Batch outreach complete"
        );
        Ok(result)
    }

    /// Send the next step to prospects whose follow-up is due
    ///
    /// At most `max_followups_per_run` prospects are attempted, earliest due
    /// first. A prospect whose cadence is already complete has its follow-up
    /// cleared and does not count as an attempt. Returns the number of emails
    /// actually sent.
    pub async fn process_due_followups(&self) -> Result<usize> {
        if !self.config.enabled {
            debug!("Outreach disabled, skipping follow-ups");
            return Ok(0);
        }

        let now = Utc::now();
        let mut due = self
            .prospects
            .query(&|p: &Prospect| {
                !p.pipeline_stage.is_terminal() && p.next_follow_up_at.is_some_and(|at| at <= now)
            })
            .await?;
        due.sort_by_key(|p| p.next_follow_up_at);
        let due_count = due.len();

        let max_attempts = self.config.max_followups_per_run as usize;
        let mut attempted = 0;
        let mut sent = 0;
        for prospect in &due {
            if attempted >= max_attempts {
                break;
            }
            match self.send_outreach(prospect.id, Uuid::nil()).await {
                Ok(SendOutcome::Rejected(OutreachRejection::CadenceComplete)) => {
                    if let Err(e) = self.clear_follow_up(prospect.id).await {
                        warn!(prospect_id = %prospect.id, "Could not clear stale follow-up: {}", e);
                    }
                    continue;
                }
                Ok(outcome) if outcome.success() => sent += 1,
                Ok(outcome) => {
                    debug!(prospect_id = %prospect.id, "Follow-up not sent: {}", outcome.message())
                }
                Err(e) => warn!(prospect_id = %prospect.id, "Follow-up failed: {}", e),
            }
            attempted += 1;
        }

        info!(due = due_count, sent, "Processed due follow-ups");
        self.event_bus.emit_lossy(PipelineEvent::FollowUpsProcessed {
            due: due_count,
            sent,
            timestamp: Utc::now(),
        });
        Ok(sent)
    }

    /// Remove the follow-up date from a prospect with nothing left to send
    async fn clear_follow_up(&self, prospect_id: Uuid) -> Result<()> {
        let lock = self.step_lock(prospect_id).await;
        let cleared = {
            let _guard = lock.lock().await;
            match self.prospects.get(prospect_id).await {
                Ok(Some(mut prospect)) if prospect.next_follow_up_at.is_some() => {
                    prospect.next_follow_up_at = None;
                    prospect.audit.touch(Uuid::nil());
                    self.prospects.update(prospect).await.map(|_| ())
                }
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        };
        self.release_step_lock(prospect_id, lock).await;
        if cleared.is_ok() {
            debug!(%prospect_id, "Cleared follow-up for completed cadence");
        }
        cleared
    }

    /// Apply a delivery-status update (e.g. from a mail-provider webhook)
    ///
    /// Updates that would move the status backward are ignored. An unknown
    /// email id is `Error::InvalidInput`.
    pub async fn record_delivery_status(
        &self,
        email_id: Uuid,
        status: EmailStatus,
    ) -> Result<OutreachEmail> {
        let mut email = self
            .outreach_emails
            .get(email_id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("Unknown outreach email {}", email_id)))?;

        if !email.status.can_advance_to(status) {
            debug!(
                %email_id,
                current = ?email.status,
                ignored = ?status,
                "Delivery status not advanced"
            );
            return Ok(email);
        }

        email.status = status;
        email.audit.touch(Uuid::nil());
        self.outreach_emails.update(email).await
    }

    /// A prospect's outreach emails ordered by cadence step
    pub async fn list_outreach_history(&self, prospect_id: Uuid) -> Result<Vec<OutreachEmail>> {
        let mut emails = self.existing_emails(prospect_id).await?;
        emails.sort_by_key(|e| e.cadence_step);
        Ok(emails)
    }
}
