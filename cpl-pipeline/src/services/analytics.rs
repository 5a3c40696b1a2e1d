//! Pipeline analytics
//!
//! Reads a snapshot of all prospects and outreach emails and aggregates
//! stage, funnel, conversion, and per-type statistics. Percentages are
//! rounded to one decimal place and are 0 whenever the denominator is 0.

use cpl_common::models::{EmailStatus, OutreachEmail, PipelineStage, Prospect};
use cpl_common::{Result, SharedRepository};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: PipelineStage,
    pub count: usize,
}

/// Cumulative outreach funnel
///
/// An opened email also counts as sent, a clicked one as opened and sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutreachFunnel {
    pub total_emails: usize,
    pub sent: usize,
    pub opened: usize,
    pub clicked: usize,
    pub bounced: usize,
    pub failed: usize,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeBreakdown {
    pub organization_type: String,
    pub count: usize,
    pub converted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineAnalytics {
    pub total_prospects: usize,
    /// Every canonical stage, in funnel order
    pub stage_counts: Vec<StageCount>,
    pub outreach: OutreachFunnel,
    pub converted_count: usize,
    pub conversion_rate: f64,
    /// Mean days from creation to last update, converted prospects only
    pub average_days_in_pipeline: f64,
    pub type_breakdown: Vec<TypeBreakdown>,
}

/// `numerator / denominator` as a percentage with one decimal
pub fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round1(numerator as f64 * 100.0 / denominator as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn outreach_funnel(emails: &[OutreachEmail]) -> OutreachFunnel {
    let count = |f: fn(EmailStatus) -> bool| emails.iter().filter(|e| f(e.status)).count();

    let sent = count(EmailStatus::reached_recipient);
    let opened = count(EmailStatus::is_opened);
    let clicked = count(|s| s == EmailStatus::Clicked);
    let bounced = count(|s| s == EmailStatus::Bounced);
    let failed = count(|s| s == EmailStatus::Failed);

    OutreachFunnel {
        total_emails: emails.len(),
        sent,
        opened,
        clicked,
        bounced,
        failed,
        open_rate: percentage(opened, sent),
        click_rate: percentage(clicked, sent),
        bounce_rate: percentage(bounced, sent),
    }
}

pub fn summarize(prospects: &[Prospect], emails: &[OutreachEmail]) -> PipelineAnalytics {
    let stage_counts = PipelineStage::ALL
        .iter()
        .map(|&stage| StageCount {
            stage,
            count: prospects.iter().filter(|p| p.pipeline_stage == stage).count(),
        })
        .collect();

    let converted: Vec<&Prospect> = prospects.iter().filter(|p| p.is_converted()).collect();
    let average_days_in_pipeline = if converted.is_empty() {
        0.0
    } else {
        let total_days: f64 = converted
            .iter()
            .map(|p| (p.audit.updated_at - p.audit.created_at).num_seconds() as f64 / 86_400.0)
            .sum();
        round1(total_days / converted.len() as f64)
    };

    let mut by_type: HashMap<String, (usize, usize)> = HashMap::new();
    for prospect in prospects {
        let entry = by_type
            .entry(prospect.organization_type.label().to_string())
            .or_default();
        entry.0 += 1;
        if prospect.is_converted() {
            entry.1 += 1;
        }
    }
    let mut type_breakdown: Vec<TypeBreakdown> = by_type
        .into_iter()
        .map(|(organization_type, (count, converted))| TypeBreakdown {
            organization_type,
            count,
            converted,
        })
        .collect();
    type_breakdown.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.organization_type.cmp(&b.organization_type))
    });

    PipelineAnalytics {
        total_prospects: prospects.len(),
        stage_counts,
        outreach: outreach_funnel(emails),
        converted_count: converted.len(),
        conversion_rate: percentage(converted.len(), prospects.len()),
        average_days_in_pipeline,
        type_breakdown,
    }
}

pub struct AnalyticsEngine {
    prospects: SharedRepository<Prospect>,
    outreach_emails: SharedRepository<OutreachEmail>,
}

impl AnalyticsEngine {
    pub fn new(
        prospects: SharedRepository<Prospect>,
        outreach_emails: SharedRepository<OutreachEmail>,
    ) -> Self {
        Self {
            prospects,
            outreach_emails,
        }
    }

    pub async fn get_analytics(&self) -> Result<PipelineAnalytics> {
        let prospects = self.prospects.all().await?;
        let emails = self.outreach_emails.all().await?;
        debug!(
            prospects = prospects.len(),
            emails = emails.len(),
            "Aggregating pipeline analytics"
        );
        Ok(summarize(&prospects, &emails))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_zero_denominator() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(4, 4), 100.0);
    }

    #[test]
    fn test_empty_pipeline() {
        let analytics = summarize(&[], &[]);
        assert_eq!(analytics.total_prospects, 0);
        assert_eq!(analytics.stage_counts.len(), PipelineStage::ALL.len());
        assert!(analytics.stage_counts.iter().all(|s| s.count == 0));
        assert_eq!(analytics.conversion_rate, 0.0);
        assert_eq!(analytics.average_days_in_pipeline, 0.0);
        assert_eq!(analytics.outreach, OutreachFunnel::default());
    }
}
