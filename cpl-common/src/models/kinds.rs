//! Closed status, stage, and type enumerations
//!
//! Every field the pipeline branches on is a tagged variant rather than a raw
//! ordinal or string. Text conversions exist only at the edges (CSV import,
//! HTTP query strings, classifier output).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a prospect in the outreach funnel
///
/// Ordered: `New < Contacted < Responded < Interested < Onboarding < Converted`.
/// `Declined` sorts last and, like `Converted`, is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    New,
    Contacted,
    Responded,
    Interested,
    Onboarding,
    Converted,
    Declined,
}

impl PipelineStage {
    /// Canonical stage list, in funnel order
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::New,
        PipelineStage::Contacted,
        PipelineStage::Responded,
        PipelineStage::Interested,
        PipelineStage::Onboarding,
        PipelineStage::Converted,
        PipelineStage::Declined,
    ];

    pub fn ordinal(self) -> u8 {
        match self {
            PipelineStage::New => 0,
            PipelineStage::Contacted => 1,
            PipelineStage::Responded => 2,
            PipelineStage::Interested => 3,
            PipelineStage::Onboarding => 4,
            PipelineStage::Converted => 5,
            PipelineStage::Declined => 6,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::New => "New",
            PipelineStage::Contacted => "Contacted",
            PipelineStage::Responded => "Responded",
            PipelineStage::Interested => "Interested",
            PipelineStage::Onboarding => "Onboarding",
            PipelineStage::Converted => "Converted",
            PipelineStage::Declined => "Declined",
        }
    }

    /// Terminal stages receive no further automated outreach
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Converted | PipelineStage::Declined)
    }

    /// Parse a stage from its name or ordinal (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if let Ok(ordinal) = trimmed.parse::<u8>() {
            return Self::from_ordinal(ordinal);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of organization a prospect represents
///
/// Text that matches none of the known kinds is kept verbatim in
/// `Unrecognized` so imports never lose information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrganizationType {
    Municipality,
    Nonprofit,
    CivicOrg,
    Hoa,
    Other,
    Unrecognized(String),
}

impl OrganizationType {
    /// Parse organization type text leniently (case, spaces, dashes ignored)
    pub fn parse(value: &str) -> Self {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "municipality" | "city" | "town" | "county" => OrganizationType::Municipality,
            "nonprofit" | "npo" => OrganizationType::Nonprofit,
            "civicorg" | "civicorganization" | "civic" => OrganizationType::CivicOrg,
            "hoa" | "homeownersassociation" => OrganizationType::Hoa,
            "other" => OrganizationType::Other,
            _ => OrganizationType::Unrecognized(value.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            OrganizationType::Municipality => "Municipality",
            OrganizationType::Nonprofit => "Nonprofit",
            OrganizationType::CivicOrg => "CivicOrg",
            OrganizationType::Hoa => "HOA",
            OrganizationType::Other => "Other",
            OrganizationType::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl From<String> for OrganizationType {
    fn from(value: String) -> Self {
        OrganizationType::parse(&value)
    }
}

impl From<OrganizationType> for String {
    fn from(value: OrganizationType) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for OrganizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of prospect interaction recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Note,
    Reply,
    EmailSent,
    StatusChange,
    Call,
    Meeting,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Note => "Note",
            ActivityType::Reply => "Reply",
            ActivityType::EmailSent => "EmailSent",
            ActivityType::StatusChange => "StatusChange",
            ActivityType::Call => "Call",
            ActivityType::Meeting => "Meeting",
        }
    }
}

/// Coarse tone classification of an inbound reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Interpret classifier output; anything unrecognized is `Neutral`
    pub fn parse_lenient(value: &str) -> Self {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered.starts_with("positive") {
            Sentiment::Positive
        } else if lowered.starts_with("negative") {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }
}

/// Delivery status of an outreach email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailStatus {
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Failed,
}

impl EmailStatus {
    /// Position in the engagement funnel; `None` for terminal failures
    pub fn funnel_rank(self) -> Option<u8> {
        match self {
            EmailStatus::Sent => Some(0),
            EmailStatus::Delivered => Some(1),
            EmailStatus::Opened => Some(2),
            EmailStatus::Clicked => Some(3),
            EmailStatus::Bounced | EmailStatus::Failed => None,
        }
    }

    /// Counted as "sent" by analytics
    pub fn reached_recipient(self) -> bool {
        self.funnel_rank().is_some()
    }

    pub fn is_opened(self) -> bool {
        matches!(self, EmailStatus::Opened | EmailStatus::Clicked)
    }

    /// Whether a delivery update from `self` to `next` moves forward
    ///
    /// Failure states are final. From a funnel state, any strictly later
    /// funnel state or a bounce is accepted.
    pub fn can_advance_to(self, next: EmailStatus) -> bool {
        match (self.funnel_rank(), next) {
            (None, _) => false,
            (Some(_), EmailStatus::Bounced) => true,
            (Some(current), _) => next.funnel_rank().is_some_and(|rank| rank > current),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sent" => Some(EmailStatus::Sent),
            "delivered" => Some(EmailStatus::Delivered),
            "opened" | "open" => Some(EmailStatus::Opened),
            "clicked" | "click" => Some(EmailStatus::Clicked),
            "bounced" | "bounce" => Some(EmailStatus::Bounced),
            "failed" | "dropped" => Some(EmailStatus::Failed),
            _ => None,
        }
    }
}

/// Lifecycle status of a platform event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Active,
    Full,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnerStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnerType {
    Government,
    Business,
    Community,
}

impl PartnerType {
    /// Default partner type for a converted prospect of the given kind
    pub fn for_organization(org: &OrganizationType) -> Self {
        match org {
            OrganizationType::Municipality => PartnerType::Government,
            _ => PartnerType::Community,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordinals_follow_funnel_order() {
        for (index, stage) in PipelineStage::ALL.iter().enumerate() {
            assert_eq!(stage.ordinal() as usize, index);
            assert_eq!(PipelineStage::from_ordinal(index as u8), Some(*stage));
        }
        assert_eq!(PipelineStage::from_ordinal(7), None);
        assert!(PipelineStage::Contacted < PipelineStage::Responded);
    }

    #[test]
    fn test_stage_parse_accepts_names_and_ordinals() {
        assert_eq!(PipelineStage::parse("interested"), Some(PipelineStage::Interested));
        assert_eq!(PipelineStage::parse("5"), Some(PipelineStage::Converted));
        assert_eq!(PipelineStage::parse("lost"), None);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(PipelineStage::Converted.is_terminal());
        assert!(PipelineStage::Declined.is_terminal());
        assert!(!PipelineStage::Interested.is_terminal());
    }

    #[test]
    fn test_organization_type_parse_is_lenient() {
        assert_eq!(OrganizationType::parse("Municipality"), OrganizationType::Municipality);
        assert_eq!(OrganizationType::parse("civic org"), OrganizationType::CivicOrg);
        assert_eq!(OrganizationType::parse("HOA"), OrganizationType::Hoa);
        assert_eq!(OrganizationType::parse(" non-profit "), OrganizationType::Nonprofit);
        assert_eq!(
            OrganizationType::parse("Church"),
            OrganizationType::Unrecognized("Church".to_string())
        );
    }

    #[test]
    fn test_organization_type_serializes_as_label() {
        let json = serde_json::to_string(&OrganizationType::Hoa).unwrap();
        assert_eq!(json, "\"HOA\"");
        let back: OrganizationType = serde_json::from_str("\"Scouts\"").unwrap();
        assert_eq!(back, OrganizationType::Unrecognized("Scouts".to_string()));
    }

    #[test]
    fn test_sentiment_parse_lenient() {
        assert_eq!(Sentiment::parse_lenient("Positive."), Sentiment::Positive);
        assert_eq!(Sentiment::parse_lenient(" negative"), Sentiment::Negative);
        assert_eq!(Sentiment::parse_lenient("mixed"), Sentiment::Neutral);
    }

    #[test]
    fn test_email_status_only_moves_forward() {
        assert!(EmailStatus::Sent.can_advance_to(EmailStatus::Opened));
        assert!(EmailStatus::Opened.can_advance_to(EmailStatus::Clicked));
        assert!(!EmailStatus::Clicked.can_advance_to(EmailStatus::Delivered));
        assert!(EmailStatus::Delivered.can_advance_to(EmailStatus::Bounced));
        assert!(!EmailStatus::Bounced.can_advance_to(EmailStatus::Delivered));
        assert!(!EmailStatus::Failed.can_advance_to(EmailStatus::Sent));
    }
}
