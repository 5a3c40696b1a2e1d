//! External collaborators: AI content and sentiment, email dispatch, partner management

pub mod ai;
pub mod email;
pub mod partners;
pub mod templates;

pub use ai::{
    AiClient, AiError, ContentGenerator, FallbackAi, OutreachContent, PlatformInfo,
    SentimentAnalyzer,
};
pub use email::{EmailError, EmailRecipient, EmailSender, HttpEmailSender, LogEmailSender};
pub use partners::{PartnerManager, RepositoryPartnerManager};
