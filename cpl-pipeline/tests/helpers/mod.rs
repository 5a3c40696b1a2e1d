//! Test Helper Utilities
//!
//! Fixtures and fakes shared by the cpl-pipeline integration tests

#![allow(dead_code, unused_imports)]

pub mod fakes;
pub mod fixtures;

pub use fakes::{CountingRepository, RecordingEmailSender, ScriptedSentiment};
pub use fixtures::{
    enabled_config, event_at, partner_at, prospect, prospect_at, TestContext, BELLEVUE, PORTLAND,
    SEATTLE, SPOKANE,
};
