//! # Community Partner Pipeline: common library
//!
//! Shared code for the pipeline crates:
//! - Domain model (prospects, activities, outreach emails, partners, events)
//! - Repository contract with in-memory and SQLite implementations
//! - Layered configuration and string-keyed settings
//! - Pipeline event bus
//! - Great-circle distance helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod geo;
pub mod models;
pub mod repository;
pub mod settings;

pub use error::{Error, Result};
pub use repository::{InMemoryRepository, Repository, SharedRepository};
