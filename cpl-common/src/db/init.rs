//! Database initialization
//!
//! Opens (or creates) the SQLite database and ensures every entity table and
//! the settings table exist. Safe to call repeatedly.

use crate::models::{
    Entity, OutreachEmail, Partner, PartnerAdmin, PlatformEvent, Prospect, ProspectActivity,
};
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Tables holding JSON entity documents
pub const ENTITY_TABLES: [&str; 6] = [
    Prospect::TABLE,
    ProspectActivity::TABLE,
    OutreachEmail::TABLE,
    Partner::TABLE,
    PartnerAdmin::TABLE,
    PlatformEvent::TABLE,
];

/// Open the database file and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    // WAL keeps readers unblocked while the scheduler writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// One connection only: every SQLite `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for table in ENTITY_TABLES {
        create_entity_table(pool, table).await?;
    }
    create_settings_table(pool).await?;

    info!("Database tables initialized ({} entity tables, settings)", ENTITY_TABLES.len());
    Ok(())
}

/// Create one JSON document table
pub async fn create_entity_table(pool: &SqlitePool, table: &str) -> Result<()> {
    // Table names come from `Entity::TABLE` constants, never from input
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Holds explicit overrides only; compiled defaults are never written here.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
