//! Settings table accessors
//!
//! Key-value overrides that form the highest-priority configuration layer.

use crate::settings::Settings;
use crate::{Error, Result};
use sqlx::SqlitePool;

/// All stored overrides, skipping NULL values
pub async fn load_settings(db: &SqlitePool) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(db)
            .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect())
}

/// Overlay the stored overrides onto `settings`
pub async fn apply_to(db: &SqlitePool, settings: &mut Settings) -> Result<()> {
    let stored = load_settings(db).await?;
    tracing::debug!(count = stored.len(), "Applying database setting overrides");
    settings.merge(stored);
    Ok(())
}

/// Typed getter for a single setting
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Upsert a single setting
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;
    use crate::settings::OUTREACH_MAX_DAILY;

    #[tokio::test]
    async fn test_set_then_get_typed() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, OUTREACH_MAX_DAILY, 42).await.unwrap();

        let value: Option<u32> = get_setting(&pool, OUTREACH_MAX_DAILY).await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_upsert_keeps_single_row() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "outreach_enabled", "false").await.unwrap();
        set_setting(&pool, "outreach_enabled", "true").await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'outreach_enabled'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            get_setting::<String>(&pool, "outreach_enabled").await.unwrap(),
            Some("true".to_string())
        );
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, OUTREACH_MAX_DAILY, "many").await.unwrap();
        let result = get_setting::<u32>(&pool, OUTREACH_MAX_DAILY).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_overrides_apply_over_defaults() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, OUTREACH_MAX_DAILY, 3).await.unwrap();

        let mut settings = Settings::with_defaults();
        apply_to(&pool, &mut settings).await.unwrap();
        assert_eq!(settings.get_u32(OUTREACH_MAX_DAILY, 0), 3);
        assert!(settings.get_bool(crate::settings::OUTREACH_TEST_MODE, false));
    }
}
