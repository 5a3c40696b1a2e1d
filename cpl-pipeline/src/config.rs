//! Runtime configuration resolution
//!
//! Settings layer lowest to highest: compiled defaults, TOML `[settings]`,
//! `CPL_*` environment variables, database `settings` table.
//!
//! API keys resolve Database → ENV → TOML; a placeholder such as `"x"` counts
//! as not configured.

use cpl_common::config::{is_configured_secret, TomlConfig};
use cpl_common::settings::{self, env_var_name, Settings};
use cpl_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Build the layered settings; `db` is `None` for in-memory runs
pub async fn load_settings(toml_config: &TomlConfig, db: Option<&SqlitePool>) -> Result<Settings> {
    let mut resolved = Settings::with_defaults();
    resolved.merge(toml_config.settings.clone());
    resolved.merge_env();
    if let Some(db) = db {
        cpl_common::db::settings::apply_to(db, &mut resolved).await?;
    }
    Ok(resolved)
}

/// Pick the highest-priority valid secret among the sources
///
/// Warns when more than one source provides a valid value.
fn resolve_secret(
    name: &str,
    db_value: Option<String>,
    env_value: Option<String>,
    toml_value: Option<&str>,
) -> Option<String> {
    let candidates = [
        ("database", db_value),
        ("environment", env_value),
        ("TOML", toml_value.map(str::to_string)),
    ];

    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, value)| {
            value
                .filter(|v| is_configured_secret(v))
                .map(|v| (source, v))
        })
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    match valid.into_iter().next() {
        Some((source, value)) => {
            info!("{} loaded from {}", name, source);
            Some(value.trim().to_string())
        }
        None => {
            info!("{} not configured", name);
            None
        }
    }
}

async fn stored_secret(db: Option<&SqlitePool>, key: &str) -> Result<Option<String>> {
    match db {
        Some(db) => cpl_common::db::settings::get_setting::<String>(db, key).await,
        None => Ok(None),
    }
}

/// AI provider key; `None` selects the deterministic fallback
pub async fn resolve_ai_api_key(
    db: Option<&SqlitePool>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    Ok(resolve_secret(
        "AI API key",
        stored_secret(db, settings::AI_API_KEY).await?,
        std::env::var(env_var_name(settings::AI_API_KEY)).ok(),
        toml_config.ai_api_key.as_deref(),
    ))
}

/// Email provider key; `None` selects the log-only sender
pub async fn resolve_email_api_key(
    db: Option<&SqlitePool>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    Ok(resolve_secret(
        "Email API key",
        stored_secret(db, settings::EMAIL_API_KEY).await?,
        std::env::var(env_var_name(settings::EMAIL_API_KEY)).ok(),
        toml_config.email_api_key.as_deref(),
    ))
}
