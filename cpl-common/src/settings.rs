//! String-keyed runtime settings
//!
//! Resolution, lowest priority first:
//! 1. Compiled defaults ([`DEFAULT_SETTINGS`])
//! 2. TOML `[settings]` table
//! 3. Environment variables (`CPL_` + upper-cased key)
//! 4. Database `settings` table
//!
//! Values stay strings until read through a typed getter; an unparseable
//! value logs a warning and yields the caller's default.

use std::collections::BTreeMap;
use tracing::warn;

pub const OUTREACH_ENABLED: &str = "outreach_enabled";
pub const OUTREACH_TEST_MODE: &str = "outreach_test_mode";
pub const OUTREACH_TEST_RECIPIENT: &str = "outreach_test_recipient";
pub const OUTREACH_MAX_DAILY: &str = "outreach_max_daily";
pub const OUTREACH_MAX_FOLLOWUPS_PER_RUN: &str = "outreach_max_followups_per_run";
pub const OUTREACH_FOLLOWUP_INTERVAL_DAYS: &str = "outreach_followup_interval_days";
pub const FOLLOWUP_SCAN_INTERVAL_SECS: &str = "followup_scan_interval_secs";
pub const PLATFORM_NAME: &str = "platform_name";
pub const PLATFORM_SITE_URL: &str = "platform_site_url";
pub const AI_API_KEY: &str = "ai_api_key";
pub const EMAIL_API_KEY: &str = "email_api_key";

/// Fallback recipient used while outreach runs in test mode
pub const DEFAULT_TEST_RECIPIENT: &str = "outreach-test@trashmob.eco";

/// Compiled default values
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (OUTREACH_ENABLED, "false"),
    (OUTREACH_TEST_MODE, "true"),
    (OUTREACH_TEST_RECIPIENT, DEFAULT_TEST_RECIPIENT),
    (OUTREACH_MAX_DAILY, "10"),
    (OUTREACH_MAX_FOLLOWUPS_PER_RUN, "10"),
    (OUTREACH_FOLLOWUP_INTERVAL_DAYS, "7"),
    (FOLLOWUP_SCAN_INTERVAL_SECS, "3600"),
    (PLATFORM_NAME, "TrashMob.eco"),
    (PLATFORM_SITE_URL, "https://www.trashmob.eco"),
];

/// Layered string-keyed settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Empty settings (typed getters return the caller's defaults)
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings seeded with [`DEFAULT_SETTINGS`]
    pub fn with_defaults() -> Self {
        let mut settings = Self::new();
        for (key, value) in DEFAULT_SETTINGS {
            settings.set(key, *value);
        }
        settings
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Builder form of [`Settings::set`]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Overlay another layer; its values win
    pub fn merge<I, K, V>(&mut self, layer: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in layer {
            self.values.insert(key.into(), value.into());
        }
    }

    /// Overlay `CPL_<KEY>` environment variables for every known key
    pub fn merge_env(&mut self) {
        let keys: Vec<String> = self
            .values
            .keys()
            .cloned()
            .chain(DEFAULT_SETTINGS.iter().map(|(k, _)| k.to_string()))
            .chain([AI_API_KEY.to_string(), EMAIL_API_KEY.to_string()])
            .collect();

        for key in keys {
            if let Ok(value) = std::env::var(env_var_name(&key)) {
                self.values.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => default.to_string(),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => default,
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    warn!(
                        key,
                        value = %v,
                        "Unparseable boolean setting, using default {}", default
                    );
                    default
                }
            },
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        match self.get(key) {
            None => default,
            Some(v) => v.trim().parse().unwrap_or_else(|_| {
                warn!(key, value = %v, "Unparseable numeric setting, using default {}", default);
                default
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Environment variable consulted for a settings key
pub fn env_var_name(key: &str) -> String {
    format!("CPL_{}", key.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let settings = Settings::with_defaults();
        assert!(!settings.get_bool(OUTREACH_ENABLED, true));
        assert!(settings.get_bool(OUTREACH_TEST_MODE, false));
        assert_eq!(settings.get_u32(OUTREACH_MAX_DAILY, 0), 10);
        assert_eq!(
            settings.get_string(OUTREACH_TEST_RECIPIENT, ""),
            DEFAULT_TEST_RECIPIENT
        );
    }

    #[test]
    fn test_later_layers_win() {
        let mut settings = Settings::with_defaults();
        settings.merge([(OUTREACH_MAX_DAILY, "25")]);
        assert_eq!(settings.get_u32(OUTREACH_MAX_DAILY, 0), 25);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let settings = Settings::new()
            .with(OUTREACH_ENABLED, "maybe")
            .with(OUTREACH_MAX_DAILY, "lots");
        assert!(!settings.get_bool(OUTREACH_ENABLED, false));
        assert_eq!(settings.get_u32(OUTREACH_MAX_DAILY, 7), 7);
    }

    #[test]
    fn test_blank_string_uses_default() {
        let settings = Settings::new().with(PLATFORM_NAME, "  ");
        assert_eq!(settings.get_string(PLATFORM_NAME, "fallback"), "fallback");
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("outreach_enabled"), "CPL_OUTREACH_ENABLED");
    }
}
