//! Configuration layering tests
//!
//! Environment-variable tests run serially because they mutate process state.

use cpl_common::config::{resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use cpl_common::settings::{
    env_var_name, Settings, OUTREACH_ENABLED, OUTREACH_MAX_DAILY, OUTREACH_TEST_MODE,
};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
#[serial]
fn test_env_overrides_toml_layer() {
    let config: TomlConfig = toml::from_str(
        r#"
        [settings]
        outreach_max_daily = "20"
        outreach_enabled = "false"
        "#,
    )
    .unwrap();

    let mut settings = Settings::with_defaults();
    settings.merge(config.settings.clone());
    std::env::set_var(env_var_name(OUTREACH_ENABLED), "true");
    settings.merge_env();
    std::env::remove_var(env_var_name(OUTREACH_ENABLED));

    assert!(settings.get_bool(OUTREACH_ENABLED, false));
    assert_eq!(settings.get_u32(OUTREACH_MAX_DAILY, 0), 20);
    assert!(settings.get_bool(OUTREACH_TEST_MODE, false));
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/toml/root")),
        ..Default::default()
    };

    std::env::set_var(ROOT_FOLDER_ENV, "/env/root");
    let resolved = resolve_root_folder(None, &config);
    std::env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/env/root"));
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/toml/root"));
}

#[test]
fn test_load_toml_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        bind_address = "0.0.0.0"
        port = 6000
        email_from_address = "partners@example.org"
        "#
    )
    .unwrap();

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.port, Some(6000));
    assert_eq!(config.logging.level, "info");
    assert!(config.settings.is_empty());
}

#[test]
fn test_load_invalid_toml_is_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "port = [not valid").unwrap();

    let result = TomlConfig::load(file.path());
    assert!(matches!(result, Err(cpl_common::Error::Config(_))));
}
