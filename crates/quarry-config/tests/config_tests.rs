// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Quarry configuration system.

use figment::Jail;
use quarry_config::diagnostic::ConfigError;
use quarry_config::{load_and_validate_str, load_config, load_config_from_str, PathPolicyKind};

#[test]
fn valid_toml_deserializes_into_quarry_config() {
    let toml = r#"
[service]
log_level = "debug"

[storage]
path_policy = "copy"
template_dir = "/opt/app/databases"
data_dir = "/var/lib/app"
synchronous = "NORMAL"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.path_policy, PathPolicyKind::Copy);
    assert_eq!(config.storage.template_dir, "/opt/app/databases");
    assert_eq!(config.storage.data_dir, "/var/lib/app");
    assert_eq!(config.storage.synchronous, "NORMAL");
    // Untouched keys keep their defaults.
    assert_eq!(config.storage.database_dir, "databases");
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is fine");
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.storage.path_policy, PathPolicyKind::Auto);
    assert_eq!(config.storage.synchronous, "OFF");
}

#[test]
fn unknown_field_in_storage_suggests_correction() {
    let toml = r#"
[storage]
data_dri = "/tmp/x"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "data_dri");
            assert_eq!(suggestion.as_deref(), Some("data_dir"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[storag]
data_dir = "/tmp/x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn invalid_policy_is_rejected() {
    let toml = r#"
[storage]
path_policy = "sideways"
"#;
    let errors = load_and_validate_str(toml).expect_err("bad policy must be rejected");
    assert!(!errors.is_empty());
}

#[test]
fn wrong_type_is_rejected() {
    let toml = r#"
[service]
log_level = 3
"#;
    let errors = load_and_validate_str(toml).expect_err("wrong type must be rejected");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[storage]
synchronous = "SOMETIMES"
"#;
    let errors = load_and_validate_str(toml).expect_err("bad pragma value");
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn local_file_and_env_vars_are_layered() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "quarry.toml",
            r#"
[storage]
path_policy = "direct"
database_dir = "from-file"
synchronous = "FULL"
"#,
        )?;
        jail.set_env("QUARRY_STORAGE_DATABASE_DIR", "from-env");
        jail.set_env("QUARRY_SERVICE_LOG_LEVEL", "warn");

        let config = load_config()?;
        assert_eq!(config.storage.path_policy, PathPolicyKind::Direct);
        assert_eq!(config.storage.database_dir, "from-env");
        assert_eq!(config.storage.synchronous, "FULL");
        assert_eq!(config.service.log_level, "warn");
        Ok(())
    });
}
