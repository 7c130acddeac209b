// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{PathPolicyKind, QuarryConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const SYNCHRONOUS_MODES: &[&str] = &["OFF", "NORMAL", "FULL", "EXTRA", "0", "1", "2", "3"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every error rather than failing on the first.
pub fn validate_config(config: &QuarryConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.service.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.log_level `{}` must be one of: {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    let storage = &config.storage;
    match storage.path_policy.effective() {
        PathPolicyKind::Direct => {
            if storage.database_dir.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "storage.database_dir must not be empty".to_string(),
                });
            }
        }
        _ => {
            if storage.template_dir.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "storage.template_dir must not be empty".to_string(),
                });
            }
            if storage.data_dir.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "storage.data_dir must not be empty".to_string(),
                });
            }
        }
    }

    let mode = storage.synchronous.trim().to_ascii_uppercase();
    if !SYNCHRONOUS_MODES.contains(&mode.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "storage.synchronous `{}` must be one of: OFF, NORMAL, FULL, EXTRA (or 0-3)",
                storage.synchronous
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
