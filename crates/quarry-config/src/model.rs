// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Quarry query service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Quarry configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuarryConfig {
    /// Process-level settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Database location and connection settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How logical database names are mapped to files.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PathPolicyKind {
    /// `Direct` on Linux, `Copy` everywhere else.
    #[default]
    Auto,
    /// Copy from `template_dir` into `data_dir` on first use.
    Copy,
    /// Open files in `database_dir` in place.
    Direct,
}

impl PathPolicyKind {
    /// Resolve `Auto` to the policy for the current platform.
    pub fn effective(self) -> Self {
        match self {
            PathPolicyKind::Auto if cfg!(target_os = "linux") => PathPolicyKind::Direct,
            PathPolicyKind::Auto => PathPolicyKind::Copy,
            other => other,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path resolution policy.
    #[serde(default)]
    pub path_policy: PathPolicyKind,

    /// Directory holding the databases under the direct policy.
    /// Relative paths are taken from the working directory.
    #[serde(default = "default_database_dir")]
    pub database_dir: String,

    /// Read-only directory of template databases (copy policy).
    #[serde(default = "default_template_dir")]
    pub template_dir: String,

    /// Writable directory templates are copied into (copy policy).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Value for `PRAGMA synchronous` on every opened connection.
    /// `OFF` trades durability of the most recent writes for throughput.
    #[serde(default = "default_synchronous")]
    pub synchronous: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path_policy: PathPolicyKind::default(),
            database_dir: default_database_dir(),
            template_dir: default_template_dir(),
            data_dir: default_data_dir(),
            synchronous: default_synchronous(),
        }
    }
}

fn default_database_dir() -> String {
    "databases".to_string()
}

fn default_template_dir() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("databases")))
        .unwrap_or_else(|| PathBuf::from("databases"))
        .to_string_lossy()
        .into_owned()
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("quarry"))
        .unwrap_or_else(|| PathBuf::from("quarry-data"))
        .to_string_lossy()
        .into_owned()
}

fn default_synchronous() -> String {
    "OFF".to_string()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn policy_kind_parses_lowercase() {
        assert_eq!(PathPolicyKind::from_str("copy").unwrap(), PathPolicyKind::Copy);
        assert_eq!(PathPolicyKind::from_str("direct").unwrap(), PathPolicyKind::Direct);
        assert_eq!(PathPolicyKind::Auto.to_string(), "auto");
        assert!(PathPolicyKind::from_str("sideways").is_err());
    }

    #[test]
    fn auto_policy_resolves_per_platform() {
        let effective = PathPolicyKind::Auto.effective();
        if cfg!(target_os = "linux") {
            assert_eq!(effective, PathPolicyKind::Direct);
        } else {
            assert_eq!(effective, PathPolicyKind::Copy);
        }
        assert_eq!(PathPolicyKind::Copy.effective(), PathPolicyKind::Copy);
    }

    #[test]
    fn storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.database_dir, "databases");
        assert_eq!(storage.synchronous, "OFF");
        assert!(storage.template_dir.ends_with("databases"));
        assert!(!storage.data_dir.is_empty());
    }
}
