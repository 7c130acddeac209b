// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./quarry.toml` > `~/.config/quarry/quarry.toml` > `/etc/quarry/quarry.toml`
//! with environment variable overrides via `QUARRY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::QuarryConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/quarry/quarry.toml`
/// 3. `~/.config/quarry/quarry.toml`
/// 4. `./quarry.toml`
/// 5. `QUARRY_*` environment variables
pub fn load_config() -> Result<QuarryConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<QuarryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuarryConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<QuarryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuarryConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(QuarryConfig::default()))
        .merge(Toml::file("/etc/quarry/quarry.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("quarry/quarry.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("quarry.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `QUARRY_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys such as
/// `QUARRY_STORAGE_DATA_DIR` must become `storage.data_dir`, not `storage.data.dir`.
fn env_provider() -> Env {
    Env::prefixed("QUARRY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
