// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps logical database names to writable file paths.
//!
//! Resolution is cached per name for the lifetime of the resolver. A cached
//! path is returned as-is even if the file has since been moved or deleted;
//! nothing re-checks it.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use quarry_config::{PathPolicyKind, StorageConfig};
use quarry_core::QuarryError;
use tracing::{debug, info, warn};

use crate::stats::WorkerStats;

/// Where database files live on this platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPolicy {
    /// The install directory is writable: open `<dir>/<name>` in place.
    Direct { dir: PathBuf },
    /// Copy `<template_dir>/<name>` to `<data_dir>/<name>` the first time the
    /// destination is missing, then use the copy.
    CopyOnFirstUse {
        template_dir: PathBuf,
        data_dir: PathBuf,
    },
}

impl PathPolicy {
    /// Build the policy from configuration, resolving `auto` for this
    /// platform and anchoring a relative direct directory at the working
    /// directory.
    pub fn from_config(config: &StorageConfig) -> Result<Self, QuarryError> {
        match config.path_policy.effective() {
            PathPolicyKind::Copy => Ok(PathPolicy::CopyOnFirstUse {
                template_dir: PathBuf::from(non_empty(&config.template_dir, "template_dir")?),
                data_dir: PathBuf::from(non_empty(&config.data_dir, "data_dir")?),
            }),
            _ => {
                let dir = PathBuf::from(non_empty(&config.database_dir, "database_dir")?);
                let dir = if dir.is_relative() {
                    std::env::current_dir()
                        .map_err(|e| {
                            QuarryError::Config(format!("cannot read working directory: {e}"))
                        })?
                        .join(dir)
                } else {
                    dir
                };
                Ok(PathPolicy::Direct { dir })
            }
        }
    }
}

fn non_empty<'a>(value: &'a str, key: &str) -> Result<&'a str, QuarryError> {
    if value.trim().is_empty() {
        return Err(QuarryError::Config(format!("storage.{key} must not be empty")));
    }
    Ok(value)
}

/// Resolves and caches database paths. Owned by the worker.
#[derive(Debug)]
pub struct PathResolver {
    policy: PathPolicy,
    cache: HashMap<String, PathBuf>,
    stats: Arc<WorkerStats>,
}

impl PathResolver {
    pub fn new(policy: PathPolicy, stats: Arc<WorkerStats>) -> Self {
        Self {
            policy,
            cache: HashMap::new(),
            stats,
        }
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Cached path for `db_name`, if it has been resolved before.
    pub fn cached(&self, db_name: &str) -> Option<&Path> {
        self.cache.get(db_name).map(PathBuf::as_path)
    }

    /// Resolve `db_name` to a path, performing copy-on-first-use if the
    /// policy calls for it. Failures are not cached.
    pub async fn resolve(&mut self, db_name: &str) -> Result<PathBuf, QuarryError> {
        if let Some(path) = self.cache.get(db_name) {
            debug!(db_name, path = %path.display(), "path cache hit");
            return Ok(path.clone());
        }

        check_file_name(db_name)?;

        let resolved = match &self.policy {
            PathPolicy::Direct { dir } => tokio::fs::create_dir_all(dir)
                .await
                .map(|()| dir.join(db_name)),
            PathPolicy::CopyOnFirstUse {
                template_dir,
                data_dir,
            } => {
                let template_dir = template_dir.clone();
                let data_dir = data_dir.clone();
                self.copy_on_first_use(db_name, &template_dir, &data_dir)
                    .await
            }
        };
        let path = resolved.map_err(|source| QuarryError::PathResolution {
            db_name: db_name.to_string(),
            source,
        })?;

        debug!(db_name, path = %path.display(), "resolved database path");
        self.cache.insert(db_name.to_string(), path.clone());
        Ok(path)
    }

    async fn copy_on_first_use(
        &self,
        db_name: &str,
        template_dir: &Path,
        data_dir: &Path,
    ) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(data_dir).await?;
        let destination = data_dir.join(db_name);

        if tokio::fs::try_exists(&destination).await? {
            debug!(path = %destination.display(), "database already present in data dir");
        } else {
            let template = template_dir.join(db_name);
            if tokio::fs::try_exists(&template).await? {
                tokio::fs::copy(&template, &destination).await?;
                self.stats.record_template_copy();
                info!(
                    template = %template.display(),
                    path = %destination.display(),
                    "copied database template"
                );
            } else {
                // No template: the engine will create an empty database here.
                debug!(template = %template.display(), "no template to copy");
            }
        }

        restrict_to_owner(&destination).await;
        Ok(destination)
    }
}

/// Logical names address a file directly inside the policy directory.
fn check_file_name(db_name: &str) -> Result<(), QuarryError> {
    let mut components = Path::new(db_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(QuarryError::PathResolution {
            db_name: db_name.to_string(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "database name must be a plain file name",
            ),
        }),
    }
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if !matches!(tokio::fs::try_exists(path).await, Ok(true)) {
        return;
    }
    let permissions = std::fs::Permissions::from_mode(0o600);
    if let Err(e) = tokio::fs::set_permissions(path, permissions).await {
        warn!(path = %path.display(), error = %e, "could not restrict database permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) {}
