// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `quarry resolve`: show where a database name leads.

use std::path::PathBuf;
use std::sync::Arc;

use quarry_config::StorageConfig;
use quarry_core::QuarryError;
use quarry_storage::{PathPolicy, PathResolver, WorkerStats};

/// Resolve `name` the way the worker would, including copy-on-first-use.
pub async fn resolve_path(storage: &StorageConfig, name: &str) -> Result<PathBuf, QuarryError> {
    let policy = PathPolicy::from_config(storage)?;
    let mut resolver = PathResolver::new(policy, Arc::new(WorkerStats::new()));
    resolver.resolve(name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_config::PathPolicyKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn direct_policy_joins_directory() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            path_policy: PathPolicyKind::Direct,
            database_dir: dir.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let path = resolve_path(&storage, "notes.db").await.unwrap();
        assert_eq!(path, dir.path().join("notes.db"));
    }

    #[tokio::test]
    async fn copy_policy_copies_template() {
        let root = tempdir().unwrap();
        let templates = root.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("seed.db"), b"template bytes").unwrap();

        let storage = StorageConfig {
            path_policy: PathPolicyKind::Copy,
            template_dir: templates.to_string_lossy().into_owned(),
            data_dir: root.path().join("data").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let path = resolve_path(&storage, "seed.db").await.unwrap();
        assert_eq!(path, root.path().join("data").join("seed.db"));
        assert_eq!(std::fs::read(&path).unwrap(), b"template bytes");
    }

    #[tokio::test]
    async fn rejects_nested_names() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            path_policy: PathPolicyKind::Direct,
            database_dir: dir.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        assert!(resolve_path(&storage, "a/b.db").await.is_err());
    }
}
