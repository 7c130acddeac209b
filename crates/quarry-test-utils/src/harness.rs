// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end tests.
//!
//! `TestHarness` runs a started [`Dispatcher`] whose databases live in a
//! temporary directory that is removed when the harness is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quarry_config::{PathPolicyKind, StorageConfig};
use quarry_core::{DatabaseUser, QuarryError};
use quarry_service::Dispatcher;
use tempfile::TempDir;

use crate::users::RecordingUser;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    policy: PathPolicyKind,
    templates: Vec<(String, String)>,
    synchronous: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            policy: PathPolicyKind::Direct,
            templates: Vec::new(),
            synchronous: None,
        }
    }

    /// Use copy-on-first-use paths instead of a direct database directory.
    pub fn with_copy_policy(mut self) -> Self {
        self.policy = PathPolicyKind::Copy;
        self
    }

    /// Create a template database named `name`, initialised with `sql`.
    pub fn with_template(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.templates.push((name.into(), sql.into()));
        self
    }

    pub fn with_synchronous(mut self, mode: impl Into<String>) -> Self {
        self.synchronous = Some(mode.into());
        self
    }

    /// Build the harness and start its dispatcher.
    pub async fn build(self) -> Result<TestHarness, QuarryError> {
        let temp_dir = TempDir::new().map_err(|e| QuarryError::Internal(e.to_string()))?;
        let database_dir = temp_dir.path().join("databases");
        let template_dir = temp_dir.path().join("templates");
        let data_dir = temp_dir.path().join("data");
        for dir in [&database_dir, &template_dir] {
            std::fs::create_dir_all(dir).map_err(|e| QuarryError::Internal(e.to_string()))?;
        }

        for (name, sql) in &self.templates {
            let conn = rusqlite::Connection::open(template_dir.join(name))
                .map_err(|e| QuarryError::Internal(e.to_string()))?;
            conn.execute_batch(sql)
                .map_err(|e| QuarryError::Internal(e.to_string()))?;
        }

        let defaults = StorageConfig::default();
        let config = StorageConfig {
            path_policy: self.policy,
            database_dir: path_string(&database_dir),
            template_dir: path_string(&template_dir),
            data_dir: path_string(&data_dir),
            synchronous: self.synchronous.unwrap_or(defaults.synchronous),
        };

        let dispatcher = Arc::new(Dispatcher::new(config));
        dispatcher.start().await?;
        Ok(TestHarness {
            dispatcher,
            database_dir,
            data_dir,
            _temp_dir: temp_dir,
        })
    }
}

/// A running dispatcher over a throwaway directory.
pub struct TestHarness {
    pub dispatcher: Arc<Dispatcher>,
    database_dir: PathBuf,
    data_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Start a harness with direct paths and default settings.
    pub async fn start() -> Result<Self, QuarryError> {
        Self::builder().build().await
    }

    /// Directory used by the direct path policy.
    pub fn database_dir(&self) -> &Path {
        &self.database_dir
    }

    /// Directory templates are copied into under the copy policy.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create and subscribe a [`RecordingUser`].
    ///
    /// Returns the concrete user for inspecting results and the trait object
    /// to submit with.
    pub fn recording_user(&self, name: &str) -> (Arc<RecordingUser>, Arc<dyn DatabaseUser>) {
        let recorder = Arc::new(RecordingUser::new(name));
        let user: Arc<dyn DatabaseUser> = recorder.clone();
        self.dispatcher.subscribe(&user);
        (recorder, user)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
