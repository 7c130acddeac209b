// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Quarry query service.
//!
//! Most of these never reach a caller: connection and execution failures are
//! absorbed by the worker and turned into empty results, and stale references
//! are dropped by the router. They exist so that each absorbed failure is
//! logged with a consistent shape.

use thiserror::Error;

use crate::types::RequestId;

/// The primary error type used across the Quarry workspace.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// The database path could not be resolved or the engine refused to open it.
    #[error("failed to open database `{db_name}`: {source}")]
    ConnectionOpen {
        db_name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed SQL, constraint violation, or any other engine-side failure.
    #[error("query execution failed: {source}")]
    QueryExecution {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A user tried to subscribe without supporting both submit and receive.
    #[error("user `{user}` lacks required capability: {missing}")]
    CapabilityMismatch { user: String, missing: String },

    /// The target of a result delivery is gone or no longer subscribed.
    #[error("result for request {request_id} has no live subscriber")]
    StaleReference { request_id: RequestId },

    /// A logical database name could not be mapped to a writable path.
    #[error("cannot resolve path for `{db_name}`: {source}")]
    PathResolution {
        db_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors (invalid values, unusable directories).
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation requires a running worker.
    #[error("query service is not running")]
    NotRunning,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
