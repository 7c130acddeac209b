// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Quarry query service.
//!
//! This crate holds the data model shared by every other crate in the
//! workspace: the error taxonomy, dynamically-typed records, request and
//! result envelopes, and the [`DatabaseUser`] trait that callers implement
//! to take part in the service.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::QuarryError;
pub use traits::DatabaseUser;
pub use types::{
    HealthStatus, Payload, QueryRequest, QueryResult, Record, RequestId, UserCapabilities,
    UserKey, Value,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarry_error_has_all_variants() {
        let _open = QuarryError::ConnectionOpen {
            db_name: "a.db".into(),
            source: Box::new(std::io::Error::other("test")),
        };
        let _exec = QuarryError::QueryExecution {
            source: Box::new(std::io::Error::other("test")),
        };
        let _caps = QuarryError::CapabilityMismatch {
            user: "u".into(),
            missing: "receive_results".into(),
        };
        let _stale = QuarryError::StaleReference { request_id: 1 };
        let _path = QuarryError::PathResolution {
            db_name: "a.db".into(),
            source: std::io::Error::other("test"),
        };
        let _config = QuarryError::Config("test".into());
        let _not_running = QuarryError::NotRunning;
        let _internal = QuarryError::Internal("test".into());
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }
}
