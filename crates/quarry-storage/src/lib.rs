// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage side of the Quarry query service.
//!
//! A single [`Worker`] task owns the one [`DatabaseConnection`] and the
//! [`PathResolver`]. Requests arrive over an unbounded channel and are run one
//! at a time, so the connection needs no locking: serialization comes from
//! there being exactly one consumer. The connection itself is a
//! `tokio-rusqlite` handle, whose background thread is the only place the
//! native SQLite handle is touched.

pub mod connection;
pub mod paths;
pub mod stats;
pub mod worker;

pub use connection::{ConnectionState, DatabaseConnection};
pub use paths::{PathPolicy, PathResolver};
pub use stats::{WorkerStats, WorkerStatsSnapshot};
pub use worker::{spawn_worker, CompletedQuery, Worker, WorkerChannels};
