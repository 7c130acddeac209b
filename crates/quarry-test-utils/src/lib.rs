// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Quarry integration tests.
//!
//! Provides recording [`DatabaseUser`](quarry_core::DatabaseUser)
//! implementations and a [`TestHarness`] that runs a real dispatcher against
//! databases in a temporary directory.

pub mod harness;
pub mod users;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use users::{IncapableUser, RecordingUser};
