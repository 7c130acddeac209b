// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions implemented by callers of the query service.

pub mod user;

pub use user::DatabaseUser;
