// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public face of the Quarry query service.
//!
//! Callers subscribe a [`DatabaseUser`](quarry_core::DatabaseUser) with the
//! [`Dispatcher`], submit queries fire-and-forget, and receive results via
//! the [`ResultRouter`]. All database work happens on the single worker task
//! owned by `quarry-storage`.

pub mod dispatcher;
pub mod router;
pub mod subscription;

pub use dispatcher::{Dispatcher, ServiceStats};
pub use router::ResultRouter;
pub use subscription::SubscriptionTable;
