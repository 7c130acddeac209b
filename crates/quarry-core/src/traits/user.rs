// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability trait a caller implements to use the query service.

use async_trait::async_trait;

use crate::types::{QueryResult, UserCapabilities};

/// A caller of the query service.
///
/// Implementing this trait is the compile-time half of the capability check.
/// The runtime half is [`capabilities`](DatabaseUser::capabilities): a user
/// must report both `submit_queries` and `receive_results` to be accepted by
/// `subscribe`.
///
/// The service never holds a strong reference to a user. Results for a user
/// that has been dropped, or that unsubscribed after submitting, are
/// discarded.
#[async_trait]
pub trait DatabaseUser: Send + Sync + 'static {
    /// Human-readable name used in log output.
    fn name(&self) -> &str;

    /// Capabilities this user supports. Defaults to all of them.
    fn capabilities(&self) -> UserCapabilities {
        UserCapabilities::full()
    }

    /// Called once per completed request, in the order the worker finished them.
    ///
    /// This runs on the router task. Implementations that live on another
    /// execution context should hand the result off (for example into their
    /// own channel) rather than do heavy work here.
    async fn receive_result(&self, result: QueryResult);
}
