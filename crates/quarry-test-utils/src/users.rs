// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database users that record what they receive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use quarry_core::{DatabaseUser, QueryResult, UserCapabilities};
use tokio::sync::watch;

/// Stores every result it receives and lets tests wait for a count.
pub struct RecordingUser {
    name: String,
    results: Mutex<Vec<QueryResult>>,
    count: watch::Sender<usize>,
}

impl RecordingUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Mutex::new(Vec::new()),
            count: watch::Sender::new(0),
        }
    }

    /// Results received so far, in arrival order.
    pub fn received(&self) -> Vec<QueryResult> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until at least `n` results arrived or `timeout` elapsed, then
    /// return whatever has been received.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<QueryResult> {
        let mut rx = self.count.subscribe();
        let _ = tokio::time::timeout(timeout, rx.wait_for(|count| *count >= n)).await;
        self.received()
    }
}

#[async_trait]
impl DatabaseUser for RecordingUser {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive_result(&self, result: QueryResult) {
        if let Ok(mut results) = self.results.lock() {
            results.push(result);
        }
        self.count.send_modify(|count| *count += 1);
    }
}

/// A user whose capabilities can be switched off, before or after
/// subscribing.
pub struct IncapableUser {
    submit: AtomicBool,
    receive: AtomicBool,
    received: AtomicUsize,
}

impl IncapableUser {
    pub fn full() -> Self {
        Self {
            submit: AtomicBool::new(true),
            receive: AtomicBool::new(true),
            received: AtomicUsize::new(0),
        }
    }

    pub fn without_receive() -> Self {
        let user = Self::full();
        user.set_receive(false);
        user
    }

    pub fn without_submit() -> Self {
        let user = Self::full();
        user.submit.store(false, Ordering::Relaxed);
        user
    }

    pub fn set_receive(&self, enabled: bool) {
        self.receive.store(enabled, Ordering::Relaxed);
    }

    pub fn received_count(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DatabaseUser for IncapableUser {
    fn name(&self) -> &str {
        "incapable"
    }

    fn capabilities(&self) -> UserCapabilities {
        UserCapabilities {
            submit_queries: self.submit.load(Ordering::Relaxed),
            receive_results: self.receive.load(Ordering::Relaxed),
        }
    }

    async fn receive_result(&self, _result: QueryResult) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_user_wakes_waiters() {
        let user = std::sync::Arc::new(RecordingUser::new("w"));
        let waiter = {
            let user = std::sync::Arc::clone(&user);
            tokio::spawn(async move { user.wait_for(2, Duration::from_secs(5)).await })
        };
        user.receive_result(QueryResult::empty(1, None)).await;
        user.receive_result(QueryResult::empty(2, None)).await;

        let got = waiter.await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].request_id, 2);
    }

    #[tokio::test]
    async fn wait_for_gives_up_after_timeout() {
        let user = RecordingUser::new("idle");
        let got = user.wait_for(1, Duration::from_millis(20)).await;
        assert!(got.is_empty());
    }

    #[test]
    fn incapable_user_reports_missing_capability() {
        assert!(!IncapableUser::without_receive().capabilities().receive_results);
        assert!(!IncapableUser::without_submit().capabilities().submit_queries);
        assert!(IncapableUser::full().capabilities().is_complete());
    }
}
