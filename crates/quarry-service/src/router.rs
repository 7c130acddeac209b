// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of completed queries back to the users that submitted them.
//!
//! The router drains the worker's result channel on its own task and never
//! runs user code there. Each user gets a mailbox: an unbounded channel
//! drained by a delivery task of its own, which calls `receive_result` one
//! result at a time. A slow or blocking user therefore only delays itself,
//! and a user may call back into the dispatcher (even `shutdown`) from
//! `receive_result`. Per-user order matches the order the worker produced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use quarry_core::{DatabaseUser, QuarryError, QueryResult, RequestId, UserKey};
use quarry_storage::CompletedQuery;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::subscription::SubscriptionTable;

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn discard(&self, request_id: RequestId, reason: &str) -> bool {
        let err = QuarryError::StaleReference { request_id };
        warn!(error = %err, reason, "result dropped");
        self.dropped.fetch_add(1, Ordering::Relaxed);
        false
    }
}

struct Mailbox {
    user: Weak<dyn DatabaseUser>,
    tx: mpsc::UnboundedSender<QueryResult>,
}

/// Routes results to their subscribers and counts the outcome.
pub struct ResultRouter {
    subscriptions: Arc<SubscriptionTable>,
    counters: Arc<Counters>,
    mailboxes: DashMap<UserKey, Mailbox>,
}

impl ResultRouter {
    pub fn new(subscriptions: Arc<SubscriptionTable>) -> Self {
        Self {
            subscriptions,
            counters: Arc::new(Counters::default()),
            mailboxes: DashMap::new(),
        }
    }

    /// Hand one result to the user's mailbox. Never waits on the user.
    ///
    /// Returns `false` when the result is dropped here because the user is
    /// gone or no longer subscribed. The mailbox checks again right before
    /// delivery, and also drops results for users that stopped accepting them.
    pub fn deliver(&self, result: QueryResult, user: &Weak<dyn DatabaseUser>) -> bool {
        let request_id = result.request_id;
        let key = UserKey::of_weak(user);
        if user.strong_count() == 0 {
            self.mailboxes.remove(&key);
            return self.counters.discard(request_id, "user dropped");
        }
        if !self.subscriptions.contains(user) {
            return self.counters.discard(request_id, "user unsubscribed");
        }

        if !self.mailboxes.contains_key(&key) {
            // Mailboxes of dropped users only pin their allocation.
            self.mailboxes.retain(|_, mailbox| mailbox.user.strong_count() > 0);
        }
        let tx = self
            .mailboxes
            .entry(key)
            .or_insert_with(|| self.open_mailbox(user))
            .tx
            .clone();
        match tx.send(result) {
            Ok(()) => true,
            Err(mpsc::error::SendError(result)) => {
                self.counters.discard(result.request_id, "mailbox closed")
            }
        }
    }

    fn open_mailbox(&self, user: &Weak<dyn DatabaseUser>) -> Mailbox {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_mailbox(
            user.clone(),
            rx,
            Arc::clone(&self.subscriptions),
            Arc::clone(&self.counters),
        ));
        Mailbox {
            user: user.clone(),
            tx,
        }
    }

    /// Spawn the routing loop. It ends once the worker drops its sender.
    pub fn spawn(
        self: Arc<Self>,
        mut results: mpsc::UnboundedReceiver<CompletedQuery>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(CompletedQuery { result, user }) = results.recv().await {
                self.deliver(result, &user);
            }
            debug!("result router finished");
        })
    }

    pub fn delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

/// Delivery task of one user. Ends when the router drops the mailbox.
async fn run_mailbox(
    user: Weak<dyn DatabaseUser>,
    mut results: mpsc::UnboundedReceiver<QueryResult>,
    subscriptions: Arc<SubscriptionTable>,
    counters: Arc<Counters>,
) {
    while let Some(result) = results.recv().await {
        let request_id = result.request_id;
        let Some(target) = user.upgrade() else {
            counters.discard(request_id, "user dropped");
            continue;
        };
        if !subscriptions.contains(&user) {
            counters.discard(request_id, "user unsubscribed");
            continue;
        }
        if !target.capabilities().receive_results {
            counters.discard(request_id, "user stopped accepting results");
            continue;
        }

        trace!(request_id, user = target.name(), rows = result.rows.len(), "delivering result");
        counters.delivered.fetch_add(1, Ordering::Relaxed);
        target.receive_result(result).await;
    }
}
