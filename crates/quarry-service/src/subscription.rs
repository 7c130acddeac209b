// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The table of users allowed to submit queries and receive results.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use quarry_core::{DatabaseUser, QuarryError, UserKey};
use tracing::{debug, warn};

/// Subscribed users, keyed by identity and held weakly.
///
/// Mutated from any caller context; read by the router on every delivery.
#[derive(Default)]
pub struct SubscriptionTable {
    entries: DashMap<UserKey, Weak<dyn DatabaseUser>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user` if it reports both required capabilities.
    ///
    /// Subscribing the same user twice keeps a single entry and returns `true`.
    pub fn subscribe(&self, user: &Arc<dyn DatabaseUser>) -> bool {
        let capabilities = user.capabilities();
        if !capabilities.is_complete() {
            let err = QuarryError::CapabilityMismatch {
                user: user.name().to_string(),
                missing: capabilities.missing(),
            };
            warn!(error = %err, "subscription refused");
            return false;
        }

        // Entries of dropped users only pin their allocation; clear them out.
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        self.entries.insert(UserKey::of(user), Arc::downgrade(user));
        debug!(user = user.name(), "user subscribed");
        true
    }

    /// Remove `user`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, user: &Arc<dyn DatabaseUser>) -> bool {
        let removed = self.entries.remove(&UserKey::of(user)).is_some();
        if removed {
            debug!(user = user.name(), "user unsubscribed");
        }
        removed
    }

    pub fn is_subscribed(&self, user: &Arc<dyn DatabaseUser>) -> bool {
        self.contains(&Arc::downgrade(user))
    }

    /// Whether the user behind a weak handle is currently subscribed.
    pub fn contains(&self, user: &Weak<dyn DatabaseUser>) -> bool {
        self.entries
            .get(&UserKey::of_weak(user))
            .is_some_and(|entry| Weak::ptr_eq(entry.value(), user))
    }

    /// Number of subscribed users that are still alive.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_test_utils::{IncapableUser, RecordingUser};

    #[test]
    fn subscribe_and_unsubscribe() {
        let table = SubscriptionTable::new();
        let user: Arc<dyn DatabaseUser> = Arc::new(RecordingUser::new("alice"));

        assert!(!table.is_subscribed(&user));
        assert!(table.subscribe(&user));
        assert!(table.is_subscribed(&user));
        assert_eq!(table.len(), 1);

        assert!(table.unsubscribe(&user));
        assert!(!table.is_subscribed(&user));
        assert!(!table.unsubscribe(&user), "second unsubscribe reports absence");
    }

    #[test]
    fn duplicate_subscription_is_one_entry() {
        let table = SubscriptionTable::new();
        let user: Arc<dyn DatabaseUser> = Arc::new(RecordingUser::new("bob"));
        assert!(table.subscribe(&user));
        assert!(table.subscribe(&user));
        assert_eq!(table.len(), 1);
        assert!(table.unsubscribe(&user));
        assert!(table.is_empty());
    }

    #[test]
    fn capability_mismatch_is_refused() {
        let table = SubscriptionTable::new();
        let no_receive: Arc<dyn DatabaseUser> = Arc::new(IncapableUser::without_receive());
        let no_submit: Arc<dyn DatabaseUser> = Arc::new(IncapableUser::without_submit());

        assert!(!table.subscribe(&no_receive));
        assert!(!table.subscribe(&no_submit));
        assert!(table.is_empty());
    }

    #[test]
    fn dropped_user_no_longer_counts() {
        let table = SubscriptionTable::new();
        let user: Arc<dyn DatabaseUser> = Arc::new(RecordingUser::new("gone"));
        let weak = Arc::downgrade(&user);
        assert!(table.subscribe(&user));
        drop(user);

        assert_eq!(table.len(), 0);
        // The entry itself is still there until pruned, but cannot be upgraded.
        assert!(table.contains(&weak));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn distinct_users_are_distinct_entries() {
        let table = SubscriptionTable::new();
        let a: Arc<dyn DatabaseUser> = Arc::new(RecordingUser::new("a"));
        let b: Arc<dyn DatabaseUser> = Arc::new(RecordingUser::new("b"));
        assert!(table.subscribe(&a));
        assert!(!table.is_subscribed(&b));
        assert!(table.subscribe(&b));
        assert_eq!(table.len(), 2);
        assert!(table.unsubscribe(&a));
        assert!(table.is_subscribed(&b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_unsubscribe() {
        let table = Arc::new(SubscriptionTable::new());
        let shared: Arc<dyn DatabaseUser> = Arc::new(RecordingUser::new("shared"));

        let tasks: Vec<_> = (0..8)
            .map(|task| {
                let table = Arc::clone(&table);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let users: Vec<Arc<dyn DatabaseUser>> = (0..50)
                        .map(|i| {
                            Arc::new(RecordingUser::new(format!("u{task}-{i}")))
                                as Arc<dyn DatabaseUser>
                        })
                        .collect();
                    for user in &users {
                        assert!(table.subscribe(user));
                        table.subscribe(&shared);
                    }
                    for user in users.iter().step_by(2) {
                        assert!(table.unsubscribe(user));
                        table.unsubscribe(&shared);
                    }
                    users
                })
            })
            .collect();

        let mut kept = Vec::new();
        for task in tasks {
            kept.push(task.await.unwrap());
        }

        for (i, user) in kept.iter().flatten().enumerate() {
            assert_eq!(table.is_subscribed(user), i % 2 == 1);
        }
        table.unsubscribe(&shared);
        assert_eq!(table.len(), 8 * 25);
        assert!(table.subscribe(&shared));
        assert_eq!(table.len(), 8 * 25 + 1);
    }
}
