// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entry point callers talk to.
//!
//! [`Dispatcher`] owns the worker lifecycle and the subscription table.
//! Submitting a query never waits on the database: the request is queued for
//! the worker and the result arrives later through
//! [`DatabaseUser::receive_result`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use quarry_config::StorageConfig;
use quarry_core::{
    DatabaseUser, HealthStatus, Payload, QuarryError, QueryRequest, RequestId,
};
use quarry_storage::{spawn_worker, WorkerChannels, WorkerStats, WorkerStatsSnapshot};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::router::ResultRouter;
use crate::subscription::SubscriptionTable;

/// Counters reported by [`Dispatcher::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    pub running: bool,
    pub subscribers: usize,
    pub results_delivered: u64,
    pub results_dropped: u64,
    pub worker: WorkerStatsSnapshot,
}

#[derive(Default)]
struct Lifecycle {
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
    router: Option<JoinHandle<()>>,
    /// Tasks of stopped runs that may still be finishing.
    draining: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    fn retire(&mut self) {
        self.draining.extend(self.worker.take());
        self.draining.extend(self.router.take());
        self.draining.retain(|task| !task.is_finished());
    }
}

/// Asynchronous SQL query service.
pub struct Dispatcher {
    config: StorageConfig,
    subscriptions: Arc<SubscriptionTable>,
    router: Arc<ResultRouter>,
    stats: Arc<WorkerStats>,
    requests: RwLock<Option<mpsc::UnboundedSender<QueryRequest>>>,
    lifecycle: Mutex<Lifecycle>,
    starting: tokio::sync::Mutex<()>,
}

impl Dispatcher {
    pub fn new(config: StorageConfig) -> Self {
        let subscriptions = Arc::new(SubscriptionTable::new());
        Self {
            config,
            router: Arc::new(ResultRouter::new(Arc::clone(&subscriptions))),
            subscriptions,
            stats: Arc::new(WorkerStats::new()),
            requests: RwLock::new(None),
            lifecycle: Mutex::new(Lifecycle::default()),
            starting: tokio::sync::Mutex::new(()),
        }
    }

    /// Start the worker and wait until it is ready to accept requests.
    ///
    /// Calling this while already running is a no-op. After [`stop`](Self::stop)
    /// the service can be started again; the new worker gets a fresh path
    /// cache and no open connection. A worker that died on its own is
    /// replaced.
    pub async fn start(&self) -> Result<(), QuarryError> {
        let _starting = self.starting.lock().await;
        if self.is_running() {
            if !self.tasks_exited() {
                debug!("query service already running");
                return Ok(());
            }
            warn!("query worker exited unexpectedly, restarting");
            self.stop();
        }

        let cancel = CancellationToken::new();
        let WorkerChannels {
            requests,
            results,
            ready,
            task,
        } = spawn_worker(self.config.clone(), Arc::clone(&self.stats), cancel.clone());

        match ready.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log_join(task.await);
                error!(error = %err, "query worker failed to start");
                return Err(err);
            }
            Err(_) => {
                log_join(task.await);
                return Err(QuarryError::Internal(
                    "query worker exited before becoming ready".to_string(),
                ));
            }
        }

        let router = Arc::clone(&self.router).spawn(results);
        {
            let mut lifecycle = lock(&self.lifecycle);
            lifecycle.retire();
            lifecycle.cancel = Some(cancel);
            lifecycle.worker = Some(task);
            lifecycle.router = Some(router);
        }
        *self.requests.write().unwrap_or_else(PoisonError::into_inner) = Some(requests);
        info!("query service started");
        Ok(())
    }

    /// Queue `query` against `db_name` on behalf of `user`.
    ///
    /// Returns immediately. `request_id` and `data` come back untouched in the
    /// matching [`QueryResult`](quarry_core::QueryResult). Queries from users
    /// that are not subscribed, or sent while the service is stopped, are
    /// dropped with a log line.
    pub fn submit_query(
        &self,
        query: impl Into<String>,
        user: &Arc<dyn DatabaseUser>,
        request_id: RequestId,
        db_name: impl Into<String>,
        data: Option<Payload>,
    ) {
        if !self.subscriptions.is_subscribed(user) {
            warn!(user = user.name(), request_id, "query from unsubscribed user ignored");
            return;
        }

        let request = QueryRequest {
            query: query.into(),
            user: Arc::downgrade(user),
            request_id,
            db_name: db_name.into(),
            data,
        };
        let requests = self.requests.read().unwrap_or_else(PoisonError::into_inner);
        match requests.as_ref() {
            Some(tx) => {
                if tx.send(request).is_err() {
                    debug!(request_id, "query worker gone, request dropped");
                }
            }
            None => {
                let err = QuarryError::NotRunning;
                warn!(error = %err, request_id, "request dropped");
            }
        }
    }

    /// Subscribe `user`. Returns `false` if it lacks a required capability.
    pub fn subscribe(&self, user: &Arc<dyn DatabaseUser>) -> bool {
        self.subscriptions.subscribe(user)
    }

    /// Unsubscribe `user`. Results still in flight for it are dropped.
    pub fn unsubscribe(&self, user: &Arc<dyn DatabaseUser>) -> bool {
        self.subscriptions.unsubscribe(user)
    }

    pub fn is_subscribed(&self, user: &Arc<dyn DatabaseUser>) -> bool {
        self.subscriptions.is_subscribed(user)
    }

    /// Ask the worker to stop. Never blocks.
    ///
    /// Requests still queued are discarded; the one being processed finishes
    /// and its result is delivered. Use [`shutdown`](Self::shutdown) to also
    /// wait for the worker to exit.
    pub fn stop(&self) {
        let requests = self
            .requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        {
            let mut lifecycle = lock(&self.lifecycle);
            if let Some(cancel) = lifecycle.cancel.take() {
                cancel.cancel();
                info!("query service stopping");
            }
            lifecycle.retire();
        }
        // Cancel first so the worker does not mistake the closed channel for
        // a drain request.
        drop(requests);
    }

    /// Stop and wait for the worker and router tasks to finish.
    ///
    /// Users are called from their own delivery tasks, which are not joined
    /// here, so this may be awaited from inside `receive_result`.
    pub async fn shutdown(&self) {
        self.stop();
        let tasks = std::mem::take(&mut lock(&self.lifecycle).draining);
        for task in tasks {
            log_join(task.await);
        }
        info!("query service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn health(&self) -> HealthStatus {
        if !self.is_running() {
            return HealthStatus::Unhealthy("query service is not running".to_string());
        }
        if self.tasks_exited() {
            return HealthStatus::Unhealthy("query worker exited unexpectedly".to_string());
        }
        if self.stats.last_open_failed() {
            return HealthStatus::Degraded("last database open failed".to_string());
        }
        HealthStatus::Healthy
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            running: self.is_running(),
            subscribers: self.subscriptions.len(),
            results_delivered: self.router.delivered(),
            results_dropped: self.router.dropped(),
            worker: self.stats.snapshot(),
        }
    }

    /// Whether the current worker or router task has already finished.
    fn tasks_exited(&self) -> bool {
        let lifecycle = lock(&self.lifecycle);
        [&lifecycle.worker, &lifecycle.router]
            .into_iter()
            .flatten()
            .any(JoinHandle::is_finished)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "query service task ended abnormally");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
