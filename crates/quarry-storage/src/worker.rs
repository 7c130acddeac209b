// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The query worker: the one execution context that touches the database.
//!
//! Requests are taken from an unbounded channel and processed to completion
//! one at a time, in FIFO order. Results go out over a second unbounded
//! channel to the router. Connection and execution failures never leave the
//! worker: they are logged and the caller gets an empty row list.

use std::sync::{Arc, Weak};

use quarry_config::StorageConfig;
use quarry_core::{DatabaseUser, QuarryError, QueryRequest, QueryResult};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::DatabaseConnection;
use crate::paths::{PathPolicy, PathResolver};
use crate::stats::WorkerStats;

/// A finished request on its way to the router.
pub struct CompletedQuery {
    pub result: QueryResult,
    pub user: Weak<dyn DatabaseUser>,
}

/// Endpoints of a freshly spawned worker.
pub struct WorkerChannels {
    /// Submission side of the request queue.
    pub requests: mpsc::UnboundedSender<QueryRequest>,
    /// Completed results, in completion order.
    pub results: mpsc::UnboundedReceiver<CompletedQuery>,
    /// Resolves once the worker has built its state (or failed to).
    pub ready: oneshot::Receiver<Result<(), QuarryError>>,
    pub task: JoinHandle<()>,
}

/// Spawn the worker task on the current tokio runtime.
///
/// The path cache and connection are created inside the task and dropped
/// when it ends, so each start gets a fresh cache.
pub fn spawn_worker(
    config: StorageConfig,
    stats: Arc<WorkerStats>,
    cancel: CancellationToken,
) -> WorkerChannels {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let policy = match PathPolicy::from_config(&config) {
            Ok(policy) => policy,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let worker = Worker {
            connection: DatabaseConnection::new(&config.synchronous, Arc::clone(&stats)),
            resolver: PathResolver::new(policy, Arc::clone(&stats)),
            requests: request_rx,
            results: result_tx,
            cancel,
            stats,
        };
        debug!(policy = ?worker.resolver.policy(), "query worker ready");
        if ready_tx.send(Ok(())).is_err() {
            // Whoever started us is gone; nothing will ever be submitted.
            return;
        }
        worker.run().await;
    });

    WorkerChannels {
        requests: request_tx,
        results: result_rx,
        ready: ready_rx,
        task,
    }
}

/// Worker state. Everything here is exclusive to the worker task.
pub struct Worker {
    connection: DatabaseConnection,
    resolver: PathResolver,
    requests: mpsc::UnboundedReceiver<QueryRequest>,
    results: mpsc::UnboundedSender<CompletedQuery>,
    cancel: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Process requests until cancelled or until every sender is dropped.
    ///
    /// Cancellation is checked before each dequeue: a request already being
    /// processed finishes (and its result is forwarded), anything still queued
    /// is discarded without a result.
    pub async fn run(mut self) {
        info!("query worker started");
        loop {
            let request = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let completed = self.process(request).await;
            if self.results.send(completed).is_err() {
                debug!("result router is gone, dropping result");
            }
        }

        self.requests.close();
        let mut discarded = 0u64;
        while self.requests.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            self.stats.record_discarded(discarded);
            info!(discarded, "discarded queued requests on stop");
        }

        self.connection.close().await;
        info!("query worker stopped");
    }

    async fn process(&mut self, request: QueryRequest) -> CompletedQuery {
        let QueryRequest {
            query,
            user,
            request_id,
            db_name,
            data,
        } = request;
        debug!(request_id, db_name = %db_name, "processing query");

        if self.connection.current_db_name() != Some(db_name.as_str())
            && let Err(e) = self.connection.switch_to(&db_name, &mut self.resolver).await
        {
            warn!(request_id, db_name = %db_name, error = %e, "could not open database");
        }

        let rows = if self.connection.is_open() {
            match self.connection.execute(&query).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(
                        request_id,
                        db_name = %db_name,
                        query = %query,
                        error = %e,
                        "query failed, check the SQL"
                    );
                    Vec::new()
                }
            }
        } else {
            debug!(request_id, db_name = %db_name, "no open connection, skipping execution");
            Vec::new()
        };

        CompletedQuery {
            result: QueryResult {
                rows,
                request_id,
                data,
            },
            user,
        }
    }
}
