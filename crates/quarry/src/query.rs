// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `quarry query`: one round trip through the service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quarry_config::StorageConfig;
use quarry_core::{DatabaseUser, QuarryError, QueryResult, Record, RequestId};
use quarry_service::Dispatcher;
use tokio::sync::oneshot;
use tracing::debug;

const RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands the first result it receives to a waiting oneshot.
struct OneShotUser {
    tx: Mutex<Option<oneshot::Sender<QueryResult>>>,
}

#[async_trait]
impl DatabaseUser for OneShotUser {
    fn name(&self) -> &str {
        "quarry-cli"
    }

    async fn receive_result(&self, result: QueryResult) {
        let tx = self.tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(tx) = tx {
            let _ = tx.send(result);
        }
    }
}

/// Start a dispatcher, run `sql` against `db_name`, and stop again.
///
/// Failures the service absorbs (a database that cannot be opened, SQL that
/// does not prepare) surface here as errors, using the worker counters.
pub async fn run_query(
    storage: &StorageConfig,
    db_name: &str,
    request_id: RequestId,
    sql: &str,
) -> Result<Vec<Record>, QuarryError> {
    let dispatcher = Dispatcher::new(storage.clone());
    dispatcher.start().await?;

    let (tx, rx) = oneshot::channel();
    let user: Arc<dyn DatabaseUser> = Arc::new(OneShotUser {
        tx: Mutex::new(Some(tx)),
    });
    if !dispatcher.subscribe(&user) {
        return Err(QuarryError::Internal("cli user was refused".to_string()));
    }
    dispatcher.submit_query(sql, &user, request_id, db_name, None);

    let received = tokio::time::timeout(RESULT_TIMEOUT, rx).await;
    let stats = dispatcher.stats();
    dispatcher.shutdown().await;

    let result = match received {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => return Err(QuarryError::Internal("result channel closed".to_string())),
        Err(_) => return Err(QuarryError::Internal("timed out waiting for result".to_string())),
    };
    debug!(request_id = result.request_id, rows = result.rows.len(), "query answered");

    if stats.worker.open_failures > 0 {
        return Err(QuarryError::ConnectionOpen {
            db_name: db_name.to_string(),
            source: "database could not be opened, see log".into(),
        });
    }
    if stats.worker.queries_failed > 0 {
        return Err(QuarryError::QueryExecution {
            source: "query failed, see log".into(),
        });
    }
    Ok(result.rows)
}

/// Rows as a pretty-printed JSON array, columns in result order.
pub fn render_rows(rows: &[Record]) -> Result<String, QuarryError> {
    serde_json::to_string_pretty(rows).map_err(|e| QuarryError::Internal(e.to_string()))
}
