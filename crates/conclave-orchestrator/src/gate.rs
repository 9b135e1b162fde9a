//! Worker completion gate: polls `workers/<id>/status.json` and
//! `actions.jsonl` under the session directory until the worker reports a
//! terminal status, its heartbeat goes stale, the overall timeout elapses,
//! or the run is cancelled. This is the real gate the contract requires in
//! place of an immediate synthetic success.

use std::time::Duration;

use chrono::{DateTime, Utc};
use conclave_session::SessionStore;
use conclave_types::{TaskMetrics, TaskResult, TaskStatus, TraceData, WorkerFileStatus};
use tokio_util::sync::CancellationToken;

pub enum GateOutcome {
    Success(TaskResult),
    Failure(String),
    Cancelled,
}

/// Output is taken from the last recorded action's `data`, defaulting to
/// `null` if the worker never logged one.
async fn last_action_output(session: &SessionStore, worker_id: &str) -> serde_json::Value {
    match session.read_action_logs(worker_id, Some(1)).await {
        Ok(mut records) => records.pop().map(|r| r.data).unwrap_or(serde_json::Value::Null),
        Err(_) => serde_json::Value::Null,
    }
}

fn build_result(
    subtask_id: &str,
    status: TaskStatus,
    output: serde_json::Value,
    start: DateTime<Utc>,
    trace_id: &str,
) -> TaskResult {
    let end = Utc::now();
    let duration_ms = (end - start).num_milliseconds().max(0);
    TaskResult {
        task_id: subtask_id.to_string(),
        status,
        output,
        artifacts: Vec::new(),
        metrics: TaskMetrics {
            start_ms: start.timestamp_millis(),
            end_ms: end.timestamp_millis(),
            duration_ms,
            tokens: 0,
            tool_calls: 0,
            retries: 0,
        },
        trace: TraceData {
            trace_id: trace_id.to_string(),
            span_id: uuid::Uuid::new_v4().to_string(),
            operation_name: format!("subtask:{subtask_id}"),
            attributes: Default::default(),
            events: Vec::new(),
            duration_ms,
        },
    }
}

/// Polls every `poll_interval_ms` until a terminal worker status, a stale
/// heartbeat, the `timeout_ms` deadline, or cancellation. `timeout_ms == 0`
/// means no deadline.
pub async fn await_worker_completion(
    session: &SessionStore,
    worker_id: &str,
    subtask_id: &str,
    trace_id: &str,
    timeout_ms: u64,
    poll_interval_ms: u64,
    cancel: &CancellationToken,
) -> GateOutcome {
    let start = Utc::now();

    loop {
        if cancel.is_cancelled() {
            return GateOutcome::Cancelled;
        }

        match session.read_worker_status(worker_id).await {
            Ok(Some(status)) => match status.status {
                WorkerFileStatus::Success => {
                    let output = last_action_output(session, worker_id).await;
                    return GateOutcome::Success(build_result(
                        subtask_id,
                        TaskStatus::Success,
                        output,
                        start,
                        trace_id,
                    ));
                }
                WorkerFileStatus::Error => {
                    return GateOutcome::Failure(
                        status
                            .message
                            .unwrap_or_else(|| format!("worker '{worker_id}' reported an error")),
                    );
                }
                WorkerFileStatus::Idle | WorkerFileStatus::Running => {
                    if timeout_ms > 0 {
                        let heartbeat_age_ms = (Utc::now() - status.last_heartbeat).num_milliseconds();
                        if heartbeat_age_ms > timeout_ms as i64 {
                            return GateOutcome::Failure(format!(
                                "worker '{worker_id}' heartbeat stale ({heartbeat_age_ms}ms since last update)"
                            ));
                        }
                    }
                }
            },
            Ok(None) => {}
            Err(e) => return GateOutcome::Failure(format!("session read error: {e}")),
        }

        if timeout_ms > 0 {
            let elapsed_ms = (Utc::now() - start).num_milliseconds();
            if elapsed_ms > timeout_ms as i64 {
                return GateOutcome::Failure(format!("worker '{worker_id}' timed out after {timeout_ms}ms"));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(poll_interval_ms)) => {}
            _ = cancel.cancelled() => return GateOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{ActionKind, ActionRecord, WorkerStatusFile};

    async fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "session-1", 50);
        store.initialize_session().await.unwrap();
        store.register_worker("w1").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn succeeds_once_worker_reports_success() {
        let (_dir, session) = store().await;
        session
            .append_action(
                "w1",
                &ActionRecord {
                    kind: ActionKind::Message,
                    summary: "done".to_string(),
                    data: serde_json::json!({"answer": 42}),
                    timestamp: Utc::now(),
                },
            )
            .await
            .unwrap();
        session
            .write_worker_status(
                "w1",
                &WorkerStatusFile {
                    worker_id: "w1".to_string(),
                    status: WorkerFileStatus::Success,
                    progress: 1.0,
                    last_heartbeat: Utc::now(),
                    message: None,
                },
            )
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let outcome = await_worker_completion(&session, "w1", "subtask-1", "trace-1", 5000, 10, &cancel).await;
        match outcome {
            GateOutcome::Success(result) => {
                assert_eq!(result.status, TaskStatus::Success);
                assert_eq!(result.output, serde_json::json!({"answer": 42}));
            }
            _ => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn fails_when_worker_reports_error() {
        let (_dir, session) = store().await;
        session
            .write_worker_status(
                "w1",
                &WorkerStatusFile {
                    worker_id: "w1".to_string(),
                    status: WorkerFileStatus::Error,
                    progress: 0.3,
                    last_heartbeat: Utc::now(),
                    message: Some("tool crashed".to_string()),
                },
            )
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let outcome = await_worker_completion(&session, "w1", "subtask-1", "trace-1", 5000, 10, &cancel).await;
        match outcome {
            GateOutcome::Failure(msg) => assert!(msg.contains("tool crashed")),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_poll_loop() {
        let (_dir, session) = store().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = await_worker_completion(&session, "w1", "subtask-1", "trace-1", 5000, 10, &cancel).await;
        assert!(matches!(outcome, GateOutcome::Cancelled));
    }

    #[tokio::test]
    async fn stale_heartbeat_is_treated_as_failure() {
        let (_dir, session) = store().await;
        session
            .write_worker_status(
                "w1",
                &WorkerStatusFile {
                    worker_id: "w1".to_string(),
                    status: WorkerFileStatus::Running,
                    progress: 0.1,
                    last_heartbeat: Utc::now() - chrono::Duration::milliseconds(500),
                    message: None,
                },
            )
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let outcome = await_worker_completion(&session, "w1", "subtask-1", "trace-1", 100, 10, &cancel).await;
        match outcome {
            GateOutcome::Failure(msg) => assert!(msg.contains("heartbeat stale") || msg.contains("timed out")),
            _ => panic!("expected failure"),
        }
    }
}
