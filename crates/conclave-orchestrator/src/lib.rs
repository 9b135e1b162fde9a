//! Orchestrator (C6): drives one task from planning through sub-task
//! dispatch to aggregated result, persisting every phase transition to the
//! session directory and never throwing across `run` — every internal
//! failure becomes a `failure` `TaskResult`.

mod aggregate;
mod dag;
mod events;
mod gate;
mod retry;

pub use aggregate::MergeStrategy;
pub use events::{OrchestratorEvent, OrchestratorEventType};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use conclave_planner::{plan, PlanInput, PlannerConfig};
use conclave_pool::{default_worker_names, WorkerPool, WorkerPoolConfig};
use conclave_providers::Completer;
use conclave_session::{generate_session_id, SessionStore};
use conclave_types::{
    AggregatedResult, AggregationStatus, DelegationConfig, ExecutionState, OrchestratorTask,
    ProgressFile, RetryPolicy, SubTask, Task, TaskMetrics, TaskResult, TaskStatus, TraceData,
    Worker,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::gate::{await_worker_completion, GateOutcome};
use crate::retry::{calculate_retry_delay, sleep_cancellable};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tunables that don't flow through a parsed plan: pool sizing, gate poll
/// cadence, and the aggregation policy applied once every sub-task in the
/// plan reaches a terminal state.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub root_dir: PathBuf,
    pub session_poll_interval_ms: u64,
    pub gate_poll_interval_ms: u64,
    pub pool: WorkerPoolConfig,
    pub planner: PlannerConfig,
    pub default_worker_count: u32,
    pub allow_partial_success: bool,
    pub partial_success_threshold: f64,
    pub merge_strategy: MergeStrategy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(".orchestrator-runtime"),
            session_poll_interval_ms: 500,
            gate_poll_interval_ms: 200,
            pool: WorkerPoolConfig::default(),
            planner: PlannerConfig::default(),
            default_worker_count: 3,
            allow_partial_success: true,
            partial_success_threshold: 0.5,
            merge_strategy: MergeStrategy::Merge,
        }
    }
}

fn to_task_status(status: AggregationStatus) -> TaskStatus {
    match status {
        AggregationStatus::Success => TaskStatus::Success,
        AggregationStatus::Failure => TaskStatus::Failure,
        AggregationStatus::Partial => TaskStatus::Partial,
    }
}

/// Owns the Worker Pool and the event fan-out for one orchestrator
/// instance; sessions and `ExecutionState` are created fresh per `run`.
pub struct Orchestrator {
    config: OrchestratorConfig,
    completer: Arc<dyn Completer>,
    pool: WorkerPool,
    events: Mutex<broadcast::Sender<OrchestratorEvent>>,
    active_cancel: Mutex<Option<CancellationToken>>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, completer: Arc<dyn Completer>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pool: WorkerPool::new(config.pool.clone()),
            config,
            completer,
            events: Mutex::new(events),
            active_cancel: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.lock().unwrap().subscribe()
    }

    /// The worker pool backing this orchestrator, for surfaces (gateway
    /// agent listing, admin tooling) that need read access to its
    /// membership without going through `run`.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn emit(&self, event_type: OrchestratorEventType, task_id: &str, subtask_id: Option<&str>, session_id: Option<&str>, trace_id: &str, data: serde_json::Value) {
        let sender = self.events.lock().unwrap().clone();
        let _ = sender.send(OrchestratorEvent {
            event_type,
            task_id: task_id.to_string(),
            subtask_id: subtask_id.map(|s| s.to_string()),
            session_id: session_id.map(|s| s.to_string()),
            trace_id: Some(trace_id.to_string()),
            data,
            timestamp: Utc::now(),
        });
    }

    fn failure_result(task_id: &str, trace_id: &str, start: chrono::DateTime<Utc>, message: impl Into<String>) -> TaskResult {
        let end = Utc::now();
        let duration_ms = (end - start).num_milliseconds().max(0);
        TaskResult {
            task_id: task_id.to_string(),
            status: TaskStatus::Failure,
            output: json!({ "error": message.into() }),
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
                span_id: Uuid::new_v4().to_string(),
                operation_name: format!("task:{task_id}"),
                attributes: Default::default(),
                events: Vec::new(),
                duration_ms,
            },
        }
    }

    /// `run(task, cancelSignal) -> TaskResult`. Never throws: every
    /// internal failure is converted into a `failure` `TaskResult`.
    pub async fn run(&self, task: Task, cancel: CancellationToken) -> TaskResult {
        let start = Utc::now();
        let trace_id = Uuid::new_v4().to_string();
        let task_id = task.id.clone();

        *self.active_cancel.lock().unwrap() = Some(cancel.clone());

        let session_id = generate_session_id(Utc::now().timestamp_millis().max(0) as u128);
        let session = SessionStore::new(&self.config.root_dir, &session_id, self.config.session_poll_interval_ms);
        if let Err(e) = session.initialize_session().await {
            return Self::failure_result(&task_id, &trace_id, start, format!("session init failed: {e}"));
        }

        let result = self.run_with_session(task, cancel, &session, &trace_id, start).await;
        let mut session = session;
        session.close();
        result
    }

    async fn run_with_session(
        &self,
        task: Task,
        cancel: CancellationToken,
        session: &SessionStore,
        trace_id: &str,
        start: chrono::DateTime<Utc>,
    ) -> TaskResult {
        let task_id = task.id.clone();
        let session_id = session.session_id().to_string();
        let lifted = OrchestratorTask::from_task(task);
        let mut base_task = lifted.task.clone();
        base_task.priority = Some(lifted.priority);
        base_task.complexity = Some(lifted.complexity);

        self.emit(OrchestratorEventType::PlanStart, &task_id, None, Some(&session_id), trace_id, json!({}));
        if cancel.is_cancelled() {
            self.emit(OrchestratorEventType::PlanFailed, &task_id, None, Some(&session_id), trace_id, json!({"reason": "cancelled"}));
            return Self::failure_result(&task_id, trace_id, start, "Aborted");
        }

        let plan_result = plan(self.completer.as_ref(), &self.config.planner, PlanInput::new(base_task)).await;
        if !plan_result.success {
            let message = plan_result.error.unwrap_or_else(|| "planning failed".to_string());
            self.emit(OrchestratorEventType::PlanFailed, &task_id, None, Some(&session_id), trace_id, json!({"error": message}));
            let mut result = Self::failure_result(&task_id, trace_id, start, message);
            result.metrics.tokens = plan_result.tokens_used;
            result.metrics.retries = plan_result.retry_count;
            return result;
        }

        let plan_output = plan_result.output.expect("success plan result carries output");
        if let Err(e) = dag::validate_plan_dag(&plan_output) {
            self.emit(OrchestratorEventType::PlanFailed, &task_id, None, Some(&session_id), trace_id, json!({"error": e}));
            return Self::failure_result(&task_id, trace_id, start, format!("Internal: {e}"));
        }

        let total_steps = plan_output.execution_plan.steps.len();
        if let Err(e) = session.write_plan(&plan_output).await {
            warn!(task_id = %task_id, error = %e, "failed to persist plan");
        }
        self.emit(OrchestratorEventType::PlanComplete, &task_id, None, Some(&session_id), trace_id, json!({"totalSteps": total_steps}));

        let state = Arc::new(Mutex::new(ExecutionState::new(total_steps)));
        {
            let mut guard = state.lock().unwrap();
            guard.total_tokens += plan_result.tokens_used;
            guard.total_retries += plan_result.retry_count;
        }

        let subtask_map: Arc<HashMap<String, SubTask>> = Arc::new(
            plan_output
                .subtasks
                .iter()
                .cloned()
                .map(|s| (s.id.clone(), s))
                .collect(),
        );
        let delegation: Arc<DelegationConfig> = Arc::new(plan_output.delegation.clone());

        'steps: for step in &plan_output.execution_plan.steps {
            if cancel.is_cancelled() {
                break 'steps;
            }
            {
                let mut guard = state.lock().unwrap();
                guard.current_step = step.order as usize;
            }
            let progress = ProgressFile {
                session_id: session_id.clone(),
                current_step: step.order as usize,
                total_steps,
                status: "running".to_string(),
                updated_at: Utc::now(),
            };
            if let Err(e) = session.write_progress(&progress).await {
                warn!(task_id = %task_id, error = %e, "failed to persist progress");
            }

            if step.parallel {
                let futures = step.subtask_ids.iter().map(|id| {
                    self.execute_subtask(
                        session,
                        state.clone(),
                        subtask_map.clone(),
                        id.clone(),
                        delegation.clone(),
                        trace_id.to_string(),
                        cancel.clone(),
                        session_id.clone(),
                        task_id.clone(),
                    )
                });
                futures::future::join_all(futures).await;
            } else {
                for id in &step.subtask_ids {
                    self.execute_subtask(
                        session,
                        state.clone(),
                        subtask_map.clone(),
                        id.clone(),
                        delegation.clone(),
                        trace_id.to_string(),
                        cancel.clone(),
                        session_id.clone(),
                        task_id.clone(),
                    )
                    .await;
                }
            }
        }

        self.emit(OrchestratorEventType::AggregateStart, &task_id, None, Some(&session_id), trace_id, json!({}));
        let aggregated = {
            let guard = state.lock().unwrap();
            aggregate::aggregate(
                &guard.completed_subtasks,
                &guard.completion_order,
                guard.failed_subtasks.len(),
                subtask_map.len(),
                self.config.allow_partial_success,
                self.config.partial_success_threshold,
                self.config.merge_strategy,
                guard.elapsed_ms(),
                guard.total_tokens,
                guard.total_retries,
            )
        };
        self.emit(
            OrchestratorEventType::AggregateComplete,
            &task_id,
            None,
            Some(&session_id),
            trace_id,
            json!({"status": format!("{:?}", aggregated.status)}),
        );

        let final_progress = ProgressFile {
            session_id: session_id.clone(),
            current_step: total_steps,
            total_steps,
            status: "complete".to_string(),
            updated_at: Utc::now(),
        };
        if let Err(e) = session.write_progress(&final_progress).await {
            warn!(task_id = %task_id, error = %e, "failed to persist final progress");
        }

        self.build_task_result(&task_id, trace_id, start, aggregated)
    }

    fn build_task_result(&self, task_id: &str, trace_id: &str, start: chrono::DateTime<Utc>, aggregated: AggregatedResult) -> TaskResult {
        let end = Utc::now();
        let duration_ms = (end - start).num_milliseconds().max(0);
        let artifacts: Vec<String> = aggregated
            .per_subtask
            .values()
            .flat_map(|r| r.artifacts.iter().cloned())
            .collect();
        TaskResult {
            task_id: task_id.to_string(),
            status: to_task_status(aggregated.status),
            output: aggregated.output,
            artifacts,
            metrics: TaskMetrics {
                start_ms: start.timestamp_millis(),
                end_ms: end.timestamp_millis(),
                duration_ms,
                tokens: aggregated.metadata.total_tokens,
                tool_calls: 0,
                retries: aggregated.metadata.total_retries,
            },
            trace: TraceData {
                trace_id: trace_id.to_string(),
                span_id: Uuid::new_v4().to_string(),
                operation_name: format!("task:{task_id}"),
                attributes: Default::default(),
                events: vec!["plan".to_string(), "assign".to_string(), "aggregate".to_string()],
                duration_ms,
            },
        }
    }

    /// Dependency gate, retry loop (assign failure and worker-completion
    /// failure/timeout share a retry budget), and the default-complement
    /// bootstrap when the pool starts out empty.
    #[allow(clippy::too_many_arguments)]
    async fn execute_subtask(
        &self,
        session: &SessionStore,
        state: Arc<Mutex<ExecutionState>>,
        subtask_map: Arc<HashMap<String, SubTask>>,
        subtask_id: String,
        delegation: Arc<DelegationConfig>,
        trace_id: String,
        cancel: CancellationToken,
        session_id: String,
        task_id: String,
    ) {
        let Some(subtask) = subtask_map.get(&subtask_id) else {
            let mut guard = state.lock().unwrap();
            guard.failed_subtasks.insert(subtask_id.clone(), "unknown subtask id".to_string());
            return;
        };

        {
            let guard = state.lock().unwrap();
            for dep in &subtask.dependencies {
                if !guard.completed_subtasks.contains_key(dep) {
                    drop(guard);
                    let mut guard = state.lock().unwrap();
                    guard.failed_subtasks.insert(
                        subtask_id.clone(),
                        format!("Dependency {dep} not completed"),
                    );
                    return;
                }
            }
        }

        {
            let mut guard = state.lock().unwrap();
            guard.running_subtasks.insert(subtask_id.clone());
        }
        self.emit(
            OrchestratorEventType::SubtaskAssigned,
            &task_id,
            Some(&subtask_id),
            Some(&session_id),
            &trace_id,
            json!({}),
        );

        let retry_policy: RetryPolicy = delegation.retry_policy.clone();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                self.mark_failed(&state, &subtask_id, "Aborted");
                return;
            }

            if self.pool.worker_count() == 0 {
                let planned = if delegation.worker_count > 0 {
                    delegation.worker_count
                } else {
                    self.config.default_worker_count
                };
                let count = planned.min(self.config.pool.max_workers).max(1);
                for name in default_worker_names(count) {
                    self.pool.register(Worker::new(&name));
                    if let Err(e) = session.register_worker(&name).await {
                        warn!(worker_id = %name, error = %e, "failed to register worker in session");
                    }
                }
            }

            let assign_result = self.pool.assign(&subtask_id, delegation.timeout_ms, None);
            if !assign_result.success {
                if retry_policy.should_retry(attempt) {
                    attempt += 1;
                    self.note_retry(&state, &task_id, &subtask_id, &session_id, &trace_id, attempt);
                    let delay = calculate_retry_delay(&retry_policy, attempt);
                    if sleep_cancellable(delay, &cancel).await.is_err() {
                        self.mark_failed(&state, &subtask_id, "Aborted");
                        return;
                    }
                    continue;
                }
                let error = assign_result.error.unwrap_or_else(|| "assignment failed".to_string());
                self.mark_failed(&state, &subtask_id, &error);
                self.emit(
                    OrchestratorEventType::SubtaskFailed,
                    &task_id,
                    Some(&subtask_id),
                    Some(&session_id),
                    &trace_id,
                    json!({"error": error}),
                );
                return;
            }

            let worker_id = assign_result.worker_id.expect("assign success carries a worker id");
            let outcome = await_worker_completion(
                session,
                &worker_id,
                &subtask_id,
                &trace_id,
                delegation.timeout_ms,
                self.config.gate_poll_interval_ms,
                &cancel,
            )
            .await;

            match outcome {
                GateOutcome::Success(result) => {
                    self.pool.complete_task(&subtask_id);
                    {
                        let mut guard = state.lock().unwrap();
                        guard.running_subtasks.remove(&subtask_id);
                        guard.total_tokens += result.metrics.tokens;
                        guard.mark_completed(subtask_id.clone(), result);
                    }
                    self.emit(
                        OrchestratorEventType::SubtaskComplete,
                        &task_id,
                        Some(&subtask_id),
                        Some(&session_id),
                        &trace_id,
                        json!({"workerId": worker_id}),
                    );
                    return;
                }
                GateOutcome::Cancelled => {
                    self.pool.cancel_task(&subtask_id);
                    self.mark_failed(&state, &subtask_id, "Aborted");
                    return;
                }
                GateOutcome::Failure(message) => {
                    self.pool.cancel_task(&subtask_id);
                    if retry_policy.should_retry(attempt) {
                        attempt += 1;
                        self.note_retry(&state, &task_id, &subtask_id, &session_id, &trace_id, attempt);
                        let delay = calculate_retry_delay(&retry_policy, attempt);
                        if sleep_cancellable(delay, &cancel).await.is_err() {
                            self.mark_failed(&state, &subtask_id, "Aborted");
                            return;
                        }
                        continue;
                    }
                    self.mark_failed(&state, &subtask_id, &message);
                    self.emit(
                        OrchestratorEventType::SubtaskFailed,
                        &task_id,
                        Some(&subtask_id),
                        Some(&session_id),
                        &trace_id,
                        json!({"error": message}),
                    );
                    return;
                }
            }
        }
    }

    fn mark_failed(&self, state: &Arc<Mutex<ExecutionState>>, subtask_id: &str, message: &str) {
        let mut guard = state.lock().unwrap();
        guard.running_subtasks.remove(subtask_id);
        guard.failed_subtasks.insert(subtask_id.to_string(), message.to_string());
    }

    #[allow(clippy::too_many_arguments)]
    fn note_retry(
        &self,
        state: &Arc<Mutex<ExecutionState>>,
        task_id: &str,
        subtask_id: &str,
        session_id: &str,
        trace_id: &str,
        attempt: u32,
    ) {
        {
            let mut guard = state.lock().unwrap();
            guard.total_retries += 1;
        }
        self.emit(
            OrchestratorEventType::SubtaskRetrying,
            task_id,
            Some(subtask_id),
            Some(session_id),
            trace_id,
            json!({"attempt": attempt}),
        );
        info!(task_id, subtask_id, attempt, "retrying sub-task");
    }

    /// Resolves the active run's cancel signal (if any), shuts the pool
    /// down, and clears event listeners by replacing the broadcast channel.
    pub fn stop(&self) {
        if let Some(cancel) = self.active_cancel.lock().unwrap().take() {
            cancel.cancel();
        }
        self.pool.shutdown();
        let (fresh, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        *self.events.lock().unwrap() = fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_providers::MockCompleter;
    use conclave_session::SessionStore;
    use conclave_types::{ActionKind, ActionRecord, TaskKind, WorkerFileStatus, WorkerStatus, WorkerStatusFile};
    use std::collections::HashSet;
    use std::time::Duration;

    /// Stands in for a real worker process during tests: watches the pool
    /// for busy workers and, for each sub-task it hasn't serviced yet,
    /// writes a terminal `Success` status plus an action record to the
    /// session directory — the only way `await_worker_completion` (the real
    /// gate; §9 open question) ever observes a sub-task as finished.
    fn spawn_worker_driver(
        orchestrator: Arc<Orchestrator>,
        root_dir: std::path::PathBuf,
        mut driver_events: broadcast::Receiver<OrchestratorEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let session_id = loop {
                match driver_events.recv().await {
                    Ok(event) if event.event_type == OrchestratorEventType::PlanComplete => {
                        break event.session_id.expect("plan:complete always carries a session id");
                    }
                    Ok(_) => continue,
                    Err(_) => return,
                }
            };
            let session = SessionStore::new(&root_dir, &session_id, 5);
            let mut serviced: HashSet<String> = HashSet::new();
            loop {
                for worker in orchestrator.pool().workers() {
                    let Some(task_id) = worker.current_task_id.clone() else { continue };
                    if worker.status != WorkerStatus::Busy || !serviced.insert(task_id) {
                        continue;
                    }
                    let _ = session
                        .append_action(
                            &worker.id,
                            &ActionRecord {
                                kind: ActionKind::Message,
                                summary: "sub-task complete".to_string(),
                                data: serde_json::Value::Null,
                                timestamp: Utc::now(),
                            },
                        )
                        .await;
                    let _ = session
                        .write_worker_status(
                            &worker.id,
                            &WorkerStatusFile {
                                worker_id: worker.id.clone(),
                                status: WorkerFileStatus::Success,
                                progress: 1.0,
                                last_heartbeat: Utc::now(),
                                message: None,
                            },
                        )
                        .await;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    }

    fn task(id: &str, objective: &str) -> Task {
        Task {
            id: id.to_string(),
            kind: TaskKind::Composite,
            objective: objective.to_string(),
            constraints: Vec::new(),
            output_schema: None,
            priority: None,
            complexity: None,
        }
    }

    fn valid_plan_json() -> &'static str {
        r#"{
            "reasoning": "two steps",
            "subtasks": [
                {"id": "subtask-1", "objective": "a", "constraints": [], "estimatedMinutes": 1, "dependencies": []},
                {"id": "subtask-2", "objective": "b", "constraints": [], "estimatedMinutes": 1, "dependencies": ["subtask-1"]}
            ],
            "executionPlan": {
                "isParallel": false,
                "steps": [
                    {"order": 1, "subtaskIds": ["subtask-1"], "parallel": false},
                    {"order": 2, "subtaskIds": ["subtask-2"], "parallel": false}
                ]
            },
            "estimatedTotalMinutes": 2,
            "complexityScore": 3
        }"#
    }

    fn test_config(dir: &std::path::Path) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::default();
        config.root_dir = dir.to_path_buf();
        config.gate_poll_interval_ms = 5;
        config.session_poll_interval_ms = 5000;
        config
    }

    #[tokio::test]
    async fn happy_plan_serial_execution_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(MockCompleter::new("mock"));
        completer.queue_response(valid_plan_json().to_string());

        let orchestrator = Arc::new(Orchestrator::new(test_config(dir.path()), completer));
        let mut events = orchestrator.subscribe();
        let driver = spawn_worker_driver(orchestrator.clone(), dir.path().to_path_buf(), orchestrator.subscribe());

        let result = orchestrator.run(task("t1", "build feature X"), CancellationToken::new()).await;
        driver.abort();

        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.output, json!([serde_json::Value::Null, serde_json::Value::Null]));

        let mut complete_count = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event.event_type, OrchestratorEventType::SubtaskComplete) {
                complete_count += 1;
            }
        }
        assert_eq!(complete_count, 2);
    }

    #[tokio::test]
    async fn cyclic_plan_is_rejected_before_dispatch() {
        // The parser's own graph validation (C3) rejects a cyclic plan before
        // the planner ever returns success, so the orchestrator never reaches
        // the pool. This exercises that the rejection surfaces as a failure
        // `TaskResult` without dispatching any sub-task.
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(MockCompleter::new("mock"));
        let cyclic = r#"{
            "reasoning": "cycle",
            "subtasks": [
                {"id": "a", "objective": "a", "constraints": [], "estimatedMinutes": 1, "dependencies": ["b"]},
                {"id": "b", "objective": "b", "constraints": [], "estimatedMinutes": 1, "dependencies": ["a"]}
            ],
            "executionPlan": {"isParallel": true, "steps": [{"order": 1, "subtaskIds": ["a", "b"], "parallel": true}]},
            "estimatedTotalMinutes": 2,
            "complexityScore": 3
        }"#;
        completer.queue_response(cyclic.to_string());

        let orchestrator = Orchestrator::new(test_config(dir.path()), completer);
        let result = orchestrator.run(task("t1", "x"), CancellationToken::new()).await;
        assert_eq!(result.status, TaskStatus::Failure);
        assert!(result.output["error"].as_str().unwrap().contains("Circular dependency"));
        assert_eq!(orchestrator.pool.worker_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_plan_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(MockCompleter::new("mock"));
        let orchestrator = Orchestrator::new(test_config(dir.path()), completer);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = orchestrator.run(task("t1", "x"), cancel).await;
        assert_eq!(result.status, TaskStatus::Failure);
        assert_eq!(result.output["error"], json!("Aborted"));
    }

    #[tokio::test]
    async fn dependency_not_completed_fails_without_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let completer = Arc::new(MockCompleter::new("mock"));
        let plan_with_dangling_dep = r#"{
            "reasoning": "bad",
            "subtasks": [
                {"id": "subtask-1", "objective": "a", "constraints": [], "estimatedMinutes": 1, "dependencies": ["ghost"]}
            ],
            "executionPlan": {"isParallel": false, "steps": [{"order": 1, "subtaskIds": ["subtask-1"], "parallel": false}]},
            "estimatedTotalMinutes": 1,
            "complexityScore": 1
        }"#;
        completer.queue_response(plan_with_dangling_dep.to_string());
        let orchestrator = Orchestrator::new(test_config(dir.path()), completer);
        let result = orchestrator.run(task("t1", "x"), CancellationToken::new()).await;
        assert_eq!(result.status, TaskStatus::Failure);
    }
}
