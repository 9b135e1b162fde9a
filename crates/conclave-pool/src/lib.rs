//! Worker Pool (C5): tracks registered workers and in-flight sub-task
//! assignments, selects a worker per a configured strategy, and arms/clears
//! per-assignment timeout timers.
//!
//! State mutation is serialized behind a single `std::sync::Mutex`, per the
//! concurrency contract: the pool's maps are touched from timer callbacks
//! as well as from the assign/cancel/complete call paths, and must never be
//! observed half-updated.

mod events;
mod strategy;

pub use events::PoolEvent;
pub use strategy::SelectionStrategy;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use conclave_types::{ActiveTask, Worker, WorkerLoad, WorkerStatus};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_workers: u32,
    pub strategy: SelectionStrategy,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            strategy: SelectionStrategy::LeastLoaded,
        }
    }
}

#[derive(Debug)]
pub struct AssignResult {
    pub success: bool,
    pub worker_id: Option<String>,
    pub error: Option<String>,
}

struct ActiveTaskEntry {
    active: ActiveTask,
    timer: Option<JoinHandle<()>>,
}

struct PoolState {
    workers: HashMap<String, Worker>,
    active_tasks: HashMap<String, ActiveTaskEntry>,
    round_robin_index: usize,
    is_shutdown: bool,
}

pub struct WorkerPool {
    state: Arc<Mutex<PoolState>>,
    config: WorkerPoolConfig,
    events: broadcast::Sender<PoolEvent>,
}

impl Clone for WorkerPool {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
        }
    }
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(PoolState {
                workers: HashMap::new(),
                active_tasks: HashMap::new(),
                round_robin_index: 0,
                is_shutdown: false,
            })),
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PoolEvent) {
        let _ = self.events.send(event);
    }

    pub fn worker_count(&self) -> usize {
        self.state.lock().unwrap().workers.len()
    }

    /// Snapshot of the currently registered workers, for status surfaces
    /// that have no other way to observe pool membership.
    pub fn workers(&self) -> Vec<Worker> {
        self.state.lock().unwrap().workers.values().cloned().collect()
    }

    pub fn register(&self, worker: Worker) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.is_shutdown || state.workers.contains_key(&worker.id) {
            return false;
        }
        if state.workers.len() >= self.config.max_workers as usize {
            drop(state);
            self.emit(PoolEvent::PoolFull);
            return false;
        }
        let worker_id = worker.id.clone();
        state.workers.insert(worker_id.clone(), worker);
        drop(state);
        self.emit(PoolEvent::WorkerRegistered { worker_id });
        true
    }

    pub fn unregister(&self, id: &str) -> bool {
        let owned_subtasks: Vec<String>;
        let now_empty: bool;
        {
            let mut state = self.state.lock().unwrap();
            if state.workers.remove(id).is_none() {
                return false;
            }
            owned_subtasks = state
                .active_tasks
                .iter()
                .filter(|(_, entry)| entry.active.worker_id == id)
                .map(|(subtask_id, _)| subtask_id.clone())
                .collect();
            now_empty = state.workers.is_empty();
        }

        for subtask_id in owned_subtasks {
            self.cancel_task(&subtask_id);
        }

        self.emit(PoolEvent::WorkerUnregistered {
            worker_id: id.to_string(),
        });
        if now_empty {
            self.emit(PoolEvent::PoolEmpty);
        }
        true
    }

    pub fn update_worker_status(&self, id: &str, status: WorkerStatus, load: Option<WorkerLoad>) -> bool {
        let changed = {
            let mut state = self.state.lock().unwrap();
            match state.workers.get_mut(id) {
                None => return false,
                Some(worker) => {
                    let changed = worker.status != status;
                    worker.status = status;
                    if let Some(load) = load {
                        worker.load = Some(load);
                    }
                    changed
                }
            }
        };
        if changed {
            self.emit(PoolEvent::WorkerStatusChanged {
                worker_id: id.to_string(),
                status,
            });
        }
        true
    }

    /// Selects an idle worker per the configured strategy. For strategies
    /// other than capability-match, candidates are pre-filtered to workers
    /// matching every required capability; capability-match itself ranks
    /// idle workers by overlap ratio and may return a partial match.
    pub fn select_worker(&self, required_capabilities: Option<&[String]>) -> Option<String> {
        let required: Vec<String> = required_capabilities.map(|c| c.to_vec()).unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        if state.is_shutdown {
            return None;
        }

        let chosen = {
            let idle: Vec<&Worker> = state
                .workers
                .values()
                .filter(|w| w.status == WorkerStatus::Idle)
                .collect();
            let candidates: Vec<&Worker> = if self.config.strategy == SelectionStrategy::CapabilityMatch {
                idle
            } else {
                idle
                    .into_iter()
                    .filter(|w| w.matches_capabilities(&required))
                    .collect()
            };
            strategy::select(self.config.strategy, &candidates, &required, state.round_robin_index)
        };

        if chosen.is_some() && self.config.strategy == SelectionStrategy::RoundRobin {
            state.round_robin_index = state.round_robin_index.wrapping_add(1);
        }
        chosen
    }

    pub fn assign(
        &self,
        subtask_id: &str,
        timeout_ms: u64,
        required_capabilities: Option<&[String]>,
    ) -> AssignResult {
        let worker_id = match self.select_worker(required_capabilities) {
            Some(id) => id,
            None => {
                return AssignResult {
                    success: false,
                    worker_id: None,
                    error: Some("no available worker".to_string()),
                };
            }
        };

        {
            let mut state = self.state.lock().unwrap();
            if state.is_shutdown {
                return AssignResult {
                    success: false,
                    worker_id: None,
                    error: Some("pool is shut down".to_string()),
                };
            }
            if let Some(worker) = state.workers.get_mut(&worker_id) {
                worker.status = WorkerStatus::Busy;
                worker.current_task_id = Some(subtask_id.to_string());
            }
            state.active_tasks.insert(
                subtask_id.to_string(),
                ActiveTaskEntry {
                    active: ActiveTask {
                        subtask_id: subtask_id.to_string(),
                        worker_id: worker_id.clone(),
                        assigned_at: Utc::now(),
                        cancelled: false,
                    },
                    timer: None,
                },
            );
        }

        if timeout_ms > 0 {
            let pool = self.clone();
            let timed_subtask_id = subtask_id.to_string();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                pool.on_timeout(&timed_subtask_id);
            });
            let mut state = self.state.lock().unwrap();
            match state.active_tasks.get_mut(subtask_id) {
                Some(entry) => entry.timer = Some(handle),
                None => handle.abort(),
            }
        }

        self.emit(PoolEvent::TaskAssigned {
            subtask_id: subtask_id.to_string(),
            worker_id: worker_id.clone(),
        });
        AssignResult {
            success: true,
            worker_id: Some(worker_id),
            error: None,
        }
    }

    fn on_timeout(&self, subtask_id: &str) {
        let should_fire = {
            let state = self.state.lock().unwrap();
            state
                .active_tasks
                .get(subtask_id)
                .map(|entry| !entry.active.cancelled)
                .unwrap_or(false)
        };
        if should_fire {
            self.emit(PoolEvent::TaskTimeout {
                subtask_id: subtask_id.to_string(),
            });
            self.cancel_task(subtask_id);
        }
    }

    pub fn cancel_task(&self, subtask_id: &str) -> bool {
        let entry = {
            let mut state = self.state.lock().unwrap();
            match state.active_tasks.remove(subtask_id) {
                Some(entry) => {
                    if let Some(worker) = state.workers.get_mut(&entry.active.worker_id) {
                        worker.status = WorkerStatus::Idle;
                        worker.current_task_id = None;
                    }
                    entry
                }
                None => return false,
            }
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        self.emit(PoolEvent::TaskCancelled {
            subtask_id: subtask_id.to_string(),
        });
        true
    }

    pub fn complete_task(&self, subtask_id: &str) -> bool {
        let entry = {
            let mut state = self.state.lock().unwrap();
            match state.active_tasks.remove(subtask_id) {
                Some(entry) => {
                    if let Some(worker) = state.workers.get_mut(&entry.active.worker_id) {
                        worker.status = WorkerStatus::Idle;
                        worker.current_task_id = None;
                    }
                    entry
                }
                None => return false,
            }
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        true
    }

    pub fn shutdown(&self) {
        let (subtask_ids, worker_ids) = {
            let mut state = self.state.lock().unwrap();
            state.is_shutdown = true;
            (
                state.active_tasks.keys().cloned().collect::<Vec<_>>(),
                state.workers.keys().cloned().collect::<Vec<_>>(),
            )
        };
        for subtask_id in subtask_ids {
            self.cancel_task(&subtask_id);
        }
        for worker_id in worker_ids {
            self.unregister(&worker_id);
        }
        if self.events.receiver_count() > 0 {
            warn!("worker pool shut down with active event subscribers still attached");
        }
    }
}

/// Default worker names for the zero-worker bootstrap complement: the
/// orchestrator registers `worker-0..N-1` when a run starts against an
/// empty pool.
pub fn default_worker_names(count: u32) -> Vec<String> {
    (0..count).map(|i| format!("worker-{i}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::Worker;

    #[test]
    fn register_rejects_duplicate_id_and_at_capacity() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_workers: 1,
            strategy: SelectionStrategy::LeastLoaded,
        });
        assert!(pool.register(Worker::new("w1")));
        assert!(!pool.register(Worker::new("w1")));
        assert!(!pool.register(Worker::new("w2")));
    }

    #[test]
    fn unregister_unknown_id_fails() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        assert!(!pool.unregister("ghost"));
    }

    #[tokio::test]
    async fn assign_without_workers_fails() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let result = pool.assign("subtask-1", 0, None);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn assign_marks_worker_busy_and_complete_frees_it() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        pool.register(Worker::new("w1"));
        let result = pool.assign("subtask-1", 0, None);
        assert!(result.success);
        assert_eq!(result.worker_id.as_deref(), Some("w1"));

        assert!(pool.complete_task("subtask-1"));
        let result2 = pool.assign("subtask-2", 0, None);
        assert!(result2.success);
    }

    #[tokio::test]
    async fn cancel_task_frees_worker_and_removes_active_entry() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        pool.register(Worker::new("w1"));
        pool.assign("subtask-1", 0, None);
        assert!(pool.cancel_task("subtask-1"));
        assert!(!pool.cancel_task("subtask-1"));
        let result = pool.assign("subtask-2", 0, None);
        assert!(result.success);
    }

    #[tokio::test]
    async fn unregister_cancels_owned_active_tasks() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        pool.register(Worker::new("w1"));
        pool.assign("subtask-1", 0, None);
        assert!(pool.unregister("w1"));
        assert_eq!(pool.worker_count(), 0);
    }

    #[tokio::test]
    async fn timeout_fires_and_emits_task_timeout_then_cancelled() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        pool.register(Worker::new("w1"));
        let mut events = pool.subscribe();
        pool.assign("subtask-1", 20, None);

        let mut saw_timeout = false;
        let mut saw_cancelled = false;
        for _ in 0..6 {
            if let Ok(event) = tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
                match event {
                    Ok(PoolEvent::TaskTimeout { .. }) => saw_timeout = true,
                    Ok(PoolEvent::TaskCancelled { .. }) => saw_cancelled = true,
                    _ => {}
                }
            }
            if saw_timeout && saw_cancelled {
                break;
            }
        }
        assert!(saw_timeout);
        assert!(saw_cancelled);
    }

    #[test]
    fn default_worker_names_formats_zero_indexed() {
        assert_eq!(default_worker_names(3), vec!["worker-0", "worker-1", "worker-2"]);
    }
}
