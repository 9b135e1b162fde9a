use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use conclave_core::config::GatewayConfig;
use conclave_orchestrator::Orchestrator;
use conclave_types::{Task, TaskResult};
use uuid::Uuid;

/// A `/api/tasks` registry entry: the task description plus, once executed
/// via `/api/execute`, its most recent result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskRecord {
    pub task: Task,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct Registry {
    tasks: Arc<Mutex<HashMap<String, TaskRecord>>>,
    executions: Arc<Mutex<Vec<TaskResult>>>,
}

impl Registry {
    pub fn insert_task(&self, task: Task) -> TaskRecord {
        let now = Utc::now();
        let record = TaskRecord {
            task: task.clone(),
            result: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.lock().unwrap().insert(task.id.clone(), record.clone());
        record
    }

    pub fn get_task(&self, id: &str) -> Option<TaskRecord> {
        self.tasks.lock().unwrap().get(id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }

    pub fn patch_task(&self, id: &str, objective: Option<String>) -> Option<TaskRecord> {
        let mut guard = self.tasks.lock().unwrap();
        let record = guard.get_mut(id)?;
        if let Some(objective) = objective {
            record.task.objective = objective;
        }
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    pub fn delete_task(&self, id: &str) -> bool {
        self.tasks.lock().unwrap().remove(id).is_some()
    }

    pub fn record_execution(&self, result: TaskResult) {
        if let Some(record) = self.tasks.lock().unwrap().get_mut(&result.task_id) {
            record.result = Some(result.clone());
            record.updated_at = Utc::now();
        }
        self.executions.lock().unwrap().push(result);
    }

    pub fn execution_history(&self) -> Vec<TaskResult> {
        self.executions.lock().unwrap().clone()
    }

    pub fn execution_by_id(&self, task_id: &str) -> Option<TaskResult> {
        self.executions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.task_id == task_id)
            .cloned()
    }
}

#[derive(Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Registry,
    pub http_client: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            registry: Registry::default(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        path == "/" || path == "/health"
    }

    pub fn new_task_id() -> String {
        format!("task-{}", Uuid::new_v4())
    }
}
