use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Draining,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct WorkerLoad {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub queued_tasks: u32,
}

impl WorkerLoad {
    /// `0.4*cpu + 0.3*memory + 0.3*(10*queued)`, lower is less loaded.
    pub fn score(&self) -> f64 {
        0.4 * self.cpu_pct + 0.3 * self.memory_pct + 0.3 * (10.0 * self.queued_tasks as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub status: WorkerStatus,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default)]
    pub load: Option<WorkerLoad>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub last_heartbeat: DateTime<Utc>,
}

impl Worker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: WorkerStatus::Idle,
            current_task_id: None,
            load: None,
            capabilities: Vec::new(),
            last_heartbeat: Utc::now(),
        }
    }

    pub fn matches_capabilities(&self, required: &[String]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }
}

/// Pool-internal binding from a sub-task to the worker executing it.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub subtask_id: String,
    pub worker_id: String,
    pub assigned_at: DateTime<Utc>,
    pub cancelled: bool,
}
