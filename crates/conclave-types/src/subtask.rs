use serde::{Deserialize, Serialize};

use crate::result::TaskResult;

/// A planner-produced unit of work, owned by the orchestrator for the
/// duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Stable id, format `subtask-N`.
    pub id: String,
    pub parent_task_id: String,
    pub objective: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Estimated duration, milliseconds.
    #[serde(default)]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub state: SubTaskState,
    #[serde(default)]
    pub assigned_worker_id: Option<String>,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

impl SubTask {
    pub fn new(id: impl Into<String>, parent_task_id: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_task_id: parent_task_id.into(),
            objective: objective.into(),
            constraints: Vec::new(),
            estimated_duration_ms: 0,
            dependencies: Vec::new(),
            state: SubTaskState::Pending,
            assigned_worker_id: None,
            result: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskState {
    Pending,
    Assigned,
    Running,
    Success,
    Failure,
    Retrying,
    Cancelled,
}
