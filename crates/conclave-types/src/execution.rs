use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::result::TaskResult;

/// Orchestrator-internal bookkeeping for one `run`. Created on `run`,
/// destroyed on return.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub current_step: usize,
    pub total_steps: usize,
    pub completed_subtasks: HashMap<String, TaskResult>,
    /// Sub-task ids in completion order, for deterministic output merging.
    pub completion_order: Vec<String>,
    pub failed_subtasks: HashMap<String, String>,
    pub running_subtasks: HashSet<String>,
    pub start_time: DateTime<Utc>,
    pub total_tokens: u64,
    pub total_retries: u32,
}

impl ExecutionState {
    pub fn new(total_steps: usize) -> Self {
        Self {
            current_step: 0,
            total_steps,
            completed_subtasks: HashMap::new(),
            completion_order: Vec::new(),
            failed_subtasks: HashMap::new(),
            running_subtasks: HashSet::new(),
            start_time: Utc::now(),
            total_tokens: 0,
            total_retries: 0,
        }
    }

    pub fn mark_completed(&mut self, subtask_id: impl Into<String>, result: TaskResult) {
        let id = subtask_id.into();
        self.completed_subtasks.insert(id.clone(), result);
        self.completion_order.push(id);
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.start_time).num_milliseconds().max(0)
    }
}
