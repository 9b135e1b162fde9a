use serde::{Deserialize, Serialize};

use crate::delegation::DelegationConfig;
use crate::subtask::SubTask;

/// A single batch of sub-task ids executed serially or in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// 1-based order.
    pub order: u32,
    pub subtask_ids: Vec<String>,
    pub parallel: bool,
}

/// An ordered list of `ExecutionStep`s.
///
/// Invariant: every sub-task id in any step exists in the sub-task set; no
/// sub-task id appears in more than one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
    pub is_parallel: bool,
}

impl ExecutionPlan {
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }
}

/// The planner's complete output for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub task_id: String,
    pub subtasks: Vec<SubTask>,
    pub delegation: DelegationConfig,
    pub execution_plan: ExecutionPlan,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub total_duration_estimate_ms: Option<u64>,
    #[serde(default)]
    pub token_estimate: Option<u64>,
}
