use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEventType {
    PlanStart,
    PlanComplete,
    PlanFailed,
    SubtaskAssigned,
    SubtaskProgress,
    SubtaskComplete,
    SubtaskFailed,
    SubtaskRetrying,
    AggregateStart,
    AggregateComplete,
    CheckpointCreated,
    CheckpointRestored,
}

impl OrchestratorEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlanStart => "plan:start",
            Self::PlanComplete => "plan:complete",
            Self::PlanFailed => "plan:failed",
            Self::SubtaskAssigned => "subtask:assigned",
            Self::SubtaskProgress => "subtask:progress",
            Self::SubtaskComplete => "subtask:complete",
            Self::SubtaskFailed => "subtask:failed",
            Self::SubtaskRetrying => "subtask:retrying",
            Self::AggregateStart => "aggregate:start",
            Self::AggregateComplete => "aggregate:complete",
            Self::CheckpointCreated => "checkpoint:created",
            Self::CheckpointRestored => "checkpoint:restored",
        }
    }
}

/// `{type, taskId, subtaskId?, sessionId?, traceId?, data, timestamp}`.
/// A lagging subscriber misses the oldest events rather than blocking a run.
#[derive(Debug, Clone)]
pub struct OrchestratorEvent {
    pub event_type: OrchestratorEventType,
    pub task_id: String,
    pub subtask_id: Option<String>,
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}
