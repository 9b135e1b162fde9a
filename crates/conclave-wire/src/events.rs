//! Server-sent event frames for `/api/execute/:id/stream`-style surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    TaskStarted,
    TaskProgress,
    TaskCompleted,
    TaskFailed,
    WorkerAssigned,
    ApprovalRequested,
    BudgetWarning,
    BudgetExceeded,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    pub session_id: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind, session_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}
