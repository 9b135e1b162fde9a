//! File-shaped records mirrored into the session directory (see the
//! runtime's directory contract). Unknown fields on these types round-trip
//! through `serde_json::Value` extras where the record format allows it;
//! missing optional fields read as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::PlannerOutput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    pub session_id: String,
    pub plan: PlannerOutput,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFile {
    pub session_id: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approval,
    Intervention,
    Retry,
    DelegationChange,
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DecisionKind,
    pub summary: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(kind: DecisionKind, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            summary: summary.into(),
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerFileStatus {
    Idle,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusFile {
    pub worker_id: String,
    pub status: WorkerFileStatus,
    pub progress: f64,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

impl WorkerStatusFile {
    pub fn idle(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            status: WorkerFileStatus::Idle,
            progress: 0.0,
            last_heartbeat: Utc::now(),
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStage {
    Analysis,
    Planning,
    Decision,
    Reflection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingRecord {
    pub stage: ThinkingStage,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ToolCall,
    CodeExecution,
    FileOperation,
    ApiCall,
    Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub summary: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApprovalFile {
    pub id: String,
    pub worker_id: String,
    pub summary: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponseFile {
    pub id: String,
    pub approved: bool,
    #[serde(default)]
    pub note: Option<String>,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Redirect,
    Pause,
    Resume,
    Abort,
    Guidance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionFile {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InterventionKind,
    pub body: String,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

impl InterventionFile {
    pub fn new(kind: InterventionKind, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            body: body.into(),
            acknowledged: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedContextFile {
    pub session_id: String,
    #[serde(default)]
    pub context: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Worker,
    Orchestrator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub worker_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Change-notification event emitted by the session file manager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventType {
    PendingApprovalCreated,
    PendingApprovalRemoved,
    WorkerStatusChanged,
    ThinkingUpdated,
    ActionCompleted,
    InterventionCreated,
    InterventionAcknowledged,
    ProgressUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub event_type: SessionEventType,
    pub session_id: String,
    #[serde(default)]
    pub worker_id: Option<String>,
    pub file_path: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
