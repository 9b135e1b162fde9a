use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStatus {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
    pub tokens: u64,
    pub tool_calls: u32,
    pub retries: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceData {
    pub trace_id: String,
    pub span_id: String,
    pub operation_name: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<String>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub metrics: TaskMetrics,
    pub trace: TraceData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResultMetadata {
    pub total_duration_ms: i64,
    pub total_tokens: u64,
    pub total_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub status: AggregationStatus,
    pub output: serde_json::Value,
    pub per_subtask: HashMap<String, TaskResult>,
    pub success_count: usize,
    pub failure_count: usize,
    pub metadata: AggregatedResultMetadata,
}
