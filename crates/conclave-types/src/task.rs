use serde::{Deserialize, Serialize};

/// A caller-submitted objective. Immutable after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub objective: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Atomic,
    Composite,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// A `Task` lifted with defaults for priority/complexity at run-entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorTask {
    #[serde(flatten)]
    pub task: Task,
    pub priority: Priority,
    pub complexity: Complexity,
}

impl OrchestratorTask {
    /// Lifts a `Task`, defaulting missing priority/complexity to medium/moderate.
    pub fn from_task(task: Task) -> Self {
        let priority = task.priority.unwrap_or(Priority::Medium);
        let complexity = task.complexity.unwrap_or(Complexity::Moderate);
        Self {
            task,
            priority,
            complexity,
        }
    }
}
