//! Shared data model for the Conclave multi-agent orchestration runtime.

pub mod delegation;
pub mod execution;
pub mod jwt;
pub mod plan;
pub mod result;
pub mod session_records;
pub mod subtask;
pub mod task;
pub mod worker;

pub use delegation::{DelegationConfig, DelegationMode, RetryPolicy};
pub use execution::ExecutionState;
pub use jwt::JwtClaims;
pub use plan::{ExecutionPlan, ExecutionStep, PlannerOutput};
pub use result::{AggregatedResult, AggregationStatus, TaskMetrics, TaskResult, TaskStatus, TraceData};
pub use session_records::*;
pub use subtask::{SubTask, SubTaskState};
pub use task::{Complexity, OrchestratorTask, Priority, Task, TaskKind};
pub use worker::{ActiveTask, Worker, WorkerLoad, WorkerStatus};
