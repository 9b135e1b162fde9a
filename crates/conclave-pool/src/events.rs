use conclave_types::WorkerStatus;

/// Change notification emitted by a `WorkerPool`. Handlers subscribe via
/// `WorkerPool::subscribe`; a lagging subscriber misses the oldest events
/// rather than blocking pool operations.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    WorkerRegistered { worker_id: String },
    WorkerUnregistered { worker_id: String },
    WorkerStatusChanged { worker_id: String, status: WorkerStatus },
    TaskAssigned { subtask_id: String, worker_id: String },
    TaskTimeout { subtask_id: String },
    TaskCancelled { subtask_id: String },
    PoolFull,
    PoolEmpty,
}
