use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConclaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, ConclaveError>;
