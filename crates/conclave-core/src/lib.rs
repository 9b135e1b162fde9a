//! Ambient stack shared by every Conclave crate: the error taxonomy and the
//! layered configuration store.

pub mod config;
pub mod error;

pub use config::{AppConfig, ConfigStore};
pub use error::{ConclaveError, Result};
