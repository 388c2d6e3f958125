//! Crate-wide error type. Leaf errors live in each subsystem module
//! (`net::NetError`, `checks::CheckError`, `supervisor::SupervisorError`)
//! and compose into `AgentError` via `#[from]`, the same layering the
//! config crate uses for its own `ConfigError` (spec.md §7).

use thiserror::Error;

use crate::checks::CheckError;
use crate::net::NetError;
use crate::supervisor::SupervisorError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] sentinel_config::ConfigError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Acl(#[from] crate::acl::AclError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
