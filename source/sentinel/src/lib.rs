//! Monitoring agent runtime: the config-driven listener/handler framework,
//! the check registry and dispatch, and the managed-exporter supervisor.
//! See spec.md §4 for the module map this crate implements.

pub mod acl;
pub mod agent;
pub mod checks;
pub mod cli;
pub mod error;
pub mod http;
pub mod net;
pub mod supervisor;
pub mod task_group;

pub use agent::Agent;
pub use error::{AgentError, Result};
