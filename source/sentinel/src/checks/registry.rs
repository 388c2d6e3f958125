//! The check registry (spec.md §4.5): available checks keyed by name, each
//! gated to the platforms it actually runs on. Mirrors the teacher's
//! factory-map registry shape (`source/motya/src/proxy/filters/registry.rs`).

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::dispatch::CheckArgs;
use super::result::{CheckResult, CheckState};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("unknown check {0:?}")]
    UnknownCheck(String),
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("failed to run {0}: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    Darwin,
    All,
}

impl Platform {
    pub fn matches_current(self) -> bool {
        match self {
            Self::All => true,
            Self::Linux => cfg!(target_os = "linux"),
            Self::Windows => cfg!(target_os = "windows"),
            Self::Darwin => cfg!(target_os = "macos"),
        }
    }
}

/// Static declaration a check's factory returns: CLI help text and the
/// platform gate. Mirrors the corpus's `CheckData`.
pub struct CheckDeclaration {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub platform: Platform,
}

pub trait Check: Send + Sync {
    fn declare(&self) -> CheckDeclaration;
    fn run(&self, args: &CheckArgs) -> Result<CheckResult, CheckError>;
}

type CheckFactory = Arc<dyn Fn() -> Box<dyn Check> + Send + Sync>;

#[derive(Default, Clone)]
pub struct CheckRegistry {
    factories: HashMap<String, CheckFactory>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, factory: impl Fn() -> Box<dyn Check> + Send + Sync + 'static) {
        if self.factories.insert(name.to_string(), Arc::new(factory)).is_some() {
            tracing::warn!(check = name, "check factory was overwritten");
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds and runs the named check, applying the platform gate first.
    /// A check not implemented for the running platform reports OK rather
    /// than erroring, mirroring `check_pdh`'s behavior on a non-Windows
    /// build in the original implementation.
    pub fn run(&self, name: &str, args: &CheckArgs) -> Result<CheckResult, CheckError> {
        let factory = self.factories.get(name).ok_or_else(|| CheckError::UnknownCheck(name.to_string()))?;
        let check = factory();
        let decl = check.declare();
        if !decl.platform.matches_current() {
            return Ok(CheckResult::new(CheckState::Ok, format!("{} is not supported on this platform", decl.name)));
        }
        check.run(args)
    }
}
