use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while parsing, including, or semantically validating a
/// configuration tree. `Display` renders the exact wording the agent logs
/// and the wording tests assert against; `Diagnostic` layers richer
/// source-span reporting on top for the CLI's pretty-print path.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config error in {file}:{line}: unclosed quotes")]
    UnclosedQuotes { file: String, line: usize },

    #[error("config error in {file}:{line}: section header malformed")]
    MalformedSection { file: String, line: usize },

    #[error("include cycle detected at {path}")]
    IncludeCycle { path: String },

    #[error("cannot read include {path}: {reason}")]
    CannotReadInclude { path: String, reason: String },

    #[error("unknown section {path}")]
    UnknownSection { path: String },
}

impl ConfigError {
    pub fn unclosed_quotes(file: impl Into<String>, line: usize) -> Self {
        Self::UnclosedQuotes { file: file.into(), line }
    }

    pub fn cannot_read_include(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::CannotReadInclude {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn include_cycle(path: &std::path::Path) -> Self {
        Self::IncludeCycle { path: path.display().to_string() }
    }
}

/// Result alias used throughout the config crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
