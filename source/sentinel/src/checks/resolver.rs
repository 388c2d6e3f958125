//! Resolves and executes the external system utilities a check shells out
//! to (spec.md §4.5). Production code uses [`RealSystemUtility`], which
//! searches `PATH`; tests substitute canned stdout per utility name,
//! mirroring the corpus's `MockSystemUtilities` test helper without
//! actually spawning a process.

use std::path::{Path, PathBuf};

use super::registry::CheckError;

pub trait SystemUtility: Send + Sync {
    /// Runs `name` with `args` and returns its captured stdout.
    fn capture(&self, name: &str, args: &[&str]) -> Result<String, CheckError>;
}

#[derive(Debug, Clone, Default)]
pub struct RealSystemUtility;

impl SystemUtility for RealSystemUtility {
    fn capture(&self, name: &str, args: &[&str]) -> Result<String, CheckError> {
        let path = resolve_on_path(name)?;
        let output = std::process::Command::new(&path)
            .args(args)
            .output()
            .map_err(|e| CheckError::CommandFailed(name.to_string(), e))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub fn resolve_on_path(name: &str) -> Result<PathBuf, CheckError> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }
    Err(CheckError::CommandNotFound(name.to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
pub struct FakeSystemUtility {
    outputs: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl FakeSystemUtility {
    pub fn new(outputs: &[(&str, &str)]) -> Self {
        Self { outputs: outputs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }
    }
}

#[cfg(test)]
impl SystemUtility for FakeSystemUtility {
    fn capture(&self, name: &str, _args: &[&str]) -> Result<String, CheckError> {
        self.outputs.get(name).cloned().ok_or_else(|| CheckError::CommandNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_on_path_fails_for_unknown_binary() {
        assert!(resolve_on_path("definitely-not-a-real-binary-xyz").is_err());
    }

    #[test]
    fn fake_utility_returns_canned_output_by_name() {
        let fake = FakeSystemUtility::new(&[("timedatectl", "Server: example.org")]);
        assert_eq!(fake.capture("timedatectl", &[]).unwrap(), "Server: example.org");
        assert!(fake.capture("chronyc", &[]).is_err());
    }
}
