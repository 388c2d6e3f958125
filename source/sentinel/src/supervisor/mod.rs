//! Managed exporter supervisor (spec.md §4.6): spawns and restarts an
//! external metrics-exporting binary, watches its RSS against a configured
//! limit, and classifies its stderr into the agent's own log stream.
//!
//! **Grounding.** The spawn/wait/sleep-3s/loop shape and the stderr
//! classifier (`level=info` → debug, `level=debug` → trace, else error)
//! port the original implementation's `HandlerManagedExporter.procMainLoop`
//! (`listen_managedexporter.go`) line-for-line in shape. Privilege drop and
//! the `StopProc` kill use `nix`, the same "control a process via low-level
//! POSIX calls" idiom the teacher already uses for its self-upgrade
//! handover (`source/motya/src/config/config_aggregator.rs`).

pub mod memory;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::{Gid, Pid, Uid, User};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

pub use memory::{over_memory_limit, ProcStatusMemoryReader, ProcessMemoryReader};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("unknown user {0:?}")]
    UnknownUser(String),
    #[error("failed to drop privileges to {0:?}: {1}")]
    PrivilegeDrop(String, nix::Error),
}

#[derive(Debug, Clone)]
pub struct ManagedExporterConfig {
    pub name: String,
    pub args: Vec<String>,
    pub extra_args: Vec<String>,
    pub user: Option<String>,
    pub max_memory_bytes: Option<u64>,
}

/// Splits a command line respecting single and double quotes, mirroring
/// the quote handling `sentinel_config`'s value scanner already does for
/// config values.
pub fn tokenize_args(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// One supervised child process and its lifecycle state.
pub struct Supervisor {
    config: ManagedExporterConfig,
    memory_reader: Arc<dyn ProcessMemoryReader>,
    keep_running: Arc<AtomicBool>,
    child_pid: Arc<AtomicU32>,
}

impl Supervisor {
    pub fn new(config: ManagedExporterConfig, memory_reader: Arc<dyn ProcessMemoryReader>) -> Self {
        Self { config, memory_reader, keep_running: Arc::new(AtomicBool::new(false)), child_pid: Arc::new(AtomicU32::new(0)) }
    }

    /// Starts the supervision loop as a background task. Returns once the
    /// first spawn attempt has been scheduled; the loop itself runs for
    /// the supervisor's lifetime.
    pub fn start(&self, task_group: &mut crate::task_group::TaskGroup) {
        self.keep_running.store(true, Ordering::SeqCst);
        let config = self.config.clone();
        let memory_reader = self.memory_reader.clone();
        let keep_running = self.keep_running.clone();
        let child_pid = self.child_pid.clone();
        task_group.spawn(async move {
            run_supervision_loop(config, memory_reader, keep_running, child_pid).await;
        });
    }

    /// Stops the supervisor: clears `keep_running` and kills the current
    /// child, if any. The supervision loop observes the flag and exits
    /// instead of restarting.
    pub fn stop(&self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.kill_child();
    }

    /// Kills the current child without clearing `keep_running`, so the
    /// supervision loop restarts it. Used by the memory watchdog.
    pub fn stop_proc(&self) {
        self.kill_child();
    }

    /// The current child's PID, or `None` between exit and respawn.
    pub fn pid(&self) -> Option<u32> {
        match self.child_pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn kill_child(&self) {
        let pid = self.child_pid.load(Ordering::SeqCst);
        if pid != 0 {
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }
}

async fn run_supervision_loop(
    config: ManagedExporterConfig,
    memory_reader: Arc<dyn ProcessMemoryReader>,
    keep_running: Arc<AtomicBool>,
    child_pid: Arc<AtomicU32>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match spawn_and_wait(&config, &memory_reader, &keep_running, &child_pid).await {
            Ok(()) => {}
            Err(e) => tracing::error!(exporter = %config.name, error = %e, "managed exporter failed to start"),
        }
        child_pid.store(0, Ordering::SeqCst);
        if !keep_running.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
}

async fn spawn_and_wait(
    config: &ManagedExporterConfig,
    memory_reader: &Arc<dyn ProcessMemoryReader>,
    keep_running: &Arc<AtomicBool>,
    child_pid: &Arc<AtomicU32>,
) -> Result<(), SupervisorError> {
    let mut argv = config.args.clone();
    argv.extend(config.extra_args.clone());
    let Some(program) = argv.first().cloned() else {
        return Err(SupervisorError::Spawn(config.name.clone(), std::io::Error::other("agent args is empty")));
    };

    let mut command = Command::new(&program);
    command.args(&argv[1..]);
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    #[cfg(unix)]
    if let Some(user) = &config.user {
        if Uid::effective().is_root() {
            apply_privilege_drop(&mut command, user)?;
        }
    }

    let mut child = command.spawn().map_err(|e| SupervisorError::Spawn(config.name.clone(), e))?;
    child_pid.store(child.id().unwrap_or(0), Ordering::SeqCst);

    if let Some(limit) = config.max_memory_bytes {
        spawn_memory_watcher(child_pid.clone(), memory_reader.clone(), limit, keep_running.clone());
    }

    if let Some(stdout) = child.stdout.take() {
        let name = config.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(exporter = %name, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let name = config.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                classify_stderr_line(&name, &line);
            }
        });
    }

    let _ = child.wait().await;
    Ok(())
}

/// `level=info` demotes to debug, `level=debug` to trace, everything else
/// is logged as an error — a direct port of the original `logPass` helper.
fn classify_stderr_line(exporter: &str, line: &str) {
    if line.contains("level=info") {
        tracing::debug!(exporter, "{line}");
    } else if line.contains("level=debug") {
        tracing::trace!(exporter, "{line}");
    } else {
        tracing::error!(exporter, "{line}");
    }
}

fn spawn_memory_watcher(
    child_pid: Arc<AtomicU32>,
    memory_reader: Arc<dyn ProcessMemoryReader>,
    limit_bytes: u64,
    keep_running: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let pid = child_pid.load(Ordering::SeqCst);
            if pid == 0 || !keep_running.load(Ordering::SeqCst) {
                return;
            }
            if over_memory_limit(memory_reader.as_ref(), pid, limit_bytes) {
                tracing::warn!(pid, limit_bytes, "managed exporter exceeded memory limit, restarting");
                let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                return;
            }
        }
    });
}

#[cfg(unix)]
fn apply_privilege_drop(command: &mut Command, user: &str) -> Result<(), SupervisorError> {
    let entry = User::from_name(user)
        .map_err(|e| SupervisorError::PrivilegeDrop(user.to_string(), e))?
        .ok_or_else(|| SupervisorError::UnknownUser(user.to_string()))?;
    let uid: Uid = entry.uid;
    let gid: Gid = entry.gid;
    command.uid(uid.as_raw());
    command.gid(gid.as_raw());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(tokenize_args("node_exporter --web.listen-address=:9100"), vec!["node_exporter", "--web.listen-address=:9100"]);
    }

    #[test]
    fn tokenize_respects_quotes() {
        assert_eq!(tokenize_args(r#"node_exporter --collector.textfile.directory="/var/lib/node exporter""#), vec![
            "node_exporter",
            "--collector.textfile.directory=/var/lib/node exporter",
        ]);
    }

    #[test]
    fn classify_demotes_info_and_debug_lines() {
        // exercised indirectly via tracing capture in integration tests;
        // here we just confirm the function doesn't panic on edge inputs.
        classify_stderr_line("test", "level=info msg=\"started\"");
        classify_stderr_line("test", "level=debug msg=\"tick\"");
        classify_stderr_line("test", "panic: boom");
    }
}
