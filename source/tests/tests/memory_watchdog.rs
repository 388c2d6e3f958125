//! A supervisor configured with an unreasonably low memory limit kills and
//! restarts its child almost immediately, since any real process' RSS
//! exceeds one byte (`tokio::time::interval`'s first tick fires without
//! delay, so this does not need to wait out the real 30s tick period).

use std::sync::Arc;
use std::time::Duration;

use sentinel::supervisor::{ManagedExporterConfig, ProcStatusMemoryReader, Supervisor};
use sentinel::task_group::TaskGroup;

#[tokio::test]
async fn child_over_memory_limit_is_restarted() {
    let config = ManagedExporterConfig {
        name: "test-exporter".to_string(),
        args: vec!["/bin/sh".to_string(), "-c".to_string(), "sleep 60".to_string()],
        extra_args: Vec::new(),
        user: None,
        max_memory_bytes: Some(1),
    };
    let supervisor = Arc::new(Supervisor::new(config, Arc::new(ProcStatusMemoryReader)));
    let mut tasks = TaskGroup::new();
    supervisor.start(&mut tasks);

    let mut first_pid = None;
    for _ in 0..100 {
        if let Some(pid) = supervisor.pid() {
            first_pid = Some(pid);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let first_pid = first_pid.expect("supervisor never recorded a pid");

    let mut saw_restart = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(pid) = supervisor.pid() {
            if pid != first_pid {
                saw_restart = true;
                break;
            }
        }
    }
    assert!(saw_restart, "child exceeding the memory limit should have been killed and respawned");

    supervisor.stop();
}
