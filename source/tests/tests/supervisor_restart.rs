//! A supervised child that exits on its own is respawned with a new PID
//! while the supervisor is running, and stays dead once stopped.

use std::sync::Arc;
use std::time::Duration;

use sentinel::supervisor::{ManagedExporterConfig, ProcStatusMemoryReader, Supervisor};
use sentinel::task_group::TaskGroup;

async fn wait_for_pid(supervisor: &Supervisor) -> u32 {
    for _ in 0..100 {
        if let Some(pid) = supervisor.pid() {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("supervisor never recorded a pid");
}

#[tokio::test]
async fn restarts_child_with_a_new_pid_after_it_exits() {
    let config = ManagedExporterConfig {
        name: "test-exporter".to_string(),
        args: vec!["/bin/sh".to_string(), "-c".to_string(), "sleep 1".to_string()],
        extra_args: Vec::new(),
        user: None,
        max_memory_bytes: None,
    };
    let supervisor = Arc::new(Supervisor::new(config, Arc::new(ProcStatusMemoryReader)));
    let mut tasks = TaskGroup::new();
    supervisor.start(&mut tasks);

    let first_pid = wait_for_pid(&supervisor).await;

    // the child exits after ~1s, the loop sleeps 3s, then respawns.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let second_pid = wait_for_pid(&supervisor).await;
    assert_ne!(first_pid, second_pid, "supervisor should have respawned the child with a new pid");

    supervisor.stop();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let pid_after_stop = supervisor.pid();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(supervisor.pid(), pid_after_stop, "no further spawn should occur once stopped");
}
