//! "Every spawned task registers with the agent's task group so shutdown is
//! complete before process exit" (spec.md §5). A thin wrapper over
//! `tokio::task::JoinSet`, the shape the teacher reuses elsewhere for
//! collecting homogeneous concurrent work (`futures_util::future::try_join_all`
//! over service-builder futures in `app_context.rs`).

use std::time::Duration;

use tokio::task::JoinSet;

#[derive(Default)]
pub struct TaskGroup {
    tasks: JoinSet<()>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self { tasks: JoinSet::new() }
    }

    pub fn spawn(&mut self, fut: impl std::future::Future<Output = ()> + Send + 'static) {
        self.tasks.spawn(fut);
    }

    /// Waits for every registered task to finish, up to `grace`. Anything
    /// still running past the grace period is abandoned (the tasks
    /// themselves are expected to honor cancellation signals before then).
    pub async fn shutdown(&mut self, grace: Duration) {
        let drain = async {
            while self.tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!("task group did not drain within grace period, abandoning stragglers");
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
