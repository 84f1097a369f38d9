use std::future::Future;

use tokio::task::JoinHandle;
use tracing::error;

pub mod cues;
pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod show;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use cues::{CueTable, Dispatcher, FireCounters, Firing};
pub use engine::Engine;
pub use registry::DeviceRegistry;
pub use scheduler::{BurstPacing, KeepAliveScheduler, SchedulerPolicy, Span, TickOutcome};
pub use show::{KeepAliveConfig, Show};

/// Spawns a detached task and logs if it panics. The returned handle
/// completes once the task has finished either way.
pub fn spawn_supervised<F>(label: String, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(task);
    tokio::spawn(async move {
        if let Err(join_error) = inner.await {
            if join_error.is_panic() {
                error!(task = %label, "task panicked");
            }
        }
    })
}
