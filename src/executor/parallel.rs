//! Parallel suite execution
//!
//! Drives the scheduler and the collector side by side and makes sure no
//! worker process outlives the run, whichever way it ends.

use std::future::Future;
use tracing::{error, info, warn};

use crate::pool::{Collector, PoolError, Scheduler};

/// How a pool run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

/// Run `serve` and `handle` concurrently until both finish, `interrupt`
/// resolves, or either side fails. Always reaps every worker before
/// returning.
pub async fn run_pool<F>(
    scheduler: &mut Scheduler,
    collector: &mut Collector,
    interrupt: F,
) -> Result<RunStatus, PoolError>
where
    F: Future<Output = ()>,
{
    let result = {
        let work = async { tokio::try_join!(scheduler.serve(), collector.handle()) };

        tokio::select! {
            done = work => done.map(|_| RunStatus::Completed),
            _ = interrupt => Ok(RunStatus::Interrupted),
        }
    };

    match &result {
        Ok(RunStatus::Completed) => {}
        Ok(RunStatus::Interrupted) => {
            warn!(
                "Interrupted, terminating {} running workers",
                scheduler.live_count()
            );
            scheduler.destroy();
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            scheduler.destroy();
        }
    }

    scheduler.close().await;
    info!(
        "Pool finished: {} workers spawned, peak {} concurrent",
        scheduler.spawned(),
        scheduler.peak_live()
    );

    result
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
