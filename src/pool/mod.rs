//! Worker process pool
//!
//! Bounded process scheduling, the cross-process result channel and the
//! collector that merges worker results back onto the original cases.

pub mod channel;
mod collector;
mod error;
mod handle;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{FragmentReceiver, FragmentSender};
pub use collector::Collector;
pub use error::PoolError;
pub use handle::{ProcessSpawner, Spawner, WorkerHandle, WorkerState};
pub use scheduler::{host_parallelism, resolve_capacity, Scheduler, DEFAULT_PROCESS_TIMEOUT};
