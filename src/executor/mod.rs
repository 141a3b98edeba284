//! Suite execution engine
//!
//! The parent side runs suites across worker processes; the worker side
//! executes a single suite and reports its fragment.

mod parallel;
mod runner;
pub mod task;

pub use parallel::{ctrl_c, run_pool, RunStatus};
pub use runner::{RunOptions, SuiteRunner};
