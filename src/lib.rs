//! A tiny cooperative multitasking runtime.
//!
//! Tasks are stackful fibers multiplexed over the thread that called
//! [`initialize`]. There's no preemption: a task runs until it calls
//! [`yield_now`] or returns, and the dispatcher resumes tasks in spawn
//! order, round-robin. A task that spins without yielding starves every
//! other task; that's the contract, not a bug.
//!
//! Scheduler state is thread local. Each thread that wants tasks calls
//! [`initialize`] for itself, and tasks never migrate across threads.
//!
//! # Examples
//! ```
//! weft::initialize();
//!
//! weft::spawn(|| {
//!     println!("ping");
//!     weft::yield_now();
//!     println!("ping again");
//! })
//! .unwrap();
//!
//! weft::spawn(|| println!("pong")).unwrap();
//!
//! weft::join_all();
//! ```
//!
//! Or let the attribute handle setup and teardown:
//! ```
//! #[weft::main]
//! fn main() {
//!     weft::spawn(|| println!("hi")).unwrap();
//! }
//! ```

mod runtime;

pub use runtime::{active_tasks, initialize, join_all, spawn, yield_now, MAX_TASKS, STACK_SIZE};

/// Marks the entry point of a weft program.
///
/// Expands to [`initialize`] before the body and [`join_all`] after it, so
/// every spawned task finishes before the function returns.
pub use weft_macros::main;

/// Reasons [`spawn`] can fail. The task table is unchanged in every case.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The task table is full ([`MAX_TASKS`] live tasks).
    #[error("too many tasks")]
    TooManyTasks,

    /// Mapping memory for the task's stack failed.
    #[error("failed to allocate a task stack")]
    StackAllocation(#[source] std::io::Error),

    /// The stack was mapped but its guard page couldn't be protected.
    #[error("failed to protect a task stack")]
    StackProtection(#[source] std::io::Error),
}
