// src/lib.rs

//! cotask - cooperative actors on a lock-free MPMC queue.
//!
//! Tasks own a mailbox, a priority and a thread affinity, and exchange
//! request/reply messages through call tokens. A fixed pool of worker
//! threads resumes them; tasks confined to the main thread run inside
//! [`Scheduler::block_on`] on the thread that built the scheduler.

/// The closed set of built-in actors (window, counter, echo).
pub mod actors;
/// Defines custom error types used throughout the library.
pub mod error;
/// Producer/consumer protocol verifying a queue loses and duplicates nothing.
pub mod harness;
/// The `Queue` contract and its lock-free and mutex-based implementations.
pub mod queue;
/// Tasks, mailboxes, call tokens and the scheduler.
pub mod runtime;

// Re-export core types for user convenience, making them accessible directly
// from the crate root (e.g., `cotask::Scheduler`, `cotask::TaskOptions`).
pub use actors::Actor;
pub use error::CotaskError;
pub use queue::{BlockingQueue, LockfreeQueue, Queue};
pub use runtime::{
  Affinity, CallToken, Caller, CreateMode, Envelope, External, Message, Payload, Priority, Scheduler,
  SchedulerConfig, SchedulerHandle, TaskContext, TaskHandle, TaskId, TaskOptions, TaskState, SYSTEM_STOP,
};

// --- Top-Level Library Information Functions ---

/// Major version number of the cotask library.
const VERSION_MAJOR: i32 = 0;
/// Minor version number of the cotask library.
const VERSION_MINOR: i32 = 1;
/// Patch version number of the cotask library.
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
///
/// # Examples
///
/// ```
/// let (major, minor, patch) = cotask::version();
/// println!("cotask version: {}.{}.{}", major, minor, patch);
/// ```
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Returns the major version number of the library.
pub fn version_major() -> i32 {
  VERSION_MAJOR
}

/// Returns the minor version number of the library.
pub fn version_minor() -> i32 {
  VERSION_MINOR
}

/// Returns the patch version number of the library.
pub fn version_patch() -> i32 {
  VERSION_PATCH
}

/// Creates a scheduler with the default configuration on the current thread,
/// which becomes its main thread.
/// This is a convenience function equivalent to `Scheduler::with_defaults()`.
pub fn scheduler() -> Result<Scheduler, CotaskError> {
  Scheduler::with_defaults()
}
