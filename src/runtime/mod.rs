// src/runtime/mod.rs

//! Tasks, mailboxes, the call-token protocol and the scheduler that drives them.

pub mod call;
pub mod config;
pub mod context;
pub(crate) mod mailbox;
pub mod message;
pub(crate) mod ready_queue;
pub mod scheduler;
pub mod task;
pub(crate) mod waitgroup;

pub use call::{CallToken, Caller, External};
pub use config::SchedulerConfig;
pub use context::{Receive, TaskContext};
pub use message::{Envelope, Message, Payload, ReplyTo, SYSTEM_STOP};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use task::{Affinity, CreateMode, Priority, TaskHandle, TaskId, TaskOptions, TaskState, WeakTaskHandle};
