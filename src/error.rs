// src/error.rs

use thiserror::Error;

use crate::runtime::TaskId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum CotaskError {
  #[error("Invalid argument provided: {0}")]
  InvalidArgument(String),

  // --- Delivery Errors ---
  #[error("Task {task_id} has completed; message not deliverable")]
  TaskCompleted { task_id: TaskId },
  #[error("Task {task_id} completed before processing the message")]
  Undelivered { task_id: TaskId },
  #[error("Task {task_id} dropped message with header {header:#x} without replying")]
  NoReply { task_id: TaskId, header: u64 },

  // --- Payload Errors ---
  #[error("Reply payload is not of the expected type {expected}")]
  PayloadType { expected: &'static str },
  #[error("Unsupported operation header {header:#x} for {actor}")]
  UnsupportedOperation { actor: &'static str, header: u64 },

  // --- State Errors ---
  #[error("Operation is invalid for the current runtime state: {0}")]
  InvalidState(&'static str),

  // --- Internal Errors ---
  #[error("Internal runtime error: {0}")]
  Internal(String),
}

impl CotaskError {
  /// True for the errors a sender sees when its message never reached a live
  /// receive loop.
  pub fn is_delivery_failure(&self) -> bool {
    matches!(
      self,
      CotaskError::TaskCompleted { .. } | CotaskError::Undelivered { .. }
    )
  }
}
