// src/runtime/mailbox.rs

//! Per-task inbox backed by [`LockfreeQueue`].

use std::sync::atomic::{self, AtomicBool, Ordering};
use std::task::Waker;

use futures::task::AtomicWaker;

use crate::error::CotaskError;
use crate::queue::LockfreeQueue;
use crate::runtime::message::Envelope;
use crate::runtime::task::TaskId;

/// Unbounded mailbox owned by exactly one task.
///
/// Once closed, every envelope still queued (or racing in afterwards) is
/// rejected with [`CotaskError::Undelivered`].
#[derive(Debug)]
pub(crate) struct Mailbox {
  owner: TaskId,
  queue: LockfreeQueue<Envelope>,
  closed: AtomicBool,
  receiver: AtomicWaker,
}

impl Mailbox {
  pub(crate) fn new(owner: TaskId) -> Self {
    Self {
      owner,
      queue: LockfreeQueue::new(),
      closed: AtomicBool::new(false),
      receiver: AtomicWaker::new(),
    }
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  /// Enqueues `envelope`. Returns `false` when the mailbox was closed
  /// concurrently; the envelope has then already been rejected.
  pub(crate) fn push(&self, envelope: Envelope) -> bool {
    self.queue.push(envelope);
    // Pairs with the fence in `close`: either we see `closed`, or the
    // closing thread's drain sees our envelope.
    atomic::fence(Ordering::SeqCst);
    if self.closed.load(Ordering::Relaxed) {
      self.drain();
      return false;
    }
    self.receiver.wake();
    true
  }

  pub(crate) fn pop(&self) -> Option<Envelope> {
    self.queue.pop()
  }

  /// Registers the waker of a suspended receive.
  pub(crate) fn register(&self, waker: &Waker) {
    self.receiver.register(waker);
  }

  pub(crate) fn close(&self) {
    self.closed.store(true, Ordering::Relaxed);
    atomic::fence(Ordering::SeqCst);
    self.drain();
  }

  fn drain(&self) {
    let mut rejected = 0usize;
    while let Some(envelope) = self.queue.pop() {
      envelope.reject(CotaskError::Undelivered { task_id: self.owner });
      rejected += 1;
    }
    if rejected > 0 {
      tracing::debug!(task_id = %self.owner, rejected, "Drained mailbox of completed task");
    }
  }
}
