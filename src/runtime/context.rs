// src/runtime/context.rs

//! The view a coroutine body has of its own task.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::CotaskError;
use crate::runtime::call::CallToken;
use crate::runtime::mailbox::Mailbox;
use crate::runtime::message::Envelope;
use crate::runtime::scheduler::SchedulerHandle;
use crate::runtime::task::{Affinity, Priority, TaskHandle, TaskId, WeakTaskHandle};

/// Handed to a coroutine body when it is spawned.
///
/// Holds the task's mailbox and a weak reference to the task itself, so a
/// suspended body never keeps its own task alive.
pub struct TaskContext {
  id: TaskId,
  priority: Priority,
  affinity: Affinity,
  mailbox: Arc<Mailbox>,
  me: WeakTaskHandle,
  scheduler: SchedulerHandle,
}

impl TaskContext {
  pub(crate) fn new(
    id: TaskId,
    priority: Priority,
    affinity: Affinity,
    mailbox: Arc<Mailbox>,
    me: WeakTaskHandle,
    scheduler: SchedulerHandle,
  ) -> Self {
    Self {
      id,
      priority,
      affinity,
      mailbox,
      me,
      scheduler,
    }
  }

  pub fn id(&self) -> TaskId {
    self.id
  }

  pub fn priority(&self) -> Priority {
    self.priority
  }

  pub fn affinity(&self) -> Affinity {
    self.affinity
  }

  /// Strong handle to this task, e.g. to hand out to other tasks.
  pub fn handle(&self) -> Option<TaskHandle> {
    self.me.upgrade()
  }

  pub(crate) fn weak_self(&self) -> WeakTaskHandle {
    self.me.clone()
  }

  /// Spawner for the scheduler running this task.
  pub fn scheduler(&self) -> &SchedulerHandle {
    &self.scheduler
  }

  /// Suspends the task until its mailbox is non-empty, then yields the next
  /// envelope. This is the only suspension point a body needs.
  pub fn receive(&self) -> Receive<'_> {
    Receive { mailbox: &self.mailbox }
  }

  /// Takes an envelope if one is already queued, without suspending.
  pub fn try_receive(&self) -> Option<Envelope> {
    self.mailbox.pop()
  }

  /// Sends a message whose reply is addressed back to this task.
  pub fn send<P: Any + Send>(&self, target: &TaskHandle, header: u64, payload: P) -> Result<CallToken, CotaskError> {
    target.task.deliver(header, Box::new(payload), Some(self.me.clone()))
  }
}

impl fmt::Debug for TaskContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskContext")
      .field("id", &self.id)
      .field("priority", &self.priority)
      .field("affinity", &self.affinity)
      .finish_non_exhaustive()
  }
}

/// Future returned by [`TaskContext::receive`].
#[must_use = "receive does nothing unless awaited"]
pub struct Receive<'a> {
  mailbox: &'a Mailbox,
}

impl Future for Receive<'_> {
  type Output = Envelope;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Envelope> {
    if let Some(envelope) = self.mailbox.pop() {
      return Poll::Ready(envelope);
    }
    self.mailbox.register(cx.waker());
    // A delivery may have slipped in between the pop and the registration.
    match self.mailbox.pop() {
      Some(envelope) => Poll::Ready(envelope),
      None => Poll::Pending,
    }
  }
}
