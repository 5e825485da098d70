// src/runtime/task.rs

//! Task identity, scheduling attributes and the shared task cell.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::task::ArcWake;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use crate::actors::Actor;
use crate::error::CotaskError;
use crate::runtime::call::CallToken;
use crate::runtime::mailbox::Mailbox;
use crate::runtime::message::{Envelope, Payload, SYSTEM_STOP};
use crate::runtime::scheduler::SchedulerInner;

/// Unique, never reused identifier of a task within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
  pub(crate) fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  pub fn as_u64(&self) -> u64 {
    self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Selection order among ready tasks of the same affinity class. A hint, not
/// a preemption guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
  Low = 0,
  #[default]
  Normal = 1,
  High = 2,
  Critical = 3,
}

impl Priority {
  pub const LEVELS: usize = 4;

  pub fn index(self) -> usize {
    self as usize
  }
}

/// Which threads may run a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Affinity {
  #[default]
  AnyWorkerThread,
  /// Only the thread that constructed the scheduler.
  MainThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CreateMode {
  /// Ready as soon as it is spawned.
  #[default]
  Eager,
  /// Stays `Created` until started explicitly or sent its first message.
  Deferred,
}

/// Observable run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
  Created,
  Ready,
  Running,
  Suspended,
  Completed,
}

const CREATED: u8 = 0;
const READY: u8 = 1;
const RUNNING: u8 = 2;
/// Running, and woken again before it suspended.
const NOTIFIED: u8 = 3;
const SUSPENDED: u8 = 4;
const COMPLETED: u8 = 5;

/// Scheduling attributes supplied at spawn time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
  pub priority: Priority,
  pub mode: CreateMode,
  pub affinity: Affinity,
  pub name: Option<String>,
}

impl TaskOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn priority(mut self, priority: Priority) -> Self {
    self.priority = priority;
    self
  }

  pub fn mode(mut self, mode: CreateMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn affinity(mut self, affinity: Affinity) -> Self {
    self.affinity = affinity;
    self
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }
}

/// What the scheduler resumes.
pub(crate) enum TaskBody {
  /// A built-in actor variant driven message by message.
  Actor(Actor),
  /// A free-form body that suspends at `TaskContext::receive`.
  Coroutine(BoxFuture<'static, ()>),
}

/// Shared task cell. Owned jointly by the scheduler's live set, wakers and
/// every [`TaskHandle`].
pub(crate) struct Task {
  pub(crate) id: TaskId,
  pub(crate) name: Option<String>,
  pub(crate) priority: Priority,
  pub(crate) affinity: Affinity,
  pub(crate) mode: CreateMode,
  state: AtomicU8,
  pub(crate) mailbox: Arc<Mailbox>,
  /// Only the thread that moved the task to `Running` locks this.
  pub(crate) body: Mutex<Option<TaskBody>>,
  scheduler: Weak<SchedulerInner>,
  completed: Notify,
}

impl Task {
  pub(crate) fn new(
    id: TaskId,
    options: TaskOptions,
    mailbox: Arc<Mailbox>,
    body: TaskBody,
    scheduler: Weak<SchedulerInner>,
  ) -> Self {
    Self {
      id,
      name: options.name,
      priority: options.priority,
      affinity: options.affinity,
      mode: options.mode,
      state: AtomicU8::new(CREATED),
      mailbox,
      body: Mutex::new(Some(body)),
      scheduler,
      completed: Notify::new(),
    }
  }

  pub(crate) fn state(&self) -> TaskState {
    match self.state.load(Ordering::Acquire) {
      CREATED => TaskState::Created,
      READY => TaskState::Ready,
      RUNNING | NOTIFIED => TaskState::Running,
      SUSPENDED => TaskState::Suspended,
      _ => TaskState::Completed,
    }
  }

  pub(crate) fn is_completed(&self) -> bool {
    self.state.load(Ordering::Acquire) == COMPLETED
  }

  /// `Created | Suspended -> Ready`. Returns true when the caller must push
  /// the task onto a ready queue. A running task is only flagged so it is
  /// requeued when it next suspends.
  pub(crate) fn transition_to_ready(&self) -> bool {
    let mut current = self.state.load(Ordering::Acquire);
    loop {
      let next = match current {
        CREATED | SUSPENDED => READY,
        RUNNING => NOTIFIED,
        _ => return false,
      };
      match self
        .state
        .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => return next == READY,
        Err(actual) => current = actual,
      }
    }
  }

  /// `Ready -> Running`. Fails if the task was completed meanwhile.
  pub(crate) fn transition_to_running(&self) -> bool {
    self
      .state
      .compare_exchange(READY, RUNNING, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// `Running -> Suspended` after the body gave up the thread. Returns true
  /// if a wake-up arrived while running and the task must be requeued.
  pub(crate) fn transition_to_suspended(&self) -> bool {
    match self
      .state
      .compare_exchange(RUNNING, SUSPENDED, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => false,
      Err(NOTIFIED) => {
        self.state.store(READY, Ordering::Release);
        true
      }
      Err(_) => false,
    }
  }

  /// `Running -> Ready` when the body yielded with work left.
  pub(crate) fn transition_to_yielded(&self) {
    let _ = self
      .state
      .compare_exchange(RUNNING, READY, Ordering::AcqRel, Ordering::Acquire)
      .or_else(|_| {
        self
          .state
          .compare_exchange(NOTIFIED, READY, Ordering::AcqRel, Ordering::Acquire)
      });
  }

  /// Marks the task completed. Returns false if it already was.
  pub(crate) fn transition_to_completed(&self) -> bool {
    self.state.swap(COMPLETED, Ordering::AcqRel) != COMPLETED
  }

  pub(crate) fn notify_completed(&self) {
    self.completed.notify_waiters();
  }

  /// Enqueues a message and wakes the task.
  pub(crate) fn deliver(
    self: &Arc<Self>,
    header: u64,
    payload: Payload,
    sender: Option<WeakTaskHandle>,
  ) -> Result<CallToken, CotaskError> {
    if self.is_completed() || self.mailbox.is_closed() {
      return Err(CotaskError::TaskCompleted { task_id: self.id });
    }
    let (tx, rx) = oneshot::channel();
    let envelope = Envelope::new(self.id, header, payload, sender, tx);
    if self.mailbox.push(envelope) {
      tracing::trace!(task_id = %self.id, header, "Message delivered");
      ArcWake::wake_by_ref(self);
    }
    Ok(CallToken::new(self.id, rx))
  }
}

impl ArcWake for Task {
  fn wake_by_ref(arc_self: &Arc<Self>) {
    if let Some(scheduler) = arc_self.scheduler.upgrade() {
      scheduler.schedule(arc_self);
    }
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("priority", &self.priority)
      .field("affinity", &self.affinity)
      .field("state", &self.state())
      .finish()
  }
}

/// Reference-counted handle to a task. Cheap to clone and safe to share
/// across threads.
#[derive(Clone)]
pub struct TaskHandle {
  pub(crate) task: Arc<Task>,
}

impl TaskHandle {
  pub(crate) fn new(task: Arc<Task>) -> Self {
    Self { task }
  }

  pub fn id(&self) -> TaskId {
    self.task.id
  }

  pub fn name(&self) -> Option<&str> {
    self.task.name.as_deref()
  }

  pub fn priority(&self) -> Priority {
    self.task.priority
  }

  pub fn affinity(&self) -> Affinity {
    self.task.affinity
  }

  pub fn mode(&self) -> CreateMode {
    self.task.mode
  }

  pub fn state(&self) -> TaskState {
    self.task.state()
  }

  pub fn is_completed(&self) -> bool {
    self.task.is_completed()
  }

  /// Sends a message from outside any task. The reply can be awaited on any
  /// executor through the returned token.
  pub fn send<P: std::any::Any + Send>(&self, header: u64, payload: P) -> Result<CallToken, CotaskError> {
    self.task.deliver(header, Box::new(payload), None)
  }

  /// Resumes a deferred task for the first time. No effect otherwise.
  pub fn start(&self) {
    if self.task.state() == TaskState::Created {
      ArcWake::wake_by_ref(&self.task);
    }
  }

  /// Asks the task to finish. Built-in actors reply and complete; coroutine
  /// bodies see an envelope whose `is_stop()` is true.
  pub fn request_stop(&self) -> Result<CallToken<()>, CotaskError> {
    Ok(self.task.deliver(SYSTEM_STOP, Box::new(()), None)?.typed())
  }

  pub fn downgrade(&self) -> WeakTaskHandle {
    WeakTaskHandle {
      id: self.task.id,
      task: Arc::downgrade(&self.task),
    }
  }

  /// Completes once the task has reached `Completed`.
  pub fn join(&self) -> impl Future<Output = ()> + Send + 'static {
    let task = self.task.clone();
    async move {
      loop {
        let notified = task.completed.notified();
        if task.is_completed() {
          return;
        }
        notified.await;
      }
    }
  }
}

impl PartialEq for TaskHandle {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.task, &other.task)
  }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.task, f)
  }
}

/// Non-owning task reference used as the reply address of a message.
#[derive(Clone)]
pub struct WeakTaskHandle {
  id: TaskId,
  task: Weak<Task>,
}

impl WeakTaskHandle {
  pub(crate) fn from_weak(id: TaskId, task: Weak<Task>) -> Self {
    Self { id, task }
  }

  pub fn id(&self) -> TaskId {
    self.id
  }

  pub fn upgrade(&self) -> Option<TaskHandle> {
    self.task.upgrade().map(TaskHandle::new)
  }

  /// False once the task has been destroyed or has run to completion.
  pub fn is_alive(&self) -> bool {
    self.task.upgrade().is_some_and(|task| !task.is_completed())
  }
}

impl fmt::Debug for WeakTaskHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WeakTaskHandle")
      .field("id", &self.id)
      .field("alive", &self.is_alive())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::actors::EchoActor;

  fn detached_task() -> Arc<Task> {
    let id = TaskId::from_raw(1);
    Arc::new(Task::new(
      id,
      TaskOptions::new(),
      Arc::new(Mailbox::new(id)),
      TaskBody::Actor(Actor::Echo(EchoActor::new())),
      Weak::new(),
    ))
  }

  #[test]
  fn state_machine_walks_the_happy_path() {
    let task = detached_task();
    assert_eq!(task.state(), TaskState::Created);
    assert!(task.transition_to_ready());
    assert!(!task.transition_to_ready(), "already ready");
    assert!(task.transition_to_running());
    assert_eq!(task.state(), TaskState::Running);
    assert!(!task.transition_to_suspended());
    assert_eq!(task.state(), TaskState::Suspended);
    assert!(task.transition_to_completed());
    assert!(!task.transition_to_completed());
    assert!(!task.transition_to_ready(), "completed is terminal");
  }

  #[test]
  fn wake_while_running_requeues_on_suspend() {
    let task = detached_task();
    task.transition_to_ready();
    task.transition_to_running();
    assert!(!task.transition_to_ready(), "running task is only flagged");
    assert!(task.transition_to_suspended());
    assert_eq!(task.state(), TaskState::Ready);
  }

  #[test]
  fn delivery_to_completed_task_fails() {
    let task = detached_task();
    task.transition_to_completed();
    task.mailbox.close();
    let err = task.deliver(0, Box::new(()), None).unwrap_err();
    assert_eq!(err, CotaskError::TaskCompleted { task_id: task.id });
  }

  #[test]
  fn weak_handle_dies_with_completion() {
    let task = detached_task();
    let handle = TaskHandle::new(task.clone());
    let weak = handle.downgrade();
    assert!(weak.is_alive());
    task.transition_to_completed();
    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_some(), "still allocated while handles exist");
    drop(handle);
    drop(task);
    assert!(weak.upgrade().is_none());
  }
}
