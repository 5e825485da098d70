// src/runtime/scheduler.rs

//! Worker pool, ready queues and the task lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, Thread};

use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake};
use parking_lot::{Condvar, Mutex};

use crate::actors::{Actor, Flow};
use crate::error::CotaskError;
use crate::runtime::config::SchedulerConfig;
use crate::runtime::context::TaskContext;
use crate::runtime::mailbox::Mailbox;
use crate::runtime::ready_queue::ReadyQueue;
use crate::runtime::task::{Affinity, CreateMode, Task, TaskBody, TaskHandle, TaskId, TaskOptions, WeakTaskHandle};
use crate::runtime::waitgroup::WaitGroup;

/// Main-thread tasks resumed per pass of the `block_on` loop before the
/// awaited future is polled again.
const MAIN_BATCH: usize = 64;

/// How a resume of a task body ended.
enum Outcome {
  Completed,
  Suspended,
  /// Gave up the thread with work still queued.
  Yielded,
}

/// State shared by the scheduler, its workers and every task (weakly).
pub(crate) struct SchedulerInner {
  config: SchedulerConfig,
  main_thread: Thread,
  worker_queue: ReadyQueue,
  main_queue: ReadyQueue,
  live: Mutex<HashMap<TaskId, Arc<Task>>>,
  live_group: WaitGroup,
  next_id: AtomicU64,
  shutdown: AtomicBool,
  idle: Mutex<()>,
  idle_cv: Condvar,
}

impl SchedulerInner {
  fn new(config: SchedulerConfig) -> Self {
    Self {
      config,
      main_thread: thread::current(),
      worker_queue: ReadyQueue::new(),
      main_queue: ReadyQueue::new(),
      live: Mutex::new(HashMap::new()),
      live_group: WaitGroup::new(),
      next_id: AtomicU64::new(1),
      shutdown: AtomicBool::new(false),
      idle: Mutex::new(()),
      idle_cv: Condvar::new(),
    }
  }

  fn is_shutdown(&self) -> bool {
    self.shutdown.load(Ordering::Acquire)
  }

  fn next_id(&self) -> TaskId {
    TaskId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
  }

  fn ensure_running(&self) -> Result<(), CotaskError> {
    if self.is_shutdown() {
      return Err(CotaskError::InvalidState("scheduler is shut down"));
    }
    Ok(())
  }

  /// Makes `task` ready if it was created or suspended. Called by wakers,
  /// deliveries and `TaskHandle::start`.
  pub(crate) fn schedule(&self, task: &Arc<Task>) {
    if self.is_shutdown() {
      return;
    }
    if task.transition_to_ready() {
      self.enqueue(task.clone());
    }
  }

  fn enqueue(&self, task: Arc<Task>) {
    match task.affinity {
      Affinity::MainThread => {
        self.main_queue.push(task);
        self.main_thread.unpark();
      }
      Affinity::AnyWorkerThread => {
        self.worker_queue.push(task);
        let _guard = self.idle.lock();
        self.idle_cv.notify_one();
      }
    }
  }

  fn admit(&self, task: Arc<Task>) -> TaskHandle {
    self.live.lock().insert(task.id, task.clone());
    self.live_group.add(1);
    tracing::debug!(
      task_id = %task.id,
      name = ?task.name,
      priority = ?task.priority,
      affinity = ?task.affinity,
      mode = ?task.mode,
      "Task spawned"
    );

    if self.is_shutdown() {
      // Lost the race against shutdown's sweep of the live set.
      self.retire(&task);
    } else if task.mode == CreateMode::Eager {
      self.schedule(&task);
    }
    TaskHandle::new(task)
  }

  fn run_task(&self, task: Arc<Task>) {
    if !task.transition_to_running() {
      return;
    }
    if task.affinity == Affinity::MainThread && thread::current().id() != self.main_thread.id() {
      tracing::error!(task_id = %task.id, "Main-thread task resumed on a worker thread");
      std::process::abort();
    }

    let outcome = {
      let mut body = task.body.lock();
      match body.as_mut() {
        None => Outcome::Completed,
        Some(body) => match panic::catch_unwind(AssertUnwindSafe(|| self.resume(&task, body))) {
          Ok(outcome) => outcome,
          Err(_) => {
            tracing::error!(task_id = %task.id, "Task body panicked; completing task");
            Outcome::Completed
          }
        },
      }
    };

    match outcome {
      Outcome::Completed => self.retire(&task),
      Outcome::Suspended => {
        if task.transition_to_suspended() {
          self.enqueue(task);
        }
      }
      Outcome::Yielded => {
        task.transition_to_yielded();
        self.enqueue(task);
      }
    }
  }

  fn resume(&self, task: &Arc<Task>, body: &mut TaskBody) -> Outcome {
    match body {
      TaskBody::Coroutine(future) => {
        let waker = waker_ref(task);
        let mut cx = Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
          Poll::Ready(()) => Outcome::Completed,
          Poll::Pending => Outcome::Suspended,
        }
      }
      TaskBody::Actor(actor) => {
        for _ in 0..self.config.message_budget {
          let Some(envelope) = task.mailbox.pop() else {
            return Outcome::Suspended;
          };
          if let Flow::Stop = actor.handle(envelope) {
            return Outcome::Completed;
          }
        }
        if task.mailbox.is_empty() {
          Outcome::Suspended
        } else {
          Outcome::Yielded
        }
      }
    }
  }

  /// Completes `task`: drops its body, rejects whatever is left in its
  /// mailbox and wakes joiners. Idempotent.
  fn retire(&self, task: &Arc<Task>) {
    if !task.transition_to_completed() {
      return;
    }
    let body = task.body.lock().take();
    task.mailbox.close();
    drop(body);

    if self.live.lock().remove(&task.id).is_some() {
      self.live_group.done();
    }
    task.notify_completed();
    tracing::debug!(task_id = %task.id, name = ?task.name, "Task completed");
  }

  fn run_main_batch(&self, limit: usize) -> usize {
    let mut ran = 0;
    while ran < limit {
      let Some(task) = self.main_queue.pop() else {
        break;
      };
      self.run_task(task);
      ran += 1;
    }
    ran
  }

  fn worker_loop(self: Arc<Self>, index: usize) {
    tracing::debug!(worker = index, "Worker started");
    while !self.is_shutdown() {
      if let Some(task) = self.worker_queue.pop() {
        self.run_task(task);
        continue;
      }
      let mut guard = self.idle.lock();
      if self.worker_queue.is_empty() && !self.is_shutdown() {
        self.idle_cv.wait_for(&mut guard, self.config.park_timeout);
      }
    }
    tracing::debug!(worker = index, "Worker stopped");
  }
}

impl fmt::Debug for SchedulerInner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SchedulerInner")
      .field("config", &self.config)
      .field("live", &self.live_group.get_count())
      .field("shutdown", &self.is_shutdown())
      .finish_non_exhaustive()
  }
}

/// Cloneable, thread-safe spawner for a [`Scheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
  inner: Arc<SchedulerInner>,
}

impl SchedulerHandle {
  /// Spawns a coroutine task. `body` receives the task's [`TaskContext`]
  /// and runs until the future it returns completes.
  pub fn spawn<F, Fut>(&self, options: TaskOptions, body: F) -> Result<TaskHandle, CotaskError>
  where
    F: FnOnce(TaskContext) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.inner.ensure_running()?;
    let id = self.inner.next_id();
    let mailbox = Arc::new(Mailbox::new(id));
    let priority = options.priority;
    let affinity = options.affinity;

    let task = Arc::new_cyclic(|weak| {
      let me = WeakTaskHandle::from_weak(id, weak.clone());
      let cx = TaskContext::new(id, priority, affinity, mailbox.clone(), me, self.clone());
      let future: BoxFuture<'static, ()> = Box::pin(body(cx));
      Task::new(
        id,
        options,
        mailbox.clone(),
        TaskBody::Coroutine(future),
        Arc::downgrade(&self.inner),
      )
    });
    Ok(self.inner.admit(task))
  }

  /// Spawns one of the built-in actors.
  pub fn spawn_actor(&self, options: TaskOptions, actor: impl Into<Actor>) -> Result<TaskHandle, CotaskError> {
    self.inner.ensure_running()?;
    let actor = actor.into();
    if let Some(required) = actor.required_affinity() {
      if required != options.affinity {
        return Err(CotaskError::InvalidArgument(format!(
          "{} actor requires {:?} affinity, got {:?}",
          actor.name(),
          required,
          options.affinity
        )));
      }
    }

    let id = self.inner.next_id();
    let task = Arc::new(Task::new(
      id,
      options,
      Arc::new(Mailbox::new(id)),
      TaskBody::Actor(actor),
      Arc::downgrade(&self.inner),
    ));
    Ok(self.inner.admit(task))
  }

  /// Resolves once no task is live. Tasks spawned while waiting are waited
  /// for as well.
  pub fn wait_all(&self) -> impl Future<Output = ()> + Send + 'static {
    let group = self.inner.live_group.clone();
    async move { group.wait().await }
  }

  /// Number of spawned tasks that have not completed.
  pub fn live_tasks(&self) -> usize {
    self.inner.live_group.get_count()
  }

  pub fn is_main_thread(&self) -> bool {
    thread::current().id() == self.inner.main_thread.id()
  }

  pub fn is_shutdown(&self) -> bool {
    self.inner.is_shutdown()
  }

  pub fn config(&self) -> &SchedulerConfig {
    &self.inner.config
  }
}

/// Owner of the worker pool.
///
/// The thread that constructs it becomes the main thread: `MainThread` tasks
/// only run inside [`Scheduler::block_on`] or [`Scheduler::run_until_idle`]
/// on that thread, which is why this type is neither `Send` nor `Sync`.
/// Dropping it shuts the runtime down.
pub struct Scheduler {
  handle: SchedulerHandle,
  workers: Vec<JoinHandle<()>>,
  _main_thread: PhantomData<*const ()>,
}

impl Scheduler {
  pub fn new(config: SchedulerConfig) -> Result<Self, CotaskError> {
    config.validate()?;
    let worker_threads = config.worker_threads;
    let thread_name = config.thread_name.clone();
    let inner = Arc::new(SchedulerInner::new(config));

    let mut scheduler = Self {
      handle: SchedulerHandle { inner: inner.clone() },
      workers: Vec::with_capacity(worker_threads),
      _main_thread: PhantomData,
    };
    for index in 0..worker_threads {
      let worker_inner = inner.clone();
      let worker = thread::Builder::new()
        .name(format!("{}-{}", thread_name, index))
        .spawn(move || worker_inner.worker_loop(index))
        .map_err(|e| CotaskError::Internal(format!("failed to spawn worker thread: {}", e)))?;
      scheduler.workers.push(worker);
    }
    tracing::info!(workers = worker_threads, "Scheduler started");
    Ok(scheduler)
  }

  pub fn with_defaults() -> Result<Self, CotaskError> {
    Self::new(SchedulerConfig::default())
  }

  pub fn handle(&self) -> SchedulerHandle {
    self.handle.clone()
  }

  pub fn spawn<F, Fut>(&self, options: TaskOptions, body: F) -> Result<TaskHandle, CotaskError>
  where
    F: FnOnce(TaskContext) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.handle.spawn(options, body)
  }

  pub fn spawn_actor(&self, options: TaskOptions, actor: impl Into<Actor>) -> Result<TaskHandle, CotaskError> {
    self.handle.spawn_actor(options, actor)
  }

  pub fn live_tasks(&self) -> usize {
    self.handle.live_tasks()
  }

  pub fn wait_all(&self) -> impl Future<Output = ()> + Send + 'static {
    self.handle.wait_all()
  }

  /// Resumes ready main-thread tasks until none is left. Returns how many
  /// resumes ran.
  pub fn run_until_idle(&self) -> usize {
    let mut total = 0;
    loop {
      let ran = self.handle.inner.run_main_batch(MAIN_BATCH);
      total += ran;
      if ran < MAIN_BATCH {
        return total;
      }
    }
  }

  /// Drives `future` to completion on the main thread, running main-thread
  /// tasks whenever they become ready.
  pub fn block_on<F: Future>(&self, future: F) -> F::Output {
    let mut future = std::pin::pin!(future);
    let signal = Arc::new(MainSignal {
      thread: thread::current(),
      woken: AtomicBool::new(true),
    });
    let waker = futures::task::waker(signal.clone());
    let mut cx = Context::from_waker(&waker);
    let inner = &self.handle.inner;

    loop {
      if signal.woken.swap(false, Ordering::AcqRel) {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
          return output;
        }
      }
      let ran = inner.run_main_batch(MAIN_BATCH);
      if ran == 0 && inner.main_queue.is_empty() && !signal.woken.load(Ordering::Acquire) {
        thread::park_timeout(inner.config.park_timeout);
      }
    }
  }

  /// Stops the workers and completes every live task. Messages still queued
  /// resolve their tokens with [`CotaskError::Undelivered`].
  pub fn shutdown(mut self) {
    self.shutdown_inner();
  }

  fn shutdown_inner(&mut self) {
    let inner = self.handle.inner.clone();
    if inner.shutdown.swap(true, Ordering::AcqRel) {
      return;
    }
    tracing::info!("Scheduler shutdown initiated");
    {
      let _guard = inner.idle.lock();
      inner.idle_cv.notify_all();
    }
    for worker in self.workers.drain(..) {
      if worker.join().is_err() {
        tracing::warn!("Worker thread panicked");
      }
    }

    inner.worker_queue.clear();
    inner.main_queue.clear();
    let live: Vec<Arc<Task>> = inner.live.lock().values().cloned().collect();
    for task in &live {
      inner.retire(task);
    }
    tracing::info!(retired = live.len(), "Scheduler shutdown complete");
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) {
    self.shutdown_inner();
  }
}

impl fmt::Debug for Scheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scheduler")
      .field("inner", &self.handle.inner)
      .field("workers", &self.workers.len())
      .finish()
  }
}

/// Waker target for the future driven by `block_on`.
struct MainSignal {
  thread: Thread,
  woken: AtomicBool,
}

impl ArcWake for MainSignal {
  fn wake_by_ref(arc_self: &Arc<Self>) {
    arc_self.woken.store(true, Ordering::Release);
    arc_self.thread.unpark();
  }
}
