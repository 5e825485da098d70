// src/queue/mod.rs

//! Unbounded multi-producer/multi-consumer queues.
//!
//! Both implementations satisfy the same two-operation contract: every value
//! passed to `enqueue` is returned by exactly one `dequeue`. Neither promises
//! FIFO order across concurrent producers.

pub mod blocking;
pub mod lockfree;

pub use blocking::BlockingQueue;
pub use lockfree::LockfreeQueue;

/// The contract shared by every queue in the crate.
///
/// `enqueue` never rejects a value. `dequeue` never blocks; `None` means the
/// queue was observed empty and callers that need a value retry.
pub trait Queue<T>: Send + Sync {
  fn enqueue(&self, value: T);

  fn dequeue(&self) -> Option<T>;
}

impl<T, Q> Queue<T> for &Q
where
  Q: Queue<T> + ?Sized,
{
  fn enqueue(&self, value: T) {
    (**self).enqueue(value)
  }

  fn dequeue(&self) -> Option<T> {
    (**self).dequeue()
  }
}

impl<T, Q> Queue<T> for std::sync::Arc<Q>
where
  Q: Queue<T> + ?Sized,
{
  fn enqueue(&self, value: T) {
    (**self).enqueue(value)
  }

  fn dequeue(&self) -> Option<T> {
    (**self).dequeue()
  }
}
