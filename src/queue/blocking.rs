// src/queue/blocking.rs

//! Mutex-guarded baseline used to validate and benchmark [`LockfreeQueue`].
//!
//! [`LockfreeQueue`]: super::LockfreeQueue

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;

use super::Queue;

/// A FIFO behind a single lock.
pub struct BlockingQueue<T> {
  inner: Mutex<VecDeque<T>>,
}

impl<T> BlockingQueue<T> {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(VecDeque::new()),
    }
  }

  pub fn len(&self) -> usize {
    self.inner.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().is_empty()
  }
}

impl<T> Default for BlockingQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Send> Queue<T> for BlockingQueue<T> {
  fn enqueue(&self, value: T) {
    self.inner.lock().push_back(value);
  }

  fn dequeue(&self) -> Option<T> {
    self.inner.lock().pop_front()
  }
}

impl<T> fmt::Debug for BlockingQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BlockingQueue").field("len", &self.len()).finish()
  }
}
