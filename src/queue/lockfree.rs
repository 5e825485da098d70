// src/queue/lockfree.rs

//! Lock-free unbounded MPMC queue (Michael-Scott linked list).
//!
//! The list always starts with a sentinel node whose value slot is empty.
//! A dequeue swings `head` to the sentinel's successor and moves the value
//! out of that successor, which then becomes the new sentinel. Retired
//! sentinels are reclaimed through `crossbeam::epoch` so no thread ever
//! dereferences freed memory.
//!
//! Ordering discipline: every load whose result decides whether to retry is
//! `Acquire`; every successful CAS that publishes a node or moves an end of
//! the list is `Release`. A value is written into its node before the node is
//! linked with a `Release` CAS, so a consumer that observes the link with
//! `Acquire` also observes the fully constructed value.

use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering;

use crossbeam::epoch::{self, Atomic, Owned, Shared};
use crossbeam::utils::{Backoff, CachePadded};

use super::Queue;

struct Node<T> {
  /// Uninitialized for the sentinel; initialized for every linked successor
  /// until a consumer moves the value out.
  value: MaybeUninit<T>,
  next: Atomic<Node<T>>,
}

/// Lock-free queue safe for any number of concurrent producers and consumers.
pub struct LockfreeQueue<T> {
  head: CachePadded<Atomic<Node<T>>>,
  tail: CachePadded<Atomic<Node<T>>>,
}

// SAFETY: values are moved in by one thread and out by exactly one other
// thread; a `T` is never shared, only transferred, so `T: Send` suffices.
unsafe impl<T: Send> Send for LockfreeQueue<T> {}
unsafe impl<T: Send> Sync for LockfreeQueue<T> {}

impl<T> LockfreeQueue<T> {
  pub fn new() -> Self {
    let queue = Self {
      head: CachePadded::new(Atomic::null()),
      tail: CachePadded::new(Atomic::null()),
    };
    let sentinel = Owned::new(Node {
      value: MaybeUninit::uninit(),
      next: Atomic::null(),
    });
    // SAFETY: the queue is not shared yet.
    unsafe {
      let guard = epoch::unprotected();
      let sentinel = sentinel.into_shared(guard);
      queue.head.store(sentinel, Ordering::Relaxed);
      queue.tail.store(sentinel, Ordering::Relaxed);
    }
    queue
  }

  /// Appends `value`. Contention only costs retries; the call never fails.
  pub fn push(&self, value: T) {
    let guard = &epoch::pin();
    let node = Owned::new(Node {
      value: MaybeUninit::new(value),
      next: Atomic::null(),
    })
    .into_shared(guard);
    let backoff = Backoff::new();

    loop {
      let tail = self.tail.load(Ordering::Acquire, guard);
      // SAFETY: `tail` is never null and cannot be reclaimed while pinned.
      let tail_ref = unsafe { tail.deref() };
      let next = tail_ref.next.load(Ordering::Acquire, guard);

      if !next.is_null() {
        // Tail is lagging behind a concurrent push; help it forward.
        let _ = self
          .tail
          .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
        continue;
      }

      if tail_ref
        .next
        .compare_exchange(Shared::null(), node, Ordering::Release, Ordering::Relaxed, guard)
        .is_ok()
      {
        // Failure is fine: someone else already advanced the tail past us.
        let _ = self
          .tail
          .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed, guard);
        return;
      }
      backoff.spin();
    }
  }

  /// Removes some value, or returns `None` if the queue was observed empty.
  pub fn pop(&self) -> Option<T> {
    let guard = &epoch::pin();
    let backoff = Backoff::new();

    loop {
      let head = self.head.load(Ordering::Acquire, guard);
      // SAFETY: `head` is never null and cannot be reclaimed while pinned.
      let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
      // SAFETY: a non-null successor stays allocated while pinned.
      let next_ref = unsafe { next.as_ref() }?;

      if self
        .head
        .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
        .is_ok()
      {
        // Tail must never point at a node we are about to retire.
        let tail = self.tail.load(Ordering::Relaxed, guard);
        if head == tail {
          let _ = self
            .tail
            .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
        }
        // SAFETY: winning the head CAS gives this thread sole ownership of the
        // value in `next`; `next` is now the sentinel and its slot counts as
        // uninitialized. The old sentinel is unreachable for new readers.
        unsafe {
          guard.defer_destroy(head);
          return Some(next_ref.value.as_ptr().read());
        }
      }
      backoff.spin();
    }
  }

  /// Snapshot emptiness check; may be stale by the time it returns.
  pub fn is_empty(&self) -> bool {
    let guard = &epoch::pin();
    let head = self.head.load(Ordering::Acquire, guard);
    // SAFETY: `head` is never null and cannot be reclaimed while pinned.
    unsafe { head.deref() }.next.load(Ordering::Acquire, guard).is_null()
  }
}

impl<T> Default for LockfreeQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Drop for LockfreeQueue<T> {
  fn drop(&mut self) {
    // SAFETY: `&mut self` means no other thread can reach the list.
    unsafe {
      let guard = epoch::unprotected();
      while self.pop().is_some() {}
      let sentinel = self.head.load(Ordering::Relaxed, guard);
      drop(sentinel.into_owned());
    }
  }
}

impl<T: Send> Queue<T> for LockfreeQueue<T> {
  fn enqueue(&self, value: T) {
    self.push(value)
  }

  fn dequeue(&self) -> Option<T> {
    self.pop()
  }
}

impl<T> fmt::Debug for LockfreeQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LockfreeQueue")
      .field("is_empty", &self.is_empty())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Arc;
  use std::thread;

  #[test]
  fn single_thread_is_fifo() {
    let q = LockfreeQueue::new();
    for i in 0..10 {
      q.push(i);
    }
    for i in 0..10 {
      assert_eq!(q.pop(), Some(i));
    }
    assert_eq!(q.pop(), None);
  }

  #[test]
  fn drained_queue_stays_empty_until_next_push() {
    let q = LockfreeQueue::new();
    q.push("a");
    assert_eq!(q.pop(), Some("a"));
    for _ in 0..100 {
      assert_eq!(q.pop(), None);
      assert!(q.is_empty());
    }
    q.push("b");
    assert!(!q.is_empty());
    assert_eq!(q.pop(), Some("b"));
    assert_eq!(q.pop(), None);
  }

  #[test]
  fn drop_releases_queued_values() {
    struct Counted(Arc<AtomicUsize>);
    impl Drop for Counted {
      fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
      }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    {
      let q = LockfreeQueue::new();
      for _ in 0..5 {
        q.push(Counted(drops.clone()));
      }
      drop(q.pop());
      assert_eq!(drops.load(Ordering::Relaxed), 1);
    }
    assert_eq!(drops.load(Ordering::Relaxed), 5);
  }

  #[test]
  fn concurrent_pushers_and_poppers_lose_nothing() {
    const PER_PRODUCER: usize = 10_000;
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;

    let q = Arc::new(LockfreeQueue::new());
    let popped = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
      .map(|p| {
        let q = q.clone();
        thread::spawn(move || {
          for i in 0..PER_PRODUCER {
            q.push(p * PER_PRODUCER + i);
          }
        })
      })
      .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
      .map(|_| {
        let q = q.clone();
        let popped = popped.clone();
        thread::spawn(move || {
          let mut seen = Vec::new();
          while popped.load(Ordering::Acquire) < PRODUCERS * PER_PRODUCER {
            if let Some(v) = q.pop() {
              seen.push(v);
              popped.fetch_add(1, Ordering::AcqRel);
            }
          }
          seen
        })
      })
      .collect();

    for p in producers {
      p.join().unwrap();
    }
    let mut all = HashSet::new();
    for c in consumers {
      for v in c.join().unwrap() {
        assert!(all.insert(v), "value {} dequeued twice", v);
      }
    }
    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    assert!(q.is_empty());
  }
}
