// src/runtime/ready_queue.rs

//! Priority-ordered run queue for one affinity class.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::queue::LockfreeQueue;
use crate::runtime::task::{Priority, Task};

/// One lock-free lane per priority level; `pop` always serves the highest
/// non-empty lane first.
#[derive(Debug)]
pub(crate) struct ReadyQueue {
  lanes: [LockfreeQueue<Arc<Task>>; Priority::LEVELS],
  pending: AtomicUsize,
}

impl ReadyQueue {
  pub(crate) fn new() -> Self {
    Self {
      lanes: std::array::from_fn(|_| LockfreeQueue::new()),
      pending: AtomicUsize::new(0),
    }
  }

  pub(crate) fn push(&self, task: Arc<Task>) {
    let lane = task.priority.index();
    // Counted before it becomes poppable so `pending` never underflows.
    self.pending.fetch_add(1, Ordering::Release);
    self.lanes[lane].push(task);
  }

  pub(crate) fn pop(&self) -> Option<Arc<Task>> {
    for lane in self.lanes.iter().rev() {
      if let Some(task) = lane.pop() {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        return Some(task);
      }
    }
    None
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.pending.load(Ordering::Acquire) == 0
  }

  pub(crate) fn clear(&self) -> usize {
    let mut cleared = 0;
    while self.pop().is_some() {
      cleared += 1;
    }
    cleared
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::actors::{Actor, EchoActor};
  use crate::runtime::mailbox::Mailbox;
  use crate::runtime::task::{TaskBody, TaskId, TaskOptions};
  use std::sync::Weak;

  fn task(raw: u64, priority: Priority) -> Arc<Task> {
    let id = TaskId::from_raw(raw);
    Arc::new(Task::new(
      id,
      TaskOptions::new().priority(priority),
      Arc::new(Mailbox::new(id)),
      TaskBody::Actor(Actor::Echo(EchoActor::new())),
      Weak::new(),
    ))
  }

  #[test]
  fn higher_priority_is_served_first() {
    let queue = ReadyQueue::new();
    queue.push(task(1, Priority::Low));
    queue.push(task(2, Priority::Critical));
    queue.push(task(3, Priority::Normal));
    queue.push(task(4, Priority::High));

    let order: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|t| t.id.as_u64()).collect();
    assert_eq!(order, vec![2, 4, 3, 1]);
    assert!(queue.is_empty());
  }

  #[test]
  fn same_priority_keeps_arrival_order() {
    let queue = ReadyQueue::new();
    for raw in 1..=3 {
      queue.push(task(raw, Priority::Normal));
    }
    assert_eq!(queue.clear(), 3);
    assert!(queue.pop().is_none());
  }
}
