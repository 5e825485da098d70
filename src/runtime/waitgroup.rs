// src/runtime/waitgroup.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Counts live tasks; `wait` resolves whenever the count is back at zero.
///
/// Executor-agnostic: `Notify` needs no runtime, so the scheduler's own
/// `block_on` can drive `wait`.
#[derive(Debug, Clone)]
pub(crate) struct WaitGroup {
  count: Arc<AtomicUsize>,
  notify_on_zero: Arc<Notify>,
}

impl WaitGroup {
  pub fn new() -> Self {
    Self {
      count: Arc::new(AtomicUsize::new(0)),
      notify_on_zero: Arc::new(Notify::new()),
    }
  }

  pub fn add(&self, delta: usize) {
    if delta == 0 {
      return;
    }
    let old_count = self.count.fetch_add(delta, Ordering::Relaxed);
    tracing::trace!(old_count, delta, "WaitGroup add");
  }

  /// Panics if the count would drop below zero: every `done` must pair with
  /// an earlier `add`.
  pub fn done(&self) {
    let old_count = self.count.fetch_sub(1, Ordering::AcqRel);
    if old_count == 0 {
      self.count.fetch_add(1, Ordering::Relaxed);
      panic!("WaitGroup::done() called when count was already zero!");
    }
    if old_count == 1 {
      tracing::trace!("WaitGroup count reached zero, notifying waiters");
      self.notify_on_zero.notify_waiters();
    }
  }

  pub async fn wait(&self) {
    loop {
      // Created before the check so a concurrent `done` cannot slip between.
      let notified = self.notify_on_zero.notified();
      if self.count.load(Ordering::Acquire) == 0 {
        return;
      }
      notified.await;
    }
  }

  pub fn get_count(&self) -> usize {
    self.count.load(Ordering::Relaxed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::time::timeout;

  #[tokio::test]
  async fn wait_releases_after_last_done() {
    let wg = WaitGroup::new();
    wg.add(2);
    assert_eq!(wg.get_count(), 2);

    let waiter = wg.clone();
    let mut wait_task = tokio::spawn(async move { waiter.wait().await });

    wg.done();
    assert!(
      timeout(Duration::from_millis(20), &mut wait_task).await.is_err(),
      "Wait task should still be blocked after one done()"
    );

    wg.done();
    assert!(
      timeout(Duration::from_millis(200), wait_task).await.is_ok(),
      "Wait task should complete after second done()"
    );
    assert_eq!(wg.get_count(), 0);
  }

  #[tokio::test]
  async fn wait_on_zero_returns_immediately() {
    let wg = WaitGroup::new();
    assert!(timeout(Duration::from_millis(10), wg.wait()).await.is_ok());
  }

  #[test]
  #[should_panic]
  fn done_below_zero_panics() {
    let wg = WaitGroup::new();
    wg.done();
  }
}
