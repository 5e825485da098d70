// tests/queue_harness.rs

use cotask::harness::{self, HarnessConfig, HarnessViolation};
use cotask::{BlockingQueue, CotaskError, LockfreeQueue, Queue};
use proptest::prelude::*;
use std::sync::Arc;
mod common;

fn run_and_verify<Q: Queue<usize> + Default>(config: &HarnessConfig) -> Result<Vec<usize>, HarnessViolation> {
  let queue = Q::default();
  let result = Q::default();
  let report = harness::run(&queue, &result, config).expect("valid config");
  assert_eq!(report.produced, config.values);
  assert_eq!(report.consumed, config.values);
  harness::verify(&result, config.values).map(|set| set.into_iter().collect())
}

// --- Test: The 100 values / 4 producers / 4 consumers scenario ---
#[test]
fn test_lockfree_hundred_values_four_by_four() {
  common::setup_tracing();
  let config = HarnessConfig::new(4, 4, 100);
  let drained = run_and_verify::<LockfreeQueue<usize>>(&config).expect("no loss, no duplication");
  assert_eq!(drained.len(), 100);
  assert_eq!(drained, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_blocking_hundred_values_four_by_four() {
  let config = HarnessConfig::new(4, 4, 100);
  let drained = run_and_verify::<BlockingQueue<usize>>(&config).expect("no loss, no duplication");
  assert_eq!(drained, (0..100).collect::<Vec<_>>());
}

// --- Test: Heavier contention on the lock-free queue ---
#[test]
fn test_lockfree_high_contention() {
  common::setup_tracing();
  let config = HarnessConfig::new(32, 32, 200_000);
  let drained = run_and_verify::<LockfreeQueue<usize>>(&config).expect("no loss, no duplication");
  assert_eq!(drained.len(), 200_000);
  assert_eq!(drained.first(), Some(&0));
  assert_eq!(drained.last(), Some(&199_999));
}

// --- Test: Shared queues passed as Arc ---
#[test]
fn test_harness_accepts_shared_queues() {
  let queue: Arc<LockfreeQueue<usize>> = Arc::new(LockfreeQueue::new());
  let result = Arc::new(BlockingQueue::new());
  let config = HarnessConfig::new(2, 3, 1_000);
  harness::run(&queue, &result, &config).unwrap();
  assert_eq!(harness::verify(&result, 1_000).unwrap().len(), 1_000);
  assert!(queue.dequeue().is_none(), "input queue fully consumed");
}

#[test]
fn test_invalid_config_is_rejected() {
  let queue = LockfreeQueue::new();
  let result = LockfreeQueue::new();
  let err = harness::run(&queue, &result, &HarnessConfig::new(0, 4, 10)).unwrap_err();
  assert!(matches!(err, CotaskError::InvalidArgument(_)));
}

// --- Test: Idempotent drain ---
#[test]
fn test_drained_queue_stays_empty_until_next_enqueue() {
  let queue = LockfreeQueue::new();
  for v in 0..10usize {
    queue.enqueue(v);
  }
  while queue.dequeue().is_some() {}
  for _ in 0..100 {
    assert_eq!(queue.dequeue(), None);
  }
  queue.enqueue(42);
  assert_eq!(queue.dequeue(), Some(42));
  assert_eq!(queue.dequeue(), None);
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(24))]

  // Both implementations satisfy the same completeness property for the
  // same shape; only throughput differs.
  #[test]
  fn prop_implementations_are_interchangeable(
    producers in 1usize..=8,
    consumers in 1usize..=8,
    values in 1usize..2_000,
  ) {
    let config = HarnessConfig::new(producers, consumers, values);
    let lockfree = run_and_verify::<LockfreeQueue<usize>>(&config);
    let blocking = run_and_verify::<BlockingQueue<usize>>(&config);
    prop_assert!(lockfree.is_ok());
    prop_assert_eq!(lockfree, blocking);
  }
}
