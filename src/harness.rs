// src/harness.rs

//! Producer/consumer verification protocol for [`Queue`] implementations.
//!
//! `P` producers claim unique integers `0..N` from a shared counter and
//! enqueue them; `C` consumers move values into a result queue until `N`
//! values have been moved. Draining the result queue must then yield exactly
//! the contiguous range `[0, N)`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use thiserror::Error;

use crate::error::CotaskError;
use crate::queue::Queue;

pub const DEFAULT_PRODUCERS: usize = 32;
pub const DEFAULT_CONSUMERS: usize = 32;
pub const DEFAULT_VALUES: usize = 10_000_000;

/// Shape of one harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
  pub producers: usize,
  pub consumers: usize,
  pub values: usize,
}

impl HarnessConfig {
  pub fn new(producers: usize, consumers: usize, values: usize) -> Self {
    Self {
      producers,
      consumers,
      values,
    }
  }

  pub fn validate(&self) -> Result<(), CotaskError> {
    if self.producers == 0 || self.consumers == 0 || self.values == 0 {
      return Err(CotaskError::InvalidArgument(format!(
        "harness needs at least one producer, consumer and value (got {:?})",
        self
      )));
    }
    Ok(())
  }
}

impl Default for HarnessConfig {
  fn default() -> Self {
    Self::new(DEFAULT_PRODUCERS, DEFAULT_CONSUMERS, DEFAULT_VALUES)
  }
}

/// Counters observed at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessReport {
  pub produced: usize,
  pub consumed: usize,
  pub elapsed: Duration,
}

/// A broken queue contract. Callers outside tests treat this as fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessViolation {
  #[error("drained {actual} distinct values, expected {expected}")]
  Cardinality { expected: usize, actual: usize },
  #[error("drained set has a gap: expected {expected}, found {found}")]
  Gap { expected: usize, found: usize },
}

/// Runs the full producer/consumer exchange and returns once every consumer
/// has observed `values` moved items.
pub fn run<Q, R>(queue: &Q, result: &R, config: &HarnessConfig) -> Result<HarnessReport, CotaskError>
where
  Q: Queue<usize>,
  R: Queue<usize>,
{
  config.validate()?;
  let produced = AtomicUsize::new(0);
  let consumed = AtomicUsize::new(0);
  let started = Instant::now();

  tracing::debug!(
    producers = config.producers,
    consumers = config.consumers,
    values = config.values,
    "Starting producer/consumer run"
  );

  thread::scope(|s| {
    for _ in 0..config.producers {
      s.spawn(|| produce(queue, &produced, config.values));
    }
    for _ in 0..config.consumers {
      s.spawn(|| consume(queue, result, &consumed, config.values));
    }
  });

  let report = HarnessReport {
    produced: produced.load(Ordering::Acquire),
    consumed: consumed.load(Ordering::Acquire),
    elapsed: started.elapsed(),
  };
  tracing::debug!(?report, "Producer/consumer run finished");
  Ok(report)
}

/// Claims slots until the counter reaches `total`. A claimed slot is always
/// enqueued before the next claim.
fn produce<Q: Queue<usize>>(queue: &Q, produced: &AtomicUsize, total: usize) {
  loop {
    let mut claimed = produced.load(Ordering::Relaxed);
    loop {
      if claimed >= total {
        return;
      }
      match produced.compare_exchange_weak(claimed, claimed + 1, Ordering::AcqRel, Ordering::Relaxed) {
        Ok(_) => break,
        Err(current) => claimed = current,
      }
    }
    queue.enqueue(claimed);
  }
}

/// Moves values into `result` until `total` have been moved by all consumers.
/// An empty dequeue spins rather than ending the consumer early.
fn consume<Q: Queue<usize>, R: Queue<usize>>(queue: &Q, result: &R, consumed: &AtomicUsize, total: usize) {
  let backoff = Backoff::new();
  while consumed.load(Ordering::Acquire) < total {
    match queue.dequeue() {
      Some(value) => {
        result.enqueue(value);
        // Each retry uses the freshly observed count.
        let mut current = consumed.load(Ordering::Relaxed);
        while let Err(actual) =
          consumed.compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
        {
          current = actual;
        }
        backoff.reset();
      }
      None => backoff.snooze(),
    }
  }
}

/// Drains `result` and checks it holds exactly `0..expected`.
pub fn verify<R: Queue<usize>>(result: &R, expected: usize) -> Result<BTreeSet<usize>, HarnessViolation> {
  let mut set = BTreeSet::new();
  while let Some(value) = result.dequeue() {
    set.insert(value);
  }

  if set.len() != expected {
    return Err(HarnessViolation::Cardinality {
      expected,
      actual: set.len(),
    });
  }
  for (expected, &found) in set.iter().enumerate() {
    if expected != found {
      return Err(HarnessViolation::Gap { expected, found });
    }
  }
  Ok(set)
}

/// Like [`verify`], but a violation terminates the process after logging it.
pub fn verify_or_abort<R: Queue<usize>>(result: &R, expected: usize) -> BTreeSet<usize> {
  match verify(result, expected) {
    Ok(set) => set,
    Err(violation) => {
      tracing::error!(%violation, expected, "Queue contract violated");
      eprintln!("fatal: queue contract violated: {}", violation);
      std::process::abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::{BlockingQueue, LockfreeQueue};

  #[test]
  fn hundred_values_four_by_four() {
    let queue = LockfreeQueue::new();
    let result = LockfreeQueue::new();
    let config = HarnessConfig::new(4, 4, 100);

    let report = run(&queue, &result, &config).unwrap();
    assert_eq!(report.produced, 100);
    assert_eq!(report.consumed, 100);

    let set = verify(&result, 100).unwrap();
    assert_eq!(set.len(), 100);
    assert!(set.iter().copied().eq(0..100));
    assert!(queue.is_empty());
  }

  #[test]
  fn verify_reports_missing_values() {
    let result = BlockingQueue::new();
    for v in [0, 1, 2] {
      result.enqueue(v);
    }
    assert_eq!(
      verify(&result, 4),
      Err(HarnessViolation::Cardinality { expected: 4, actual: 3 })
    );
  }

  #[test]
  fn verify_reports_gaps() {
    let result = BlockingQueue::new();
    for v in [0, 1, 3] {
      result.enqueue(v);
    }
    assert_eq!(verify(&result, 3), Err(HarnessViolation::Gap { expected: 2, found: 3 }));
  }

  #[test]
  fn duplicates_collapse_and_fail_cardinality() {
    let result = BlockingQueue::new();
    for v in [0, 1, 1] {
      result.enqueue(v);
    }
    assert!(matches!(
      verify(&result, 3),
      Err(HarnessViolation::Cardinality { expected: 3, actual: 2 })
    ));
  }

  #[test]
  fn zero_sized_config_is_rejected() {
    let queue = BlockingQueue::new();
    let result = BlockingQueue::new();
    let err = run(&queue, &result, &HarnessConfig::new(0, 1, 10)).unwrap_err();
    assert!(matches!(err, CotaskError::InvalidArgument(_)));
  }
}
