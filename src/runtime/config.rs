// src/runtime/config.rs

use std::time::Duration;

use crate::error::CotaskError;

/// Environment variable overriding the default worker count.
pub const WORKERS_ENV: &str = "COTASK_WORKERS";

pub const DEFAULT_MESSAGE_BUDGET: usize = 64;
pub const DEFAULT_PARK_TIMEOUT: Duration = Duration::from_millis(10);
pub const DEFAULT_THREAD_NAME: &str = "cotask-worker";
/// Used when the platform cannot report its parallelism.
pub const FALLBACK_WORKERS: usize = 4;
pub const MAX_WORKERS: usize = 256;

/// Scheduler construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
  /// Size of the `AnyWorkerThread` pool. The main thread is extra.
  pub worker_threads: usize,
  /// Envelopes a built-in actor handles per resume before yielding.
  pub message_budget: usize,
  /// Upper bound on how long an idle thread sleeps before rechecking.
  pub park_timeout: Duration,
  /// Prefix for worker thread names; the index is appended.
  pub thread_name: String,
}

impl SchedulerConfig {
  pub fn with_workers(mut self, worker_threads: usize) -> Self {
    self.worker_threads = worker_threads;
    self
  }

  pub fn with_message_budget(mut self, message_budget: usize) -> Self {
    self.message_budget = message_budget;
    self
  }

  pub fn with_park_timeout(mut self, park_timeout: Duration) -> Self {
    self.park_timeout = park_timeout;
    self
  }

  pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
    self.thread_name = thread_name.into();
    self
  }

  pub fn validate(&self) -> Result<(), CotaskError> {
    if self.worker_threads == 0 || self.worker_threads > MAX_WORKERS {
      return Err(CotaskError::InvalidArgument(format!(
        "worker_threads must be within 1..={}, got {}",
        MAX_WORKERS, self.worker_threads
      )));
    }
    if self.message_budget == 0 {
      return Err(CotaskError::InvalidArgument("message_budget must be at least 1".into()));
    }
    if self.park_timeout.is_zero() {
      return Err(CotaskError::InvalidArgument("park_timeout must be non-zero".into()));
    }
    Ok(())
  }
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      worker_threads: default_worker_threads(),
      message_budget: DEFAULT_MESSAGE_BUDGET,
      park_timeout: DEFAULT_PARK_TIMEOUT,
      thread_name: DEFAULT_THREAD_NAME.to_string(),
    }
  }
}

fn default_worker_threads() -> usize {
  let detected = std::thread::available_parallelism()
    .map(std::num::NonZeroUsize::get)
    .unwrap_or(FALLBACK_WORKERS);

  match std::env::var(WORKERS_ENV) {
    Ok(value) => match value.parse::<usize>() {
      Ok(n) if n > 0 => n.min(MAX_WORKERS),
      _ => {
        tracing::warn!(%value, "{} is invalid, using {} workers", WORKERS_ENV, detected);
        detected
      }
    },
    Err(_) => detected,
  }
  .min(MAX_WORKERS)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    assert!(SchedulerConfig::default().validate().is_ok());
  }

  #[test]
  fn rejects_empty_pool_and_budget() {
    let base = SchedulerConfig::default();
    assert!(matches!(
      base.clone().with_workers(0).validate(),
      Err(CotaskError::InvalidArgument(_))
    ));
    assert!(matches!(
      base.clone().with_message_budget(0).validate(),
      Err(CotaskError::InvalidArgument(_))
    ));
    assert!(base.with_park_timeout(Duration::ZERO).validate().is_err());
  }
}
