// tests/common.rs
#![allow(dead_code)] // Not every test binary uses every helper

use cotask::{Scheduler, SchedulerConfig};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tokio::time::timeout;

// Use std::sync::Once for one-time initialization
static TRACING_INIT: Once = Once::new();

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(250);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(5);

// Setup function to initialize tracing
pub fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Can be overridden by RUST_LOG env variable
    let default_filter = "cotask=debug,warn";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_max_level(tracing::Level::TRACE)
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_thread_names(true)
      .with_span_events(FmtSpan::CLOSE)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

// Helper to create a scheduler whose main thread is the calling test thread
pub fn test_scheduler(workers: usize) -> Scheduler {
  setup_tracing();
  Scheduler::new(
    SchedulerConfig::default()
      .with_workers(workers)
      .with_thread_name("cotask-test"),
  )
  .expect("Failed to create test scheduler")
}

// Helper for awaiting on a foreign executor with a timeout assertion
pub async fn within<T>(duration: Duration, fut: impl Future<Output = T>) -> T {
  match timeout(duration, fut).await {
    Ok(value) => value,
    Err(_) => panic!("Operation did not complete within {:?}", duration),
  }
}
