pub mod bench;
pub mod demo;

use std::time::Instant;

/// Runs `f` and reports how long it took under `label`.
pub fn timed<T>(label: &str, f: impl FnOnce() -> T) -> T {
  let started = Instant::now();
  let output = f();
  let elapsed = started.elapsed();
  tracing::info!(label, ?elapsed, "Timed block finished");
  println!("{}: {:.3?}", label, elapsed);
  output
}
