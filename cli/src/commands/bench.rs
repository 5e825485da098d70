use crate::cli::BenchArgs;
use crate::commands::timed;

use anyhow::{Context, Result};
use cotask::harness::{self, HarnessConfig};
use cotask::{BlockingQueue, LockfreeQueue, Queue};

pub fn run_bench(args: BenchArgs) -> Result<()> {
  let config = HarnessConfig::new(args.producers, args.consumers, args.values);
  config.validate().context("invalid harness shape")?;

  let kinds: &[&str] = match args.queue.as_str() {
    "lockfree" => &["lockfree"],
    "blocking" => &["blocking"],
    _ => &["lockfree", "blocking"],
  };

  println!(
    "Moving {} values with {} producers and {} consumers",
    config.values, config.producers, config.consumers
  );
  for round in 1..=args.repeat.max(1) {
    for kind in kinds {
      let label = format!("{} (round {})", kind, round);
      match *kind {
        "lockfree" => run_with::<LockfreeQueue<usize>>(&label, &config)?,
        _ => run_with::<BlockingQueue<usize>>(&label, &config)?,
      }
    }
  }
  Ok(())
}

fn run_with<Q: Queue<usize> + Default>(label: &str, config: &HarnessConfig) -> Result<()> {
  let queue = Q::default();
  let result = Q::default();
  let report = timed(label, || harness::run(&queue, &result, config))?;

  // A violation here is a broken queue, not a usage error.
  let drained = harness::verify_or_abort(&result, config.values);
  let secs = report.elapsed.as_secs_f64().max(f64::EPSILON);
  println!(
    "  verified {} distinct values ({} produced, {} consumed), {:.0} values/s",
    drained.len(),
    report.produced,
    report.consumed,
    report.consumed as f64 / secs
  );
  Ok(())
}
