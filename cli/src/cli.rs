use clap::{builder::TypedValueParser, Parser};

use cotask::harness::{DEFAULT_CONSUMERS, DEFAULT_PRODUCERS, DEFAULT_VALUES};

#[derive(Parser, Debug)]
#[clap(name = "cotask", version, about = "cotask Command Line Utility")]
pub struct Cli {
  /// Log filter used when RUST_LOG is not set (e.g. "cotask=debug")
  #[clap(long, global = true, default_value = "cotask=info")]
  pub log: String,

  #[clap(subcommand)]
  pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
  /// Run the producer/consumer harness and verify the drained values
  Bench(BenchArgs),
  /// Exchange calls between worker and main-thread actors
  Demo(DemoArgs),
}

#[derive(Parser, Debug)]
pub struct BenchArgs {
  /// Number of producer threads
  #[clap(long, short, default_value_t = DEFAULT_PRODUCERS)]
  pub producers: usize,

  /// Number of consumer threads
  #[clap(long, short, default_value_t = DEFAULT_CONSUMERS)]
  pub consumers: usize,

  /// Total number of values moved through the queue
  #[clap(long, short = 'n', default_value_t = DEFAULT_VALUES)]
  pub values: usize,

  /// Which queue implementation to exercise
  #[clap(long, short, value_parser = clap::builder::PossibleValuesParser::new(["lockfree", "blocking", "both"]).map(|s| s.to_lowercase()), default_value = "both")]
  pub queue: String,

  /// Repeat each run this many times
  #[clap(long, short, default_value_t = 1)]
  pub repeat: usize,
}

#[derive(Parser, Debug)]
pub struct DemoArgs {
  /// Worker threads (defaults to COTASK_WORKERS or the available parallelism)
  #[clap(long, short)]
  pub workers: Option<usize>,

  /// Counter calls issued by the driver task
  #[clap(long, default_value_t = 1_000)]
  pub calls: usize,
}
