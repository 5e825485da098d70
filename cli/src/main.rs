mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
  let cli_args = Cli::parse();

  // Can be overridden by RUST_LOG env variable
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli_args.log));
  let subscriber = FmtSubscriber::builder()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_thread_names(true)
    .finish();
  tracing::subscriber::set_global_default(subscriber)?;

  match cli_args.command {
    Commands::Bench(bench_args) => commands::bench::run_bench(bench_args),
    Commands::Demo(demo_args) => commands::demo::run_demo(demo_args),
  }
}
