use crate::cli::DemoArgs;
use crate::commands::timed;

use anyhow::{Context, Result};
use cotask::actors::{CounterActor, CounterRef, EchoActor, EchoRef, WindowActor, WindowRef};
use cotask::{Affinity, CotaskError, Priority, Scheduler, SchedulerConfig, TaskContext, TaskOptions};
use futures::channel::oneshot;

#[derive(Debug)]
struct DemoSummary {
  total: i64,
  title: String,
  size: (u32, u32),
  driver_thread: String,
  echo_thread: String,
}

pub fn run_demo(args: DemoArgs) -> Result<()> {
  let mut config = SchedulerConfig::default();
  if let Some(workers) = args.workers {
    config = config.with_workers(workers);
  }
  let sched = Scheduler::new(config).context("failed to start scheduler")?;

  let window = WindowRef::new(sched.spawn_actor(
    TaskOptions::new()
      .name("window")
      .affinity(Affinity::MainThread)
      .priority(Priority::High),
    WindowActor::new("cotask demo", 800, 600),
  )?);
  let counter = CounterRef::new(sched.spawn_actor(TaskOptions::new().name("counter"), CounterActor::new())?);
  let echo = EchoRef::new(sched.spawn_actor(TaskOptions::new().name("echo"), EchoActor::new())?);

  let (tx, rx) = oneshot::channel();
  let calls = args.calls;
  {
    let (window, counter, echo) = (window.clone(), counter.clone(), echo.clone());
    sched.spawn(TaskOptions::new().name("driver"), move |cx| async move {
      let summary = drive(&cx, &window, &counter, &echo, calls).await;
      let _ = tx.send(summary);
    })?;
  }

  // The window only makes progress while the main thread is inside block_on.
  let summary = timed("demo", || sched.block_on(rx)).context("driver task ended without a result")??;
  println!("counter reached {} after {} calls", summary.total, calls);
  println!("window title: {:?}, size {:?}", summary.title, summary.size);
  println!(
    "driver ran on {}, echo ran on {}",
    summary.driver_thread, summary.echo_thread
  );

  for handle in [window.handle(), counter.handle(), echo.handle()] {
    sched.block_on(handle.request_stop()?)?;
  }
  sched.block_on(sched.wait_all());
  sched.shutdown();
  Ok(())
}

async fn drive(
  cx: &TaskContext,
  window: &WindowRef,
  counter: &CounterRef,
  echo: &EchoRef,
  calls: usize,
) -> Result<DemoSummary, CotaskError> {
  let tokens = (0..calls)
    .map(|_| counter.add(cx, 1))
    .collect::<Result<Vec<_>, _>>()?;
  let mut total = 0;
  for token in tokens {
    total = total.max(token.await?);
  }

  window.set_title(cx, format!("cotask demo: {} calls", total))?.await?;
  let title = window.title(cx)?.await?;
  let size = window.size(cx)?.await?;
  let echo_thread = echo.thread(cx)?.await?;

  Ok(DemoSummary {
    total,
    title,
    size,
    driver_thread: format!("{:?}", std::thread::current().id()),
    echo_thread: format!("{:?}", echo_thread),
  })
}
