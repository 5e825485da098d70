// benches/queue_throughput.rs

use cotask::actors::{CounterActor, CounterRef};
use cotask::harness::{self, HarnessConfig};
use cotask::{BlockingQueue, External, LockfreeQueue, Queue, Scheduler, SchedulerConfig, TaskOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

// --- Benchmarking Constants ---
const NUM_VALUES: usize = 100_000;
const SHAPES: &[(usize, usize)] = &[(1, 1), (4, 4), (16, 16)];
const CALLS_PER_ITER: usize = 1_000;

fn run_once<Q: Queue<usize> + Default>(config: &HarnessConfig) {
  let queue = Q::default();
  let result = Q::default();
  harness::run(&queue, &result, config).expect("valid harness config");
  black_box(harness::verify_or_abort(&result, config.values));
}

fn queue_throughput(c: &mut Criterion) {
  let mut group = c.benchmark_group("harness");
  group.throughput(Throughput::Elements(NUM_VALUES as u64));
  group.sample_size(10);
  group.measurement_time(Duration::from_secs(10));

  for &(producers, consumers) in SHAPES {
    let config = HarnessConfig::new(producers, consumers, NUM_VALUES);
    let label = format!("{}p{}c", producers, consumers);
    group.bench_with_input(BenchmarkId::new("lockfree", &label), &config, |b, config| {
      b.iter(|| run_once::<LockfreeQueue<usize>>(config))
    });
    group.bench_with_input(BenchmarkId::new("blocking", &label), &config, |b, config| {
      b.iter(|| run_once::<BlockingQueue<usize>>(config))
    });
  }
  group.finish();
}

fn call_round_trip(c: &mut Criterion) {
  let sched = Scheduler::new(SchedulerConfig::default().with_workers(2)).expect("scheduler");
  let counter = CounterRef::new(
    sched
      .spawn_actor(TaskOptions::new(), CounterActor::new())
      .expect("spawn counter"),
  );

  let mut group = c.benchmark_group("call");
  group.throughput(Throughput::Elements(CALLS_PER_ITER as u64));
  group.bench_function("counter_add_pipelined", |b| {
    b.iter(|| {
      let tokens: Vec<_> = (0..CALLS_PER_ITER)
        .map(|_| counter.add(&External, 1).expect("counter alive"))
        .collect();
      sched.block_on(async {
        for token in tokens {
          black_box(token.await.expect("reply"));
        }
      })
    })
  });
  group.finish();
}

criterion_group!(benches, queue_throughput, call_round_trip);
criterion_main!(benches);
