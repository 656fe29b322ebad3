//! Benchmarks for the scheduler crate.

use criterion::{Criterion, criterion_group, criterion_main};
use rmsched::{AdmissionController, ReadyQueue, TaskId};
use std::hint::black_box;
use std::time::Duration;

fn bench_admission_test(c: &mut Criterion) {
    let controller = AdmissionController::default();
    let existing: Vec<(Duration, Duration)> = (1..=64u64)
        .map(|i| (Duration::from_micros(10), Duration::from_millis(i)))
        .collect();

    c.bench_function("admission_64_tasks", |b| {
        b.iter(|| {
            black_box(controller.can_admit(
                existing.iter().copied(),
                black_box(Duration::from_millis(1)),
                black_box(Duration::from_millis(100)),
            ))
        });
    });
}

fn bench_ready_queue_churn(c: &mut Criterion) {
    let mut queue = ReadyQueue::new();
    for i in 0..64u32 {
        queue.insert(TaskId::new(i), Duration::from_millis(u64::from(i % 8 + 1)));
    }

    c.bench_function("ready_queue_pop_insert", |b| {
        b.iter(|| {
            if let Some((id, period)) = queue.peek_head() {
                queue.remove(id);
                queue.insert(black_box(id), period + Duration::from_millis(8));
            }
        });
    });
}

fn bench_ready_queue_peek(c: &mut Criterion) {
    let mut queue = ReadyQueue::new();
    for i in 0..1024u32 {
        queue.insert(TaskId::new(i), Duration::from_micros(u64::from(i)));
    }

    c.bench_function("ready_queue_peek", |b| {
        b.iter(|| black_box(queue.peek_head()));
    });
}

criterion_group!(
    benches,
    bench_admission_test,
    bench_ready_queue_churn,
    bench_ready_queue_peek
);
criterion_main!(benches);
