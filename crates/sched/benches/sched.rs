//! Criterion benchmarks for the hot paths.
//!
//! Run: cargo bench -p sched --bench sched
//!
//! Results show:
//!   ring_buffer/*     : add_slice + get_slice round trip per chunk size
//!   event_queue/*     : sorted insert and check cost vs queue depth
//!   select_post_wait  : hook forwarding plus one ready-list hand-over

#![allow(
    clippy::unwrap_used, // benchmark helpers use unwrap for brevity
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    missing_docs, // criterion_group! macro generates undocumented items
)]

use core::hint::black_box;
use core::pin::{pin, Pin};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use platform::host::HostSignal;
use platform::mocks::ManualClock;
use platform::Signal;
use sched::{Event, EventQueue, RingBuffer, Select};

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    for chunk in [1usize, 16, 64, 255] {
        let data: Vec<u8> = (0..chunk).map(|i| i as u8).collect();
        let mut out = vec![0u8; chunk];
        let mut ring: RingBuffer<'_, u8, 256> = RingBuffer::new();

        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::new("round_trip", chunk), &chunk, |b, _| {
            b.iter(|| {
                let stored = ring.add_slice(black_box(&data));
                let read = ring.get_slice(&mut out);
                black_box((stored, read));
            });
        });
    }
    group.finish();
}

fn bench_event_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_queue");

    for depth in [1u32, 16, 128] {
        group.bench_with_input(BenchmarkId::new("fill_and_fire", depth), &depth, |b, &n| {
            let signal = HostSignal::new();
            b.iter(|| {
                let clock = ManualClock::new(0);
                let queue = EventQueue::new(&clock);
                // Reverse deadlines so every add walks to the front.
                let events: Vec<Pin<Box<Event<'_, '_>>>> = (0..n)
                    .map(|i| Box::pin(Event::new(&queue, &signal, n - i)))
                    .collect();
                for e in &events {
                    queue.add(e.as_ref());
                }
                clock.advance(n);
                black_box(queue.check());
                while signal.try_take() {}
            });
        });
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let a = HostSignal::new();
    let b_sig = HostSignal::new();
    let select = pin!(Select::<2, HostSignal>::new());
    let select = select.as_ref();
    select.add(&a);
    select.add(&b_sig);

    c.bench_function("select_post_wait", |b| {
        b.iter(|| {
            b_sig.post();
            black_box(select.wait());
        });
    });
}

criterion_group!(benches, bench_ring_buffer, bench_event_queue, bench_select);
criterion_main!(benches);
