//! Host timer demo
//!
//! Drives an EventQueue from a background thread with the host clock, while
//! the main thread multiplexes a periodic tick and a simulated UART with a
//! Select. Each tick defers a heartbeat to a Dispatch worker.
//!
//! Run with:
//!   RUST_LOG=debug cargo run -p sched --example host_timer --features std,tracing

#![allow(
    clippy::unwrap_used, // demo code
    clippy::arithmetic_side_effects,
    missing_docs,
)]

use core::pin::pin;
use core::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use platform::host::{HostClock, HostSignal};
use platform::{Rescheduler, Signal};
use sched::{Callback, Dispatch, Event, EventQueue, RingBuffer, RunConfig, Select, Work};
use tracing_subscriber::EnvFilter;

const TICK_PERIOD: u32 = 25;
const IDLE_TIMEOUT: u32 = 500;

struct Heartbeat {
    beats: AtomicU32,
}

impl Callback for Heartbeat {
    fn execute(&self) {
        let n = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(n, "heartbeat");
    }

    fn label(&self) -> Option<&'static str> {
        Some("heartbeat")
    }
}

fn same(a: &dyn Signal, b: &dyn Signal) -> bool {
    ptr::addr_eq(ptr::from_ref(a), ptr::from_ref(b))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_ids(true)
        .init();

    let rx_ready = HostSignal::new();
    let tick = HostSignal::new();

    let clock = HostClock::new();
    let queue = EventQueue::with_rescheduler(&clock, &clock);
    let stop = AtomicBool::new(false);

    let mut uart: RingBuffer<'_, u8, 32> = RingBuffer::new();
    uart.associate(&rx_ready).unwrap();
    let (mut tx, mut rx) = uart.split();

    let heartbeat = Heartbeat {
        beats: AtomicU32::new(0),
    };
    let beat = Work::new(&heartbeat);
    let dispatch: Dispatch<'_, HostSignal> = Dispatch::new();

    let select = pin!(Select::<2, HostSignal>::new());
    let select = select.as_ref();
    select.add(&rx_ready);
    select.add(&tick);

    thread::scope(|s| {
        s.spawn(|| queue.run_until(&stop, &RunConfig::default()));
        s.spawn(|| dispatch.run());
        s.spawn(move || {
            for line in ["hello\n", "from the\n", "simulated uart\n"] {
                thread::sleep(Duration::from_millis(60));
                let stored = tx.add_slice(line.as_bytes());
                tracing::debug!(stored, "uart rx");
            }
        });

        let mut line = Vec::new();
        let mut lines = 0;
        while lines < 3 {
            let period = pin!(Event::after(&queue, &tick, TICK_PERIOD));
            period.as_ref().schedule();

            match select.wait_timeout(&queue, IDLE_TIMEOUT) {
                Some(fired) if same(fired, &tick) => {
                    dispatch.put(&beat);
                }
                Some(_) => {
                    while let Some(byte) = rx.get() {
                        if byte == b'\n' {
                            tracing::info!(line = %String::from_utf8_lossy(&line), "uart line");
                            line.clear();
                            lines += 1;
                        } else {
                            line.push(byte);
                        }
                    }
                }
                None => {
                    tracing::warn!("uart idle, giving up");
                    break;
                }
            }
        }

        dispatch.kill();
        stop.store(true, Ordering::Release);
        clock.reschedule(0);
    });

    tracing::info!(
        beats = heartbeat.beats.load(Ordering::Relaxed),
        pending = queue.len(),
        "done"
    );
}
