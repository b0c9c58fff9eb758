//! Managed thread lifecycle scenarios.
//!
//! Run with tracing to watch the transitions:
//! ```bash
//! RUST_LOG=tether=debug cargo test --features tracing --test lifecycle -- --nocapture
//! ```

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use minstant::Instant;

use tether::packet::{PacketBuffer, PacketError, PostcardCodec};
use tether::thread::{ManagedThread, TaskContext, ThreadConfig, ThreadError, ThreadState};

static INIT_TRACING: Once = Once::new();

fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        tether::init_tracing();
    });
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn counter_stops_after_stop() {
    init_test_tracing();

    let counter = Arc::new(AtomicU64::new(0));
    let task_counter = Arc::clone(&counter);
    let worker = ManagedThread::new("counter", move |ctx: &TaskContext| {
        while !ctx.test_destroy() {
            task_counter.fetch_add(1, Ordering::Relaxed);
            thread::yield_now();
        }
    });

    worker.start().expect("start");
    assert!(worker.is_alive());
    assert!(wait_until(Duration::from_secs(5), || {
        counter.load(Ordering::Relaxed) >= 100
    }));

    worker.stop(true, true);
    assert!(!worker.is_alive());
    assert_eq!(worker.state(), ThreadState::Stopped);

    let frozen = counter.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(counter.load(Ordering::Relaxed), frozen);
}

#[test]
fn double_stop_is_harmless() {
    init_test_tracing();

    let worker = ManagedThread::new("double-stop", |ctx: &TaskContext| {
        while !ctx.test_destroy() {
            ctx.wait_for_any_signal();
        }
    });

    worker.start().expect("start");
    worker.stop(true, true);
    assert!(!worker.is_alive());

    worker.stop(true, true);
    assert!(!worker.is_alive());
    assert!(worker.test_destroy());
    assert!(!worker.join());
    assert!(matches!(worker.start(), Err(ThreadError::AlreadyStopped)));
}

#[test]
fn shared_thread_is_notified_by_producer() {
    init_test_tracing();

    let buffer = Arc::new(PacketBuffer::new(4096, PostcardCodec::<u64>::new()).expect("buffer"));
    let received = Arc::new(AtomicU64::new(0));

    // A long signal timeout: the consumer only makes progress when notified
    // (or when it gives up waiting after 10s, which would fail the deadline).
    let config = ThreadConfig {
        signal_timeout: Duration::from_secs(10),
        ..ThreadConfig::named("consumer")
    };
    let consumer_buffer = Arc::clone(&buffer);
    let consumer_received = Arc::clone(&received);
    let consumer = Arc::new(ManagedThread::with_config(config, move |ctx: &TaskContext| {
        let mut expected = 0u64;
        while !ctx.test_destroy() {
            loop {
                match consumer_buffer.pop() {
                    Ok(value) => {
                        assert_eq!(value, expected);
                        expected += 1;
                        consumer_received.store(expected, Ordering::Release);
                    }
                    Err(PacketError::Empty) => break,
                    Err(e) => panic!("unexpected pop error: {e}"),
                }
            }
            ctx.wait_for_any_signal();
        }
    }));

    let producer_buffer = Arc::clone(&buffer);
    let wake = Arc::clone(&consumer);
    let producer = ManagedThread::new("producer", move |ctx: &TaskContext| {
        let mut seq = 0u64;
        while !ctx.test_destroy() && seq < 200 {
            match producer_buffer.push(&seq) {
                Ok(()) => seq += 1,
                Err(PacketError::Full { .. }) => {}
                Err(e) => panic!("unexpected push error: {e}"),
            }
            wake.notify();
        }
        // Keep nudging until the consumer has caught up.
        while !ctx.test_destroy() {
            wake.notify();
            ctx.wait_for_any_signal();
        }
    });

    consumer.start().expect("start consumer");
    producer.start().expect("start producer");

    let start = Instant::now();
    assert!(wait_until(Duration::from_secs(5), || {
        received.load(Ordering::Acquire) == 200
    }));
    assert!(start.elapsed() < Duration::from_secs(10));

    // The producer keeps nudging, so the consumer sees destroy promptly even
    // if the stop notification lands before it parks.
    consumer.stop(true, true);
    producer.stop(true, true);
    assert!(!producer.is_alive());
    assert!(!consumer.is_alive());
    assert!(!buffer.has_new_packet());
}

#[test]
fn pinned_thread_runs() {
    init_test_tracing();

    let cpu = core_affinity::get_core_ids()
        .and_then(|ids| ids.first().copied())
        .map(|id| id.id);
    let config = ThreadConfig {
        cpu,
        stack_size: Some(256 * 1024),
        ..ThreadConfig::named("pinned")
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let worker = ManagedThread::with_config(config, move |ctx: &TaskContext| {
        tx.send(ctx.name()).expect("send");
        while !ctx.test_destroy() {
            ctx.wait_for_any_signal();
        }
    });

    worker.start().expect("start");
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).expect("task ran"),
        "pinned"
    );
    worker.stop_default();
    assert!(!worker.is_alive());
}
