//! Packet buffer throughput and latency benchmark.
//!
//! Usage:
//!     cargo run --release --bin packet_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0      Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2      Pin consumer to CPU 2 (default: 2, or the last CPU)
//!     BUFFER_SIZE=65536   Buffer capacity in bytes
//!     ITERATIONS=1000000  Packets per run

use std::env;
use std::hint;
use std::sync::Arc;
use std::sync::mpsc;

use minstant::Instant;

use tether::packet::{PacketBuffer, PacketError, PostcardCodec};
use tether::thread::{ManagedThread, TaskContext, ThreadConfig, init_main_thread};

const DEFAULT_BUFFER_SIZE: usize = 1 << 16;
const DEFAULT_ITERATIONS: u64 = 1 << 20;

type Payload = u64;
type Buffer = PacketBuffer<PostcardCodec<Payload>>;

struct BenchConfig {
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
    buffer_size: usize,
    iterations: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn bench_config() -> BenchConfig {
    let last_cpu = num_cpus::get().saturating_sub(1);
    BenchConfig {
        producer_cpu: env_parse("PRODUCER_CPU").or(Some(0)),
        consumer_cpu: env_parse("CONSUMER_CPU").or(Some(2.min(last_cpu))),
        buffer_size: env_parse("BUFFER_SIZE").unwrap_or(DEFAULT_BUFFER_SIZE),
        iterations: env_parse("ITERATIONS").unwrap_or(DEFAULT_ITERATIONS),
    }
}

fn pinned(name: &str, cpu: Option<usize>) -> ThreadConfig {
    ThreadConfig {
        cpu,
        ..ThreadConfig::named(name)
    }
}

fn new_buffer(size: usize) -> Arc<Buffer> {
    Arc::new(PacketBuffer::new(size, PostcardCodec::new()).expect("buffer size must be non-zero"))
}

fn push_spin(buffer: &Buffer, value: Payload) {
    loop {
        match buffer.push(&value) {
            Ok(()) => return,
            Err(PacketError::Full { .. }) => hint::spin_loop(),
            Err(e) => panic!("push failed: {e}"),
        }
    }
}

fn pop_spin(buffer: &Buffer, ctx: &TaskContext) -> Option<Payload> {
    loop {
        match buffer.pop() {
            Ok(value) => return Some(value),
            Err(PacketError::Empty) if ctx.test_destroy() => return None,
            Err(PacketError::Empty) => hint::spin_loop(),
            Err(e) => panic!("pop failed: {e}"),
        }
    }
}

fn bench_throughput(config: &BenchConfig) {
    let buffer = new_buffer(config.buffer_size);
    let iterations = config.iterations;
    let (done_tx, done_rx) = mpsc::channel();

    let consumer_buffer = Arc::clone(&buffer);
    let consumer = ManagedThread::with_config(
        pinned("bench-consumer", config.consumer_cpu),
        move |ctx: &TaskContext| {
            for expected in 0..iterations {
                match pop_spin(&consumer_buffer, ctx) {
                    Some(value) if value == expected => {}
                    Some(value) => panic!("Data corruption: expected {expected}, got {value}"),
                    None => return,
                }
            }
            let _ = done_tx.send(Instant::now());
        },
    );

    let producer_buffer = Arc::clone(&buffer);
    let producer = ManagedThread::with_config(
        pinned("bench-producer", config.producer_cpu),
        move |_: &TaskContext| {
            for i in 0..iterations {
                push_spin(&producer_buffer, i);
            }
        },
    );

    consumer.start().expect("failed to start consumer");
    let start = Instant::now();
    producer.start().expect("failed to start producer");

    let end = done_rx.recv().expect("consumer exited early");
    producer.stop(true, false);
    consumer.stop(true, true);

    let elapsed = end.duration_since(start);
    let ops_per_ms = u128::from(iterations) * 1_000_000 / elapsed.as_nanos().max(1);
    println!("{ops_per_ms} ops/ms");
}

fn bench_rtt(config: &BenchConfig) {
    let ping = new_buffer(config.buffer_size);
    let pong = new_buffer(config.buffer_size);
    let iterations = config.iterations;

    let responder_ping = Arc::clone(&ping);
    let responder_pong = Arc::clone(&pong);
    let responder = ManagedThread::with_config(
        pinned("bench-responder", config.consumer_cpu),
        move |ctx: &TaskContext| {
            while let Some(value) = pop_spin(&responder_ping, ctx) {
                push_spin(&responder_pong, value);
            }
        },
    );
    responder.start().expect("failed to start responder");

    let (done_tx, done_rx) = mpsc::channel();
    let initiator = ManagedThread::with_config(
        pinned("bench-initiator", config.producer_cpu),
        move |ctx: &TaskContext| {
            let start = Instant::now();
            for i in 0..iterations {
                push_spin(&ping, i);
                if pop_spin(&pong, ctx).is_none() {
                    return;
                }
            }
            let _ = done_tx.send(start.elapsed());
        },
    );
    initiator.start().expect("failed to start initiator");

    let elapsed = done_rx.recv().expect("initiator exited early");
    initiator.stop(true, true);
    responder.stop(true, true);

    let rtt_ns = elapsed.as_nanos() / u128::from(iterations.max(1));
    println!("{rtt_ns} ns RTT");
}

fn main() {
    tether::init_tracing();
    init_main_thread();

    let config = bench_config();

    println!(
        "tether packet buffer (size={}, iters={}, cpus={:?}/{:?}):",
        config.buffer_size, config.iterations, config.producer_cpu, config.consumer_cpu
    );
    bench_throughput(&config);
    bench_rtt(&config);
}
