//! Benchmark: capture buffer and assertion scan under contention
//!
//! Compares a plain Mutex<Vec> against LogMessageBuffer for concurrent
//! writers, and measures `received` scans per match mode.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::{Arc, Mutex};

use logwitness::{Expectation, LogLevel, LogMessage, LogMessageBuffer, LogValidationContext, MatchMode};

// ===========================================================================
// Writers: Mutex<Vec> vs LogMessageBuffer
// ===========================================================================

fn bench_concurrent_writers(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_writers");
    group.sample_size(20);

    for &threads in &[1, 4, 8, 16] {
        let messages_per_thread = 10_000usize;

        // Baseline: one lock around a Vec
        group.bench_with_input(
            BenchmarkId::new("Mutex_Vec", threads),
            &threads,
            |b, &threads| {
                let buffer = Arc::new(Mutex::new(Vec::new()));
                b.iter(|| {
                    buffer.lock().unwrap().clear();
                    let handles: Vec<_> = (0..threads)
                        .map(|t| {
                            let buffer = Arc::clone(&buffer);
                            std::thread::spawn(move || {
                                for i in 0..messages_per_thread {
                                    let msg = LogMessage::new(LogLevel::Information, format!("{t}:{i}"));
                                    buffer.lock().unwrap().push(msg);
                                }
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                    assert_eq!(buffer.lock().unwrap().len(), threads * messages_per_thread);
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("LogMessageBuffer", threads),
            &threads,
            |b, &threads| {
                let buffer = Arc::new(LogMessageBuffer::new());
                b.iter(|| {
                    buffer.clear();
                    let handles: Vec<_> = (0..threads)
                        .map(|t| {
                            let buffer = Arc::clone(&buffer);
                            std::thread::spawn(move || {
                                for i in 0..messages_per_thread {
                                    buffer.add(LogMessage::new(LogLevel::Information, format!("{t}:{i}")));
                                }
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                    assert_eq!(buffer.len(), threads * messages_per_thread);
                });
            },
        );
    }

    group.finish();
}

// ===========================================================================
// Assertion scan: worst case (no match) over a full buffer
// ===========================================================================

fn bench_received_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("received_scan");

    let ctx = LogValidationContext::new();
    for i in 0..5_000 {
        ctx.log("bench", LogLevel::Information, None, &i, None, |i, _| {
            format!("request {i} completed in {}ms", i % 97)
        });
    }

    let cases = [
        (MatchMode::Exact, "request 1 completed"),
        (MatchMode::Contains, "never logged"),
        (MatchMode::Start, "response"),
        (MatchMode::End, "in 98ms"),
        (MatchMode::Regex, r"^request \d+ failed"),
    ];
    for (mode, text) in cases {
        group.bench_function(BenchmarkId::new("miss", mode), |b| {
            b.iter(|| {
                let result = ctx.try_received(Expectation::new(black_box(text)).mode(mode));
                assert!(result.is_err());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_concurrent_writers, bench_received_scan);
criterion_main!(benches);
