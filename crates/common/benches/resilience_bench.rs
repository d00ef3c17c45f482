//! Resilience benchmarks
//!
//! Benchmarks for the circuit breaker hot paths, state-machine transitions,
//! and backoff calculations.
//!
//! Run with: `cargo bench --bench resilience_bench -p storeguard-common
//! --features runtime`

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use storeguard_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, ExponentialBackoff, FallbackCause, MockClock,
};
use tokio::runtime::Builder as RuntimeBuilder;

fn build_runtime() -> tokio::runtime::Runtime {
    RuntimeBuilder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime should build for benchmarks")
}

// ============================================================================
// Circuit Breaker Benchmarks
// ============================================================================

fn bench_circuit_breaker_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker_paths");
    let runtime = build_runtime();

    group.bench_function("fire_success", |b| {
        let breaker = CircuitBreaker::new("bench", CircuitBreakerConfig::default())
            .expect("default config is valid");
        b.to_async(&runtime).iter(|| async {
            let result = breaker.fire(|| async { Ok::<_, std::io::Error>(()) }).await;
            if let Err(err) = result {
                panic!("circuit breaker success path failed: {err}");
            }
        });
    });

    group.bench_function("fire_open_fallback", |b| {
        let config = CircuitBreakerConfig::builder()
            .volume_threshold(1)
            .reset_timeout(Duration::from_secs(3600))
            .build()
            .expect("valid circuit breaker config for benchmarks");
        let breaker = CircuitBreaker::with_clock("bench", config, MockClock::new())
            .expect("circuit breaker should build with mock clock");
        runtime.block_on(async {
            let _ = breaker.fire(|| async { Err::<(), _>(std::io::Error::other("trip")) }).await;
        });

        b.to_async(&runtime).iter(|| async {
            let value = breaker
                .fire_with_fallback(
                    || async { Ok::<_, std::io::Error>(1u32) },
                    &|_: &FallbackCause| 0u32,
                )
                .await;
            black_box(value);
        });
    });

    group.finish();
}

fn bench_circuit_breaker_state_machine(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker_state_machine");
    let runtime = build_runtime();

    group.bench_function("open_half_open_close_cycle", |b| {
        b.to_async(&runtime).iter(|| async {
            let clock = MockClock::new();
            let config = CircuitBreakerConfig::builder()
                .volume_threshold(3)
                .reset_timeout(Duration::from_millis(10))
                .build()
                .expect("valid circuit breaker config for benchmarks");
            let breaker = CircuitBreaker::with_clock("bench", config, clock.clone())
                .expect("circuit breaker should build with mock clock");

            for _ in 0..3 {
                let _ = breaker
                    .fire(|| async { Err::<(), _>(std::io::Error::other("state transition")) })
                    .await;
            }
            black_box(breaker.state());

            clock.advance(Duration::from_millis(10));
            let _ = breaker.fire(|| async { Ok::<_, std::io::Error>(()) }).await;

            black_box(breaker.state());
        });
    });

    group.finish();
}

// ============================================================================
// Backoff Benchmarks
// ============================================================================

fn bench_backoff_calculations(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff_calculations");
    let backoff = ExponentialBackoff::default();

    for attempt in [0u32, 4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("raw_delay", attempt), &attempt, |b, &attempt| {
            b.iter(|| black_box(backoff.raw_delay(black_box(attempt))));
        });
    }

    group.bench_function("jittered_delay_seeded", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| {
            for attempt in 0..8 {
                black_box(backoff.delay_with_rng(attempt, &mut rng));
            }
        });
    });

    group.finish();
}

criterion_group!(
    resilience,
    bench_circuit_breaker_paths,
    bench_circuit_breaker_state_machine,
    bench_backoff_calculations
);
criterion_main!(resilience);
