//! Crossing and Fan-out Benchmarks - Per-Sample Hot Path
//!
//! Benchmarks the work done for every sample: ticker parsing,
//! crossing evaluation and fan-out to subscribers.
//!
//! Run with: cargo bench --bench crossing_bench

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crypto_alerts::adapters::feeds::binance::parse_ticker;
use crypto_alerts::domain::alert::{AlertRule, Direction};
use crypto_alerts::domain::crossing::{alert_fires, crosses};
use crypto_alerts::domain::price::PriceSample;
use crypto_alerts::ports::price_feed::{FeedError, PollingFeed, StreamingFeed};
use crypto_alerts::usecases::{StreamSettings, SymbolStream};

struct Idle;

#[async_trait]
impl StreamingFeed for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    async fn stream(
        &self,
        _symbol: &str,
        _out: &mpsc::Sender<PriceSample>,
        cancel: &CancellationToken,
    ) -> Result<(), FeedError> {
        cancel.cancelled().await;
        Ok(())
    }
}

#[async_trait]
impl PollingFeed for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    async fn fetch_price(&self, _symbol: &str) -> Result<f64, FeedError> {
        Err(FeedError::Parse)
    }
}

/// Benchmark parsing one Binance ticker frame.
fn bench_parse_ticker(c: &mut Criterion) {
    let frame = r#"{"e":"24hrTicker","E":1700000000000,"s":"BTCUSDT","c":"67012.34000000"}"#;

    c.bench_function("parse_ticker", |b| {
        b.iter(|| parse_ticker(black_box(frame)));
    });
}

/// Benchmark evaluating 100 alerts against one sample.
fn bench_crossing(c: &mut Criterion) {
    let alerts: Vec<AlertRule> = (0..100)
        .map(|i| {
            let direction = if i % 2 == 0 { Direction::Up } else { Direction::Down };
            AlertRule::new("BTCUSDT", 60_000.0 + f64::from(i) * 10.0, direction).unwrap()
        })
        .collect();

    c.bench_function("crosses_single", |b| {
        b.iter(|| crosses(black_box(99.0), black_box(101.0), black_box(100.0), Direction::Up));
    });

    c.bench_function("alert_fires_100", |b| {
        b.iter(|| {
            alerts
                .iter()
                .filter(|a| alert_fires(black_box(60_400.0), black_box(60_600.0), a))
                .count()
        });
    });
}

/// Benchmark fan-out of one sample to 64 subscribers.
fn bench_fan_out(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _guard = runtime.enter();

    let stream = SymbolStream::spawn(
        "BTCUSDT",
        Arc::new(Idle),
        Arc::new(Idle),
        StreamSettings::default(),
        CancellationToken::new(),
        None,
    );
    let mut subscriptions: Vec<_> = (0..64).map(|_| stream.subscribe(16)).collect();
    let sample = PriceSample::new("BTCUSDT", 67_000.0).unwrap();

    c.bench_function("fan_out_64", |b| {
        b.iter(|| {
            stream.fan_out(black_box(&sample));
            for sub in &mut subscriptions {
                while sub.try_recv().is_ok() {}
            }
        });
    });

    stream.stop();
}

criterion_group!(benches, bench_parse_ticker, bench_crossing, bench_fan_out);
criterion_main!(benches);
