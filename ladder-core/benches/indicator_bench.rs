//! Criterion benchmarks for the signal hot path.
//!
//! Benchmarks:
//! 1. Indicator library (single indicators and the full strategy stack)
//! 2. Strategy evaluation on a polling-sized window
//! 3. Rolling volatility and quantile bands

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::TimeZone;
use ladder_core::domain::Bar;
use ladder_core::indicators::{
    rolling_quantiles, rolling_std_returns, Atr, Bollinger, Ema, Indicator, Rsi, Sma,
};
use ladder_core::strategy::{
    EmaAtrSettings, EmaAtrTrend, EmaAtrTrendMtf, HtfBias, SeriesColumns, Strategy,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 30_000.0 + (i as f64 * 0.1).sin() * 500.0 + (i as f64 * 1.7).sin() * 80.0;
            Bar::new(
                base + chrono::Duration::minutes(5 * i as i64),
                close - 10.0,
                close + 40.0,
                close - 40.0,
                close,
                15.0,
            )
        })
        .collect()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");

    for &bar_count in &[300, 1_500, 10_000] {
        let bars = make_bars(bar_count);

        let ema: Box<dyn Indicator> = Box::new(Ema::new(21));
        group.bench_with_input(BenchmarkId::new("ema_21", bar_count), &bar_count, |b, _| {
            b.iter(|| ema.compute(black_box(&bars)));
        });

        let stack: Vec<Box<dyn Indicator>> = vec![
            Box::new(Ema::new(9)),
            Box::new(Ema::new(21)),
            Box::new(Atr::new(14)),
            Box::new(Rsi::new(14)),
            Box::new(Sma::new(50)),
            Box::new(Bollinger::upper(20, 2.0)),
        ];
        group.bench_with_input(BenchmarkId::new("stack_6", bar_count), &bar_count, |b, _| {
            b.iter(|| {
                for ind in &stack {
                    black_box(ind.compute(black_box(&bars)));
                }
            });
        });
    }

    group.finish();
}

// ── 2. Strategy evaluation ───────────────────────────────────────────

fn bench_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy");
    let bars = make_bars(300);
    let cols = SeriesColumns::from_bars(&bars);
    let htf: Vec<f64> = cols.closes.chunks_exact(4).map(|c| c[3]).collect();

    group.bench_function("ema_atr_trend_300", |b| {
        let mut strat = EmaAtrTrend::new(EmaAtrSettings::default());
        b.iter(|| strat.generate_signal(black_box(&cols.view())));
    });

    group.bench_function("ema_atr_trend_mtf_300", |b| {
        let mut strat = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 50, HtfBias::Follow);
        b.iter(|| strat.generate_signal(black_box(&cols.view().with_htf(&htf))));
    });

    group.finish();
}

// ── 3. Rolling statistics ────────────────────────────────────────────

fn bench_rolling(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling");
    let closes = SeriesColumns::from_bars(&make_bars(2_000)).closes;

    group.bench_function("std_returns_20", |b| {
        b.iter(|| rolling_std_returns(black_box(&closes), 20));
    });
    group.bench_function("quantiles_50", |b| {
        b.iter(|| rolling_quantiles(black_box(&closes), 50, 0.1, 0.9));
    });

    group.finish();
}

criterion_group!(benches, bench_indicators, bench_strategy, bench_rolling);
criterion_main!(benches);
