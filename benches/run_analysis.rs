//! Run analysis benchmark
//!
//! Measures one full pass of the pipeline: per-test annotation against a
//! populated history, failure clustering, suite aggregation, comparison with
//! the previous run and the history append with retention.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench run_analysis
//! ```

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vigia::annotate::RunAnalyzer;
use vigia::cluster::FailureClusterer;
use vigia::config::Config;
use vigia::digest::{generate, DigestPeriod};
use vigia::history::HistoryStore;
use vigia::model::{format_timestamp, RunSummary, TestResult, TestStatus};

const ERRORS: &[&str] = &[
    "TimeoutError: locator.click: Timeout 30000ms exceeded",
    "expect(received).toBe(expected)",
    "TypeError: Cannot read properties of undefined (reading 'id')",
    "page.goto: net::ERR_CONNECTION_REFUSED at http://localhost:3000",
    "RangeError: Maximum call stack size exceeded",
];

/// Deterministic run of `tests` results; roughly one in seven fails
fn bench_results(tests: usize, run: u64) -> Vec<TestResult> {
    (0..tests)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(31).wrapping_add(run * 17);
            let duration = 200 + (seed % 1_800);
            if seed % 7 == 0 {
                TestResult::new(format!("suite::case_{i}"), TestStatus::Failed, duration)
                    .with_retry((seed % 3) as u32)
                    .with_error(ERRORS[(seed % ERRORS.len() as u64) as usize])
            } else {
                TestResult::new(format!("suite::case_{i}"), TestStatus::Passed, duration)
            }
        })
        .collect()
}

fn populated_store(tests: usize, runs: u64) -> HistoryStore {
    let analyzer = RunAnalyzer::default();
    let mut store = HistoryStore::in_memory(10);
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for run in 0..runs {
        let ts = format_timestamp(base + Duration::hours(run as i64));
        analyzer.analyze_run(&bench_results(tests, run), &mut store, &format!("run-{run}"), &ts);
    }
    store
}

fn bench_analyze_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_run");
    let analyzer = RunAnalyzer::new(&Config::default());

    for tests in [100usize, 1_000] {
        let store = populated_store(tests, 10);
        let results = bench_results(tests, 11);

        group.bench_with_input(BenchmarkId::from_parameter(tests), &tests, |b, _| {
            b.iter(|| {
                let mut store = store.clone();
                black_box(analyzer.analyze_run(
                    black_box(&results),
                    &mut store,
                    "bench",
                    "2024-01-02T00:00:00.000Z",
                ))
            })
        });
    }
    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let results = bench_results(5_000, 3);
    let clusterer = FailureClusterer::new();
    c.bench_function("cluster_5000_results", |b| {
        b.iter(|| black_box(clusterer.cluster(black_box(&results))))
    });
}

fn bench_digest(c: &mut Criterion) {
    let store = populated_store(1_000, 10);
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    c.bench_function("digest_1000_tests", |b| {
        b.iter(|| black_box(generate(store.history(), DigestPeriod::Daily, now)))
    });
}

fn bench_summary_serialization(c: &mut Criterion) {
    let summary = RunSummary {
        run_id: "run-1".to_string(),
        timestamp: "2024-01-01T00:00:00.000Z".to_string(),
        total: 1_000,
        passed: 950,
        failed: 40,
        skipped: 10,
        flaky: 12,
        slow: 5,
        duration: 3_600_000,
        pass_rate: 96,
    };
    let store = populated_store(1_000, 10);
    c.bench_function("history_to_json_1000_tests", |b| {
        b.iter(|| black_box(serde_json::to_string(store.history()).unwrap()))
    });
    c.bench_function("summary_to_json", |b| {
        b.iter(|| black_box(serde_json::to_string(&summary).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_analyze_run,
    bench_clustering,
    bench_digest,
    bench_summary_serialization
);
criterion_main!(benches);
