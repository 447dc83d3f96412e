//! Property-based tests over the analysis core
//!
//! Properties covered:
//! 1. Flakiness score bounds and "new" classification
//! 2. Stability score bounds and grade determinism
//! 3. History retention (length, order, unique run ids)
//! 4. Failure clustering determinism and expected-failure exclusion
//! 5. Comparison of identical runs
//! 6. Digest over an empty window

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use vigia::cluster::{cluster_id, infer_error_type, FailureClusterer};
use vigia::comparison::ComparisonBuilder;
use vigia::config::{GradeThresholds, StabilityConfig};
use vigia::digest::{generate, DigestPeriod};
use vigia::flakiness::{FlakinessAnalyzer, FlakinessIndicator};
use vigia::history::HistoryStore;
use vigia::model::{
    format_timestamp, parse_timestamp, HistoryEntry, RunSummary, TestHistory, TestOutcome,
    TestResult, TestStatus,
};
use vigia::performance::PerformanceAnalyzer;
use vigia::retry::RetryAnalyzer;
use vigia::stability::{Grade, StabilityScorer};

fn status_strategy() -> impl Strategy<Value = TestStatus> {
    prop_oneof![
        Just(TestStatus::Passed),
        Just(TestStatus::Failed),
        Just(TestStatus::Skipped),
        Just(TestStatus::TimedOut),
        Just(TestStatus::Interrupted),
    ]
}

fn outcome_strategy() -> impl Strategy<Value = Option<TestOutcome>> {
    prop_oneof![
        Just(None),
        Just(Some(TestOutcome::Expected)),
        Just(Some(TestOutcome::Unexpected)),
        Just(Some(TestOutcome::Flaky)),
    ]
}

fn entry_strategy() -> impl Strategy<Value = HistoryEntry> {
    (any::<bool>(), 0u64..60_000, any::<bool>(), 0u32..5, 0i64..1_000).prop_map(
        |(passed, duration, skipped, retries, minutes)| HistoryEntry {
            passed,
            duration,
            timestamp: format_timestamp(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            ),
            skipped: skipped.then_some(true),
            retry_count: (retries > 0).then_some(retries),
            run_id: None,
        },
    )
}

fn result_strategy() -> impl Strategy<Value = TestResult> {
    (
        "[a-z]{1,8}",
        status_strategy(),
        0u64..60_000,
        0u32..6,
        outcome_strategy(),
        prop::option::of("[ -~]{0,80}"),
    )
        .prop_map(|(id, status, duration, retry, outcome, error)| TestResult {
            title: id.clone(),
            test_id: id,
            file: String::new(),
            status,
            duration,
            retry,
            error,
            outcome,
            tags: Vec::new(),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_flakiness_score_bounded(history in prop::collection::vec(entry_strategy(), 0..30)) {
        let analyzer = FlakinessAnalyzer::default();
        let result = TestResult::new("t", TestStatus::Passed, 10);
        let annotation = analyzer.analyze(&result, &history);

        let non_skipped = history.iter().filter(|e| !e.is_skipped()).count();
        match annotation.score {
            Some(score) => {
                prop_assert!((0.0..=1.0).contains(&score));
                prop_assert!(non_skipped > 0);
            }
            None => {
                prop_assert_eq!(non_skipped, 0);
                prop_assert_eq!(annotation.indicator, FlakinessIndicator::New);
            }
        }
    }

    #[test]
    fn prop_stability_score_bounded(
        result in result_strategy(),
        history in prop::collection::vec(entry_strategy(), 0..20),
        weights in (0.0f64..2.0, 0.0f64..2.0, 0.0f64..2.0),
    ) {
        let mut config = StabilityConfig::default();
        config.weights.flakiness = weights.0;
        config.weights.performance = weights.1;
        config.weights.reliability = weights.2;
        let grades = config.grades.clone();
        let scorer = StabilityScorer::new(config);

        let flakiness = FlakinessAnalyzer::default().analyze(&result, &history);
        let performance = PerformanceAnalyzer::default().analyze(&result, &history);
        let retry = RetryAnalyzer::default().analyze(&result, &history);
        let score = scorer.score(&result, &flakiness, &performance, &retry);

        prop_assert!(score.overall <= 100);
        prop_assert_eq!(score.grade, Grade::from_score(score.overall, &grades));
        prop_assert!(score.reliability <= 100);
        prop_assert!(score.performance <= 100);
    }

    #[test]
    fn prop_grade_is_monotonic(a in 0u32..=100, b in 0u32..=100) {
        let grades = GradeThresholds::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        // Grade::A orders first, so a higher score never gets a later letter
        prop_assert!(Grade::from_score(high, &grades) <= Grade::from_score(low, &grades));
    }

    #[test]
    fn prop_retention_invariants(
        max_runs in 1usize..8,
        runs in prop::collection::vec(
            (0u8..12, 0i64..500, prop::collection::vec(result_strategy(), 0..5)),
            1..20,
        ),
    ) {
        let mut store = HistoryStore::in_memory(max_runs);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for (run, minutes, results) in &runs {
            let summary = RunSummary {
                run_id: format!("run-{run}"),
                timestamp: format_timestamp(base + Duration::minutes(*minutes)),
                total: results.len() as u32,
                passed: 0,
                failed: 0,
                skipped: 0,
                flaky: 0,
                slow: 0,
                duration: 0,
                pass_rate: 0,
            };
            store.append(summary, results);
        }

        let history = store.history();
        prop_assert!(history.runs.len() <= max_runs);
        prop_assert!(history.summaries.len() <= max_runs);

        let run_ids: HashSet<&str> = history.runs.iter().map(|r| r.run_id.as_str()).collect();
        prop_assert_eq!(run_ids.len(), history.runs.len());
        let summary_ids: HashSet<&str> =
            history.summaries.iter().map(|s| s.run_id.as_str()).collect();
        prop_assert_eq!(summary_ids.len(), history.summaries.len());

        let sorted = |stamps: Vec<&str>| {
            stamps.windows(2).all(|w| parse_timestamp(w[0]) <= parse_timestamp(w[1]))
        };
        prop_assert!(sorted(history.runs.iter().map(|r| r.timestamp.as_str()).collect()));
        prop_assert!(sorted(history.summaries.iter().map(|s| s.timestamp.as_str()).collect()));
        for entries in history.tests.values() {
            prop_assert!(!entries.is_empty());
            prop_assert!(entries.len() <= max_runs);
            for entry in entries {
                let run_id = entry.run_id.as_deref().unwrap_or_default();
                prop_assert!(run_ids.contains(run_id));
            }
            prop_assert!(sorted(entries.iter().map(|e| e.timestamp.as_str()).collect()));
        }
    }

    #[test]
    fn prop_clustering_deterministic_and_excludes_expected(
        results in prop::collection::vec(result_strategy(), 0..30),
    ) {
        let clusterer = FailureClusterer::new();
        let first = clusterer.cluster(&results);
        let second = clusterer.cluster(&results);
        prop_assert_eq!(&first, &second);

        let mut ids = HashSet::new();
        for cluster in &first {
            prop_assert!(ids.insert(cluster.id.clone()));
            prop_assert_eq!(&cluster.id, &cluster_id(&cluster.error_type));
            prop_assert_eq!(cluster.count, cluster.tests.len());
            for test in &cluster.tests {
                prop_assert_ne!(test.outcome, Some(TestOutcome::Expected));
                prop_assert!(matches!(test.status, TestStatus::Failed | TestStatus::TimedOut));
                prop_assert_eq!(
                    infer_error_type(test.error.as_deref(), test.status),
                    cluster.error_type.clone()
                );
            }
        }

        let clustered: usize = first.iter().map(|c| c.count).sum();
        let expected = results.iter().filter(|r| FailureClusterer::is_clusterable(r)).count();
        prop_assert_eq!(clustered, expected);
    }

    #[test]
    fn prop_same_error_text_same_cluster(error in "[ -~]{0,120}") {
        let a = infer_error_type(Some(&error), TestStatus::Failed);
        let b = infer_error_type(Some(&error), TestStatus::Failed);
        prop_assert_eq!(cluster_id(&a), cluster_id(&b));
    }

    #[test]
    fn prop_identical_passing_runs_have_no_changes(
        durations in prop::collection::vec(0u64..10_000, 1..20),
    ) {
        let results: Vec<TestResult> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| TestResult::new(format!("t{i}"), TestStatus::Passed, *d))
            .collect();
        let baseline: HashMap<String, TestResult> = results
            .iter()
            .map(|r| (r.test_id.clone(), r.clone()))
            .collect();
        let summary = RunSummary {
            run_id: "r".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            total: results.len() as u32,
            passed: results.len() as u32,
            failed: 0,
            skipped: 0,
            flaky: 0,
            slow: 0,
            duration: durations.iter().sum(),
            pass_rate: 100,
        };

        let comparison =
            ComparisonBuilder::new().build(&results, summary.clone(), summary, &baseline);
        prop_assert!(comparison.changes.is_empty());
        prop_assert_eq!(comparison.deltas().pass_rate, 0);
    }

    #[test]
    fn prop_digest_empty_window(
        history_entries in prop::collection::vec(entry_strategy(), 0..20),
        days_later in 60i64..400,
    ) {
        // All generated entries and summaries predate the window
        let mut history = TestHistory::default();
        history.tests.insert("t".to_string(), history_entries);
        history.summaries.push(RunSummary {
            run_id: "old".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            total: 1, passed: 1, failed: 0, skipped: 0,
            flaky: 0, slow: 0, duration: 1, pass_rate: 100,
        });
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(days_later);

        let digest = generate(&history, DigestPeriod::Monthly, now);
        prop_assert_eq!(digest.runs_analyzed, 0);
        prop_assert!(digest.pass_rate_trend.is_none());
        prop_assert!(digest.new_flaky_tests.is_empty());
        prop_assert!(digest.recovered_tests.is_empty());
        prop_assert!(digest.performance_trends.is_empty());
    }
}

#[test]
fn test_flakiness_example_two_of_three() {
    let entry = |passed| HistoryEntry {
        passed,
        duration: 10,
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        skipped: None,
        retry_count: None,
        run_id: None,
    };
    let history = vec![entry(false), entry(true), entry(false)];
    let current = TestResult::new("t", TestStatus::Passed, 10);
    let annotation = FlakinessAnalyzer::default().analyze(&current, &history);
    assert!((annotation.score.unwrap() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(annotation.indicator, FlakinessIndicator::Flaky);
}
