// Tests for history loading, retention and baseline reconstruction

use super::*;
use crate::config::{FlakinessConfig, PerformanceConfig, RetryConfig};
use crate::flakiness::{FlakinessAnalyzer, FlakinessIndicator};
use crate::model::{RunSummary, TestResult, TestStatus};
use crate::performance::{PerformanceAnalyzer, PerformanceTrend};
use crate::retry::RetryAnalyzer;
use std::fs;
use tempfile::TempDir;

fn summary(run_id: &str, timestamp: &str) -> RunSummary {
    RunSummary {
        run_id: run_id.to_string(),
        timestamp: timestamp.to_string(),
        total: 1,
        passed: 1,
        failed: 0,
        skipped: 0,
        flaky: 0,
        slow: 0,
        duration: 100,
        pass_rate: 100,
    }
}

fn day(n: u32) -> String {
    format!("2024-05-{n:02}T10:00:00Z")
}

#[test]
fn test_get_unknown_test_is_empty() {
    let store = HistoryStore::in_memory(10);
    assert!(store.get("nope").is_empty());
    assert!(store.baseline().is_none());
}

#[test]
fn test_append_writes_entry_per_result() {
    let mut store = HistoryStore::in_memory(10);
    let results = vec![
        TestResult::new("a", TestStatus::Passed, 100),
        TestResult::new("b", TestStatus::Failed, 200).with_retry(2),
        TestResult::new("c", TestStatus::Skipped, 0),
    ];
    store.append(summary("run-1", &day(1)), &results);

    assert_eq!(store.history().runs.len(), 1);
    assert_eq!(store.history().summaries.len(), 1);

    let b = store.get("b");
    assert_eq!(b.len(), 1);
    assert!(!b[0].passed);
    assert_eq!(b[0].retry_count, Some(2));
    assert_eq!(b[0].run_id.as_deref(), Some("run-1"));
    assert_eq!(b[0].timestamp, day(1));
    assert!(store.get("c")[0].is_skipped());
}

#[test]
fn test_retention_keeps_most_recent_runs() {
    let mut store = HistoryStore::in_memory(3);
    for n in 1..=5 {
        store.append(
            summary(&format!("run-{n}"), &day(n)),
            &[TestResult::new("a", TestStatus::Passed, u64::from(n))],
        );
    }

    let history = store.history();
    let run_ids: Vec<&str> = history.runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(run_ids, vec!["run-3", "run-4", "run-5"]);
    assert_eq!(history.summaries.len(), 3);
    let durations: Vec<u64> = store.get("a").iter().map(|e| e.duration).collect();
    assert_eq!(durations, vec![3, 4, 5]);
}

#[test]
fn test_duplicate_run_id_keeps_first_occurrence() {
    let mut store = HistoryStore::in_memory(10);
    store.append(summary("run-1", &day(1)), &[TestResult::new("a", TestStatus::Passed, 10)]);
    store.append(summary("run-1", &day(2)), &[TestResult::new("a", TestStatus::Failed, 99)]);

    let history = store.history();
    assert_eq!(history.runs.len(), 1);
    assert_eq!(history.runs[0].timestamp, day(1));
    assert_eq!(history.summaries.len(), 1);
    let entries = store.get("a");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].passed);
}

#[test]
fn test_out_of_order_append_is_sorted() {
    let mut store = HistoryStore::in_memory(10);
    store.append(summary("late", &day(9)), &[TestResult::new("a", TestStatus::Passed, 9)]);
    store.append(summary("early", &day(2)), &[TestResult::new("a", TestStatus::Passed, 2)]);

    assert_eq!(store.history().runs[0].run_id, "early");
    assert_eq!(store.history().summaries[1].run_id, "late");
    assert_eq!(store.get("a")[0].duration, 2);
    // The newest stored run is the baseline, regardless of append order
    let (baseline, _) = store.baseline().unwrap();
    assert_eq!(baseline.run_id, "late");
}

#[test]
fn test_retention_drops_entries_of_expired_runs() {
    let mut store = HistoryStore::in_memory(2);
    store.append(
        summary("r1", &day(1)),
        &[
            TestResult::new("old", TestStatus::Passed, 10),
            TestResult::new("a", TestStatus::Passed, 1),
        ],
    );
    for n in 2..=4 {
        store.append(
            summary(&format!("r{n}"), &day(n)),
            &[TestResult::new("a", TestStatus::Passed, u64::from(n))],
        );
    }

    let history = store.history();
    let run_ids: Vec<&str> = history.runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(run_ids, vec!["r3", "r4"]);
    assert!(store.get("old").is_empty());
    assert!(!history.tests.contains_key("old"));

    let kept: Vec<Option<&str>> = store.get("a").iter().map(|e| e.run_id.as_deref()).collect();
    assert_eq!(kept, vec![Some("r3"), Some("r4")]);
}

#[test]
fn test_entries_without_run_id_fall_back_to_per_test_cap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");
    fs::write(
        &path,
        r#"{
            "tests": {
                "legacy": [
                    {"passed": true, "duration": 1, "timestamp": "2024-05-01T10:00:00Z"},
                    {"passed": true, "duration": 2, "timestamp": "2024-05-02T10:00:00Z"},
                    {"passed": true, "duration": 3, "timestamp": "2024-05-03T10:00:00Z"}
                ]
            }
        }"#,
    )
    .unwrap();

    let mut store = HistoryStore::open(&path, 2);
    store.append(summary("r9", &day(9)), &[TestResult::new("a", TestStatus::Passed, 9)]);

    let durations: Vec<u64> = store.get("legacy").iter().map(|e| e.duration).collect();
    assert_eq!(durations, vec![2, 3]);
}

#[test]
fn test_unparsable_entry_timestamps_are_ignored_by_analyzers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");
    fs::write(
        &path,
        r#"{
            "tests": {
                "a": [
                    {"passed": false, "duration": 99999, "retryCount": 10, "timestamp": "garbage"},
                    {"passed": true, "duration": 100, "timestamp": "2024-05-01T10:00:00Z"}
                ],
                "only-garbage": [
                    {"passed": false, "duration": 5, "timestamp": "not a date"}
                ]
            }
        }"#,
    )
    .unwrap();

    let store = HistoryStore::open(&path, 10);
    let history = store.get("a");
    assert_eq!(history.len(), 1);
    assert!(store.get("only-garbage").is_empty());

    let current = TestResult::new("a", TestStatus::Passed, 100);

    let flakiness = FlakinessAnalyzer::new(FlakinessConfig::default()).analyze(&current, history);
    assert_eq!(flakiness.score, Some(0.0));
    assert_eq!(flakiness.indicator, FlakinessIndicator::Stable);

    let performance =
        PerformanceAnalyzer::new(PerformanceConfig::default()).analyze(&current, history);
    assert_eq!(performance.trend, PerformanceTrend::Stable);

    let retry = RetryAnalyzer::new(RetryConfig::default()).analyze(&current, history);
    assert_eq!(retry.historical_retries, 0);
    assert!(!retry.needs_attention);
}

#[test]
fn test_missing_file_is_empty_history() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::open(dir.path().join("absent.json"), 10);
    assert!(store.history().is_empty());
}

#[test]
fn test_corrupt_file_is_empty_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");
    fs::write(&path, "{ this is not json").unwrap();
    assert!(HistoryStore::open(&path, 10).history().is_empty());

    fs::write(&path, "[1, 2, 3]").unwrap();
    assert!(HistoryStore::open(&path, 10).history().is_empty());
}

#[test]
fn test_malformed_records_are_skipped_and_order_restored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");
    fs::write(
        &path,
        r#"{
            "runs": [{"runId": "r2", "timestamp": "2024-05-02T10:00:00Z"}, {"bogus": true}],
            "tests": {
                "a": [
                    {"passed": true, "duration": 20, "timestamp": "2024-05-02T10:00:00Z"},
                    {"passed": "maybe"},
                    {"passed": false, "duration": 10, "timestamp": "2024-05-01T10:00:00Z"}
                ]
            }
        }"#,
    )
    .unwrap();

    let store = HistoryStore::open(&path, 10);
    assert_eq!(store.history().runs.len(), 1);
    assert!(store.history().summaries.is_empty());
    let entries = store.get("a");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].duration, 10);
    assert_eq!(entries[1].duration, 20);
}

#[test]
fn test_save_and_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("history.json");

    let mut store = HistoryStore::open(&path, 10);
    store.append(
        summary("run-1", &day(1)),
        &[TestResult::new("a", TestStatus::Failed, 321)],
    );
    store.save().unwrap();

    let reopened = HistoryStore::open(&path, 10);
    assert_eq!(reopened.history(), store.history());

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["runs"].is_array());
    assert!(raw["tests"]["a"].is_array());
    assert_eq!(raw["summaries"][0]["passRate"], 100);
}

#[test]
fn test_in_memory_store_cannot_save() {
    let store = HistoryStore::in_memory(10);
    assert!(matches!(store.save(), Err(HistoryError::NoBackingFile)));
}

#[test]
fn test_baseline_reconstructs_latest_run() {
    let mut store = HistoryStore::in_memory(10);
    store.append(
        summary("run-1", &day(1)),
        &[
            TestResult::new("a", TestStatus::Passed, 100),
            TestResult::new("gone", TestStatus::Passed, 5),
        ],
    );
    store.append(
        summary("run-2", &day(2)),
        &[
            TestResult::new("a", TestStatus::Failed, 150).with_retry(1),
            TestResult::new("b", TestStatus::Skipped, 0),
            TestResult::new("c", TestStatus::TimedOut, 3000),
        ],
    );

    let (run, results) = store.baseline().unwrap();
    assert_eq!(run.run_id, "run-2");
    assert_eq!(results.len(), 3);
    assert!(!results.contains_key("gone"));

    let a = &results["a"];
    assert_eq!(a.status, TestStatus::Failed);
    assert_eq!(a.duration, 150);
    assert_eq!(a.retry, 1);
    assert_eq!(a.title, "a");
    assert_eq!(results["b"].status, TestStatus::Skipped);
    assert_eq!(results["c"].status, TestStatus::Failed);
}
