//! Data model shared by the store and every analyzer
//!
//! [`TestResult`] is the transient per-run record supplied by the test-execution
//! host. [`TestHistory`] is the durable record: per-test [`HistoryEntry`] lists
//! plus one [`RunSummary`] per completed run. Field names serialize in
//! camelCase so history files stay compatible with the reporter's JSON shape.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Final status of one test execution as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
    Interrupted,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::TimedOut => "timedOut",
            TestStatus::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the final status matched the test's declared expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Expected,
    Unexpected,
    Flaky,
    Skipped,
}

/// One test outcome for the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Stable identifier used as the history key
    pub test_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file: String,
    pub status: TestStatus,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: u64,
    /// Number of retries before the final attempt (0 = first attempt)
    #[serde(default)]
    pub retry: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TestOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TestResult {
    /// Create a result with the id doubling as title
    pub fn new(test_id: impl Into<String>, status: TestStatus, duration: u64) -> Self {
        let test_id = test_id.into();
        Self {
            title: test_id.clone(),
            test_id,
            file: String::new(),
            status,
            duration,
            retry: 0,
            error: None,
            outcome: None,
            tags: Vec::new(),
        }
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_outcome(mut self, outcome: TestOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

/// One past execution of one test. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub passed: bool,
    /// Duration in milliseconds
    pub duration: u64,
    /// ISO-8601 timestamp of the run that produced this entry
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl HistoryEntry {
    pub fn is_skipped(&self) -> bool {
        self.skipped.unwrap_or(false)
    }

    pub fn retries(&self) -> u32 {
        self.retry_count.unwrap_or(0)
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Build the entry recorded for `result` in the run `run_id`
    pub fn from_result(result: &TestResult, run_id: &str, timestamp: &str) -> Self {
        let skipped = result.status == TestStatus::Skipped;
        Self {
            passed: result.status == TestStatus::Passed,
            duration: result.duration,
            timestamp: timestamp.to_string(),
            skipped: skipped.then_some(true),
            retry_count: (result.retry > 0).then_some(result.retry),
            run_id: Some(run_id.to_string()),
        }
    }
}

/// Identity of one stored run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRef {
    pub run_id: String,
    pub timestamp: String,
}

/// Aggregate counters for one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    #[serde(default)]
    pub flaky: u32,
    #[serde(default)]
    pub slow: u32,
    /// Total run duration in milliseconds
    #[serde(default)]
    pub duration: u64,
    /// Integer percent, rounded
    pub pass_rate: u32,
}

impl RunSummary {
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// The persisted history document: `{runs, tests, summaries}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistory {
    #[serde(default)]
    pub runs: Vec<RunRef>,
    /// Test id → entries in chronological order
    #[serde(default)]
    pub tests: BTreeMap<String, Vec<HistoryEntry>>,
    #[serde(default)]
    pub summaries: Vec<RunSummary>,
}

impl TestHistory {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.tests.is_empty() && self.summaries.is_empty()
    }

    /// Entries for `test_id`, empty when the test is unknown
    pub fn entries(&self, test_id: &str) -> &[HistoryEntry] {
        self.tests.get(test_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most recent run summary, if any
    pub fn latest_summary(&self) -> Option<&RunSummary> {
        self.summaries.last()
    }
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 with offset (`2024-05-01T10:00:00Z`) and naive
/// date-times which are taken as UTC (`2024-05-01T10:00:00.123`).
/// Returns `None` for anything else; callers exclude such records.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way history files store it
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
