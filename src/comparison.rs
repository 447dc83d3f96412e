//! Run-to-run comparison against a stored baseline
//!
//! The baseline is the latest stored run, reconstructed from history by
//! [`crate::history::HistoryStore::baseline`]. Status transitions and
//! duration drift are bucketed per test; run-level deltas are derived on
//! demand from the two summaries rather than stored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{RunSummary, TestResult, TestStatus};

/// Default relative duration change that counts as a regression/improvement
pub const DEFAULT_DURATION_THRESHOLD: f64 = 0.2;

/// A current result together with the baseline values it was compared to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedTest {
    #[serde(flatten)]
    pub result: TestResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_status: Option<TestStatus>,
    /// Baseline duration (ms), the comparison point for duration changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_duration: Option<u64>,
}

impl ChangedTest {
    fn new(result: &TestResult, baseline: Option<&TestResult>) -> Self {
        Self {
            result: result.clone(),
            baseline_status: baseline.map(|b| b.status),
            baseline_duration: baseline.map(|b| b.duration),
        }
    }

    /// Relative duration change versus the baseline in percent, one decimal
    pub fn duration_change_percent(&self) -> Option<f64> {
        let baseline = self.baseline_duration.filter(|d| *d > 0)? as f64;
        let change = (self.result.duration as f64 - baseline) / baseline * 100.0;
        Some(crate::stats::round1(change))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonChanges {
    pub new_failures: Vec<ChangedTest>,
    pub fixed_tests: Vec<ChangedTest>,
    pub new_tests: Vec<ChangedTest>,
    pub regressions: Vec<ChangedTest>,
    pub improvements: Vec<ChangedTest>,
}

impl ComparisonChanges {
    pub fn is_empty(&self) -> bool {
        self.new_failures.is_empty()
            && self.fixed_tests.is_empty()
            && self.new_tests.is_empty()
            && self.regressions.is_empty()
            && self.improvements.is_empty()
    }
}

/// Diff of the current run against a baseline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunComparison {
    pub baseline_run: RunSummary,
    pub current_run: RunSummary,
    pub changes: ComparisonChanges,
}

/// Run-level deltas (current minus baseline)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDeltas {
    /// Percentage points
    pub pass_rate: i64,
    /// Milliseconds
    pub duration: i64,
    /// Relative duration change in percent, `None` for a zero-length baseline
    pub duration_percent: Option<f64>,
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub flaky: i64,
    pub slow: i64,
}

impl RunComparison {
    pub fn deltas(&self) -> RunDeltas {
        let base = &self.baseline_run;
        let cur = &self.current_run;
        let diff = |current: u32, baseline: u32| i64::from(current) - i64::from(baseline);

        let duration = cur.duration as i64 - base.duration as i64;
        let duration_percent = (base.duration > 0)
            .then(|| crate::stats::round1(duration as f64 / base.duration as f64 * 100.0));

        RunDeltas {
            pass_rate: diff(cur.pass_rate, base.pass_rate),
            duration,
            duration_percent,
            total: diff(cur.total, base.total),
            passed: diff(cur.passed, base.passed),
            failed: diff(cur.failed, base.failed),
            skipped: diff(cur.skipped, base.skipped),
            flaky: diff(cur.flaky, base.flaky),
            slow: diff(cur.slow, base.slow),
        }
    }
}

fn failed_or_timed_out(status: TestStatus) -> bool {
    matches!(status, TestStatus::Failed | TestStatus::TimedOut)
}

/// Buckets each current result against its baseline counterpart
#[derive(Debug, Clone)]
pub struct ComparisonBuilder {
    duration_threshold: f64,
}

impl ComparisonBuilder {
    pub fn new() -> Self {
        Self {
            duration_threshold: DEFAULT_DURATION_THRESHOLD,
        }
    }

    pub fn with_duration_threshold(mut self, threshold: f64) -> Self {
        self.duration_threshold = threshold;
        self
    }

    /// Compare `current` against the baseline run
    ///
    /// # Example
    /// ```
    /// use std::collections::HashMap;
    /// use vigia::comparison::ComparisonBuilder;
    /// use vigia::model::{RunSummary, TestResult, TestStatus};
    ///
    /// let summary = |id: &str| RunSummary {
    ///     run_id: id.to_string(),
    ///     timestamp: "2024-05-01T10:00:00Z".to_string(),
    ///     total: 1, passed: 1, failed: 0, skipped: 0,
    ///     flaky: 0, slow: 0, duration: 100, pass_rate: 100,
    /// };
    ///
    /// let mut baseline = HashMap::new();
    /// baseline.insert("a".to_string(), TestResult::new("a", TestStatus::Passed, 100));
    ///
    /// let current = vec![TestResult::new("a", TestStatus::Failed, 100)];
    /// let comparison =
    ///     ComparisonBuilder::new().build(&current, summary("r2"), summary("r1"), &baseline);
    ///
    /// assert_eq!(comparison.changes.new_failures.len(), 1);
    /// assert!(comparison.changes.regressions.is_empty());
    /// ```
    pub fn build(
        &self,
        current: &[TestResult],
        current_run: RunSummary,
        baseline_run: RunSummary,
        baseline: &HashMap<String, TestResult>,
    ) -> RunComparison {
        let mut changes = ComparisonChanges::default();

        for result in current {
            let Some(previous) = baseline.get(&result.test_id) else {
                changes.new_tests.push(ChangedTest::new(result, None));
                continue;
            };

            if previous.status == TestStatus::Passed && failed_or_timed_out(result.status) {
                changes.new_failures.push(ChangedTest::new(result, Some(previous)));
            } else if failed_or_timed_out(previous.status) && result.status == TestStatus::Passed {
                changes.fixed_tests.push(ChangedTest::new(result, Some(previous)));
            } else if previous.status == TestStatus::Passed
                && result.status == TestStatus::Passed
                && previous.duration > 0
            {
                let ratio = (result.duration as f64 - previous.duration as f64)
                    / previous.duration as f64;
                if ratio > self.duration_threshold {
                    changes.regressions.push(ChangedTest::new(result, Some(previous)));
                } else if ratio < -self.duration_threshold {
                    changes.improvements.push(ChangedTest::new(result, Some(previous)));
                }
            }
        }

        tracing::debug!(
            baseline = %baseline_run.run_id,
            new_failures = changes.new_failures.len(),
            fixed = changes.fixed_tests.len(),
            new_tests = changes.new_tests.len(),
            regressions = changes.regressions.len(),
            improvements = changes.improvements.len(),
            "run comparison built"
        );

        RunComparison {
            baseline_run,
            current_run,
            changes,
        }
    }
}

impl Default for ComparisonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
