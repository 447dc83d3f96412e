//! Per-run analysis pipeline
//!
//! Each analyzer is a pure function of one result and its history. Their
//! outputs are collected into a [`TestAnnotations`] record and paired with
//! the untouched [`TestResult`]; nothing is written back onto the result.
//!
//! Run order: annotate every test against the history as it was before this
//! run, cluster failures, build suite stats and the run summary, compare with
//! the latest stored run, then append the run to the store.

use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterRef, FailureCluster, FailureClusterer};
use crate::comparison::{ComparisonBuilder, RunComparison};
use crate::config::Config;
use crate::flakiness::{FlakinessAnalyzer, FlakinessAnnotation};
use crate::history::HistoryStore;
use crate::model::{HistoryEntry, RunSummary, TestResult};
use crate::performance::{PerformanceAnalyzer, PerformanceAnnotation};
use crate::retry::{RetryAnalyzer, RetryInfo};
use crate::stability::{StabilityScore, StabilityScorer, SuiteStats};

/// Everything the analyzers derived for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAnnotations {
    pub flakiness: FlakinessAnnotation,
    pub performance: PerformanceAnnotation,
    pub retry_info: RetryInfo,
    pub stability: StabilityScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_cluster: Option<ClusterRef>,
}

/// A host result together with its annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedResult {
    #[serde(flatten)]
    pub result: TestResult,
    #[serde(flatten)]
    pub annotations: TestAnnotations,
}

/// Output of one analyzed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub summary: RunSummary,
    pub suite: SuiteStats,
    pub results: Vec<AnnotatedResult>,
    pub clusters: Vec<FailureCluster>,
    /// `None` when the history held no earlier run
    pub comparison: Option<RunComparison>,
}

/// Holds one instance of every analyzer, configured once
#[derive(Debug, Clone)]
pub struct RunAnalyzer {
    flakiness: FlakinessAnalyzer,
    performance: PerformanceAnalyzer,
    retry: RetryAnalyzer,
    stability: StabilityScorer,
    clusterer: FailureClusterer,
    comparison: ComparisonBuilder,
    flaky_threshold: f64,
}

impl RunAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            flakiness: FlakinessAnalyzer::new(config.flakiness.clone()),
            performance: PerformanceAnalyzer::new(config.performance.clone()),
            retry: RetryAnalyzer::new(config.retry.clone()),
            stability: StabilityScorer::new(config.stability.clone()),
            clusterer: FailureClusterer::new(),
            comparison: ComparisonBuilder::new(),
            flaky_threshold: config.flakiness.unstable_threshold,
        }
    }

    /// Run every per-test analyzer against `history`
    pub fn annotate_test(&self, result: &TestResult, history: &[HistoryEntry]) -> TestAnnotations {
        let flakiness = self.flakiness.analyze(result, history);
        let performance = self.performance.analyze(result, history);
        let retry_info = self.retry.analyze(result, history);
        let stability = self
            .stability
            .score(result, &flakiness, &performance, &retry_info);

        TestAnnotations {
            flakiness,
            performance,
            retry_info,
            stability,
            failure_cluster: None,
        }
    }

    /// Analyze a completed run and record it in `store`
    ///
    /// The store is only mutated in memory; persisting it is left to the
    /// caller so a failed write never loses the computed report.
    ///
    /// # Example
    /// ```
    /// use vigia::annotate::RunAnalyzer;
    /// use vigia::config::Config;
    /// use vigia::history::HistoryStore;
    /// use vigia::model::{TestResult, TestStatus};
    ///
    /// let analyzer = RunAnalyzer::new(&Config::default());
    /// let mut store = HistoryStore::in_memory(10);
    /// let results = vec![
    ///     TestResult::new("login", TestStatus::Passed, 120),
    ///     TestResult::new("checkout", TestStatus::Failed, 900).with_error("TypeError: boom"),
    /// ];
    ///
    /// let report = analyzer.analyze_run(&results, &mut store, "run-1", "2024-05-01T10:00:00Z");
    /// assert_eq!(report.summary.pass_rate, 50);
    /// assert_eq!(report.clusters.len(), 1);
    /// assert!(report.comparison.is_none());
    /// assert_eq!(store.get("login").len(), 1);
    /// ```
    pub fn analyze_run(
        &self,
        results: &[TestResult],
        store: &mut HistoryStore,
        run_id: &str,
        timestamp: &str,
    ) -> RunReport {
        let mut annotated: Vec<AnnotatedResult> = results
            .iter()
            .map(|result| AnnotatedResult {
                annotations: self.annotate_test(result, store.get(&result.test_id)),
                result: result.clone(),
            })
            .collect();

        let clusters = self.clusterer.cluster(results);
        let index = FailureClusterer::index(&clusters);
        for entry in &mut annotated {
            entry.annotations.failure_cluster = index.get(&entry.result.test_id).cloned();
        }

        let suite = SuiteStats::aggregate(&annotated, self.flaky_threshold);
        let summary = RunSummary {
            run_id: run_id.to_string(),
            timestamp: timestamp.to_string(),
            total: suite.total,
            passed: suite.passed,
            failed: suite.failed,
            skipped: suite.skipped,
            flaky: suite.flaky,
            slow: suite.slow,
            duration: results.iter().map(|r| r.duration).sum(),
            pass_rate: suite.pass_rate,
        };

        let comparison = store.baseline().map(|(baseline_run, baseline)| {
            self.comparison
                .build(results, summary.clone(), baseline_run, &baseline)
        });

        store.append(summary.clone(), results);

        tracing::info!(
            run_id,
            total = suite.total,
            failed = suite.failed,
            flaky = suite.flaky,
            clusters = clusters.len(),
            pass_rate = suite.pass_rate,
            "run analyzed"
        );

        RunReport {
            summary,
            suite,
            results: annotated,
            clusters,
            comparison,
        }
    }
}

impl Default for RunAnalyzer {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl RunReport {
    /// Plain-text report for terminals
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        let suite = &self.suite;

        output.push_str(&format!("Run {} ({})\n", self.summary.run_id, self.summary.timestamp));
        output.push_str(&format!(
            "Tests: {} total, {} passed, {} failed, {} skipped\n",
            suite.total, suite.passed, suite.failed, suite.skipped
        ));
        output.push_str(&format!("Pass rate: {}%\n", suite.pass_rate));
        if let Some(avg) = suite.average_stability {
            output.push_str(&format!("Average stability: {:.1}\n", avg));
        }
        output.push_str(&format!(
            "Flaky: {}  Slow: {}  Needs attention: {}\n",
            suite.flaky, suite.slow, suite.needs_attention
        ));

        let attention: Vec<&AnnotatedResult> = self
            .results
            .iter()
            .filter(|r| r.annotations.stability.needs_attention)
            .collect();
        if !attention.is_empty() {
            output.push_str("\nNeeds attention:\n");
            for entry in attention {
                let stability = &entry.annotations.stability;
                output.push_str(&format!(
                    "  [{}] {} {} ({}, {})\n",
                    stability.grade,
                    stability.overall,
                    entry.result.test_id,
                    entry.annotations.flakiness.indicator,
                    entry.annotations.performance.trend
                ));
            }
        }

        if !self.clusters.is_empty() {
            output.push_str("\nFailure clusters:\n");
            for cluster in FailureClusterer::largest_clusters(&self.clusters, self.clusters.len()) {
                output.push_str(&format!("  {} x{}\n", cluster.error_type, cluster.count));
                for test in &cluster.tests {
                    output.push_str(&format!("    - {}\n", test.test_id));
                }
            }
        }

        if let Some(comparison) = &self.comparison {
            let changes = &comparison.changes;
            let deltas = comparison.deltas();
            output.push_str(&format!(
                "\nCompared with {}: pass rate {:+} pts, duration {:+}ms\n",
                comparison.baseline_run.run_id, deltas.pass_rate, deltas.duration
            ));
            let buckets = [
                ("New failures", &changes.new_failures),
                ("Fixed", &changes.fixed_tests),
                ("New tests", &changes.new_tests),
                ("Slower", &changes.regressions),
                ("Faster", &changes.improvements),
            ];
            for (label, tests) in buckets {
                if tests.is_empty() {
                    continue;
                }
                let ids: Vec<&str> = tests.iter().map(|t| t.result.test_id.as_str()).collect();
                output.push_str(&format!("  {}: {}\n", label, ids.join(", ")));
            }
        }

        output
    }
}
