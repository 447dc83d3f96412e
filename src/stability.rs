//! Composite stability scoring
//!
//! Combines three 0-100 sub-scores (flakiness, performance, reliability)
//! into one weighted score and letter grade per test, and aggregates suite
//! level statistics over a whole run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::annotate::AnnotatedResult;
use crate::config::{GradeThresholds, StabilityConfig};
use crate::flakiness::FlakinessAnnotation;
use crate::model::{TestResult, TestStatus};
use crate::performance::{PerformanceAnnotation, Severity};
use crate::retry::RetryInfo;
use crate::stats::{percent, round1};

/// Letter grade derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Grade for `score` under the given cut points
    pub fn from_score(score: u32, thresholds: &GradeThresholds) -> Self {
        if score >= thresholds.a {
            Grade::A
        } else if score >= thresholds.b {
            Grade::B
        } else if score >= thresholds.c {
            Grade::C
        } else if score >= thresholds.d {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Stability score of one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityScore {
    /// Weighted composite in `[0, 100]`
    pub overall: u32,
    pub grade: Grade,
    pub flakiness: f64,
    pub performance: u32,
    pub reliability: u32,
    pub needs_attention: bool,
}

/// Scores tests from the outputs of the other analyzers
#[derive(Debug, Clone)]
pub struct StabilityScorer {
    config: StabilityConfig,
}

impl StabilityScorer {
    pub fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    /// `100 * (1 - score)`, or 100 for a new test
    pub fn flakiness_component(flakiness: &FlakinessAnnotation) -> f64 {
        match flakiness.score {
            Some(score) => 100.0 * (1.0 - score.clamp(0.0, 1.0)),
            None => 100.0,
        }
    }

    /// 100 improved, 90 stable, 75/50/25 for low/medium/high regressions
    ///
    /// Tests without metrics (new or skipped) score 100.
    pub fn performance_component(performance: &PerformanceAnnotation) -> u32 {
        let Some(metrics) = &performance.metrics else {
            return 100;
        };
        if metrics.is_improvement {
            return 100;
        }
        if !metrics.is_regression {
            return 90;
        }
        match metrics.severity {
            Severity::Low => 75,
            Severity::Medium => 50,
            Severity::High => 25,
        }
    }

    /// Reliability of the current execution given its retries
    pub fn reliability_component(result: &TestResult, retry: &RetryInfo) -> u32 {
        let retries = retry.total_retries as i64;
        match result.status {
            TestStatus::Passed if retries == 0 => 100,
            TestStatus::Passed => (100 - 15 * retries).max(50) as u32,
            TestStatus::Skipped => 75,
            TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted => {
                (40 - 10 * retries).max(0) as u32
            }
        }
    }

    /// Combine the three components with the configured weights
    ///
    /// # Example
    /// ```
    /// use vigia::config::StabilityConfig;
    /// use vigia::flakiness::FlakinessAnalyzer;
    /// use vigia::model::{TestResult, TestStatus};
    /// use vigia::performance::PerformanceAnalyzer;
    /// use vigia::retry::RetryAnalyzer;
    /// use vigia::stability::{Grade, StabilityScorer};
    ///
    /// let result = TestResult::new("login", TestStatus::Passed, 300);
    /// let flakiness = FlakinessAnalyzer::default().analyze(&result, &[]);
    /// let performance = PerformanceAnalyzer::default().analyze(&result, &[]);
    /// let retry = RetryAnalyzer::default().analyze(&result, &[]);
    ///
    /// let score = StabilityScorer::new(StabilityConfig::default())
    ///     .score(&result, &flakiness, &performance, &retry);
    /// assert_eq!(score.overall, 100);
    /// assert_eq!(score.grade, Grade::A);
    /// ```
    pub fn score(
        &self,
        result: &TestResult,
        flakiness: &FlakinessAnnotation,
        performance: &PerformanceAnnotation,
        retry: &RetryInfo,
    ) -> StabilityScore {
        let flakiness_score = Self::flakiness_component(flakiness);
        let performance_score = Self::performance_component(performance);
        let reliability_score = Self::reliability_component(result, retry);

        let weights = &self.config.weights;
        let weighted = weights.flakiness * flakiness_score
            + weights.performance * performance_score as f64
            + weights.reliability * reliability_score as f64;
        let overall = weighted.round().clamp(0.0, 100.0) as u32;

        StabilityScore {
            overall,
            grade: Grade::from_score(overall, &self.config.grades),
            flakiness: round1(flakiness_score),
            performance: performance_score,
            reliability: reliability_score,
            needs_attention: overall < self.config.attention_threshold,
        }
    }
}

impl Default for StabilityScorer {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

/// Suite level statistics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteStats {
    pub total: u32,
    pub passed: u32,
    /// Failed, timed out and interrupted
    pub failed: u32,
    pub skipped: u32,
    pub timed_out: u32,
    pub interrupted: u32,
    /// Tests whose flakiness score reached the unstable threshold
    pub flaky: u32,
    /// Tests trending slower than their history
    pub slow: u32,
    pub needs_attention: u32,
    /// Percent of executed (non-skipped) tests that passed
    pub pass_rate: u32,
    /// Mean overall stability, one decimal; `None` for an empty run
    pub average_stability: Option<f64>,
}

impl SuiteStats {
    /// Aggregate annotated results
    ///
    /// `flaky_threshold` is the score at or above which a test counts as flaky.
    pub fn aggregate(results: &[AnnotatedResult], flaky_threshold: f64) -> Self {
        let mut stats = SuiteStats::default();
        let mut stability_sum = 0.0;

        for annotated in results {
            stats.total += 1;
            match annotated.result.status {
                TestStatus::Passed => stats.passed += 1,
                TestStatus::Skipped => stats.skipped += 1,
                TestStatus::Failed => stats.failed += 1,
                TestStatus::TimedOut => {
                    stats.failed += 1;
                    stats.timed_out += 1;
                }
                TestStatus::Interrupted => {
                    stats.failed += 1;
                    stats.interrupted += 1;
                }
            }

            let annotations = &annotated.annotations;
            if annotations
                .flakiness
                .score
                .is_some_and(|score| score >= flaky_threshold)
            {
                stats.flaky += 1;
            }
            if annotations.performance.trend.is_slower() {
                stats.slow += 1;
            }
            stability_sum += annotations.stability.overall as f64;
            if annotations.stability.needs_attention {
                stats.needs_attention += 1;
            }
        }

        stats.pass_rate = percent(stats.passed, stats.passed + stats.failed);
        if stats.total > 0 {
            stats.average_stability = Some(round1(stability_sum / stats.total as f64));
        }
        stats
    }
}
