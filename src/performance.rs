//! Performance trend analysis
//!
//! Compares the current duration of a test against the mean of its
//! non-skipped history and labels it slower, faster, stable or baseline.
//!
//! Severity tiers use strict comparisons: a change of exactly 50% is
//! `Medium`, exactly 25% is `Low`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PerformanceConfig;
use crate::model::{HistoryEntry, TestResult, TestStatus};
use crate::stats::{mean_duration, round1};

/// Tests faster than this (ms) get the wide tolerance
const FAST_TEST_MS: f64 = 100.0;
/// Tests slower than this (ms) get the narrow tolerance
const SLOW_TEST_MS: f64 = 10_000.0;
const FAST_TEST_THRESHOLD: f64 = 0.5;
const SLOW_TEST_THRESHOLD: f64 = 0.15;

/// Severity of a duration change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// `|percent| > 50` → high, `> 25` → medium, else low
    pub fn from_percent_change(percent_change: f64) -> Self {
        let magnitude = percent_change.abs();
        if magnitude > 50.0 {
            Severity::High
        } else if magnitude > 25.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Duration trend of one test relative to its history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum PerformanceTrend {
    /// Nothing to compare against yet
    Baseline,
    Slower { percent: u32 },
    Faster { percent: u32 },
    Stable,
}

impl PerformanceTrend {
    pub fn is_slower(&self) -> bool {
        matches!(self, PerformanceTrend::Slower { .. })
    }
}

impl fmt::Display for PerformanceTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceTrend::Baseline => f.write_str("baseline"),
            PerformanceTrend::Slower { percent } => write!(f, "{}% slower", percent),
            PerformanceTrend::Faster { percent } => write!(f, "{}% faster", percent),
            PerformanceTrend::Stable => f.write_str("stable"),
        }
    }
}

/// Detailed numbers behind a trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Mean duration of comparable history (ms)
    pub average_duration: f64,
    pub current_duration: u64,
    /// Relative change in percent, one decimal
    pub percent_change: f64,
    /// Change in ms, rounded
    pub absolute_change: i64,
    pub severity: Severity,
    pub is_regression: bool,
    pub is_improvement: bool,
    /// Relative threshold that was applied
    pub threshold: f64,
}

/// Performance annotation for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnnotation {
    pub trend: PerformanceTrend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
}

impl PerformanceAnnotation {
    fn baseline() -> Self {
        Self {
            trend: PerformanceTrend::Baseline,
            metrics: None,
        }
    }
}

/// Duration-aware relative threshold
///
/// Widens tolerance for very fast tests so millisecond jitter is not
/// reported as a regression, and narrows it for very slow tests where a
/// small relative change is a lot of wall time.
///
/// # Example
/// ```
/// use vigia::performance::adaptive_threshold;
///
/// assert_eq!(adaptive_threshold(40.0, 0.2), 0.5);
/// assert_eq!(adaptive_threshold(2_000.0, 0.2), 0.2);
/// assert_eq!(adaptive_threshold(30_000.0, 0.2), 0.15);
/// ```
pub fn adaptive_threshold(duration_ms: f64, base_threshold: f64) -> f64 {
    if duration_ms < FAST_TEST_MS {
        FAST_TEST_THRESHOLD
    } else if duration_ms > SLOW_TEST_MS {
        SLOW_TEST_THRESHOLD
    } else {
        base_threshold
    }
}

/// Computes duration trends from test history
#[derive(Debug, Clone)]
pub struct PerformanceAnalyzer {
    config: PerformanceConfig,
}

impl PerformanceAnalyzer {
    pub fn new(config: PerformanceConfig) -> Self {
        Self { config }
    }

    fn threshold_for(&self, average_ms: f64) -> f64 {
        if self.config.adaptive_threshold {
            adaptive_threshold(average_ms, self.config.regression_threshold)
        } else {
            self.config.regression_threshold
        }
    }

    /// Analyze one test against its history
    ///
    /// Skipped history entries are ignored. A skipped current test, an empty
    /// comparable history or a zero historical mean all yield `Baseline`.
    ///
    /// # Example
    /// ```
    /// use vigia::config::PerformanceConfig;
    /// use vigia::model::{HistoryEntry, TestResult, TestStatus};
    /// use vigia::performance::{PerformanceAnalyzer, PerformanceTrend, Severity};
    ///
    /// let entry = HistoryEntry {
    ///     passed: true,
    ///     duration: 1000,
    ///     timestamp: "2024-05-01T10:00:00Z".to_string(),
    ///     skipped: None,
    ///     retry_count: None,
    ///     run_id: None,
    /// };
    /// let analyzer = PerformanceAnalyzer::new(PerformanceConfig::default());
    /// let result = TestResult::new("search", TestStatus::Passed, 1500);
    /// let annotation = analyzer.analyze(&result, &[entry]);
    ///
    /// assert_eq!(annotation.trend, PerformanceTrend::Slower { percent: 50 });
    /// assert_eq!(annotation.metrics.unwrap().severity, Severity::Medium);
    /// ```
    pub fn analyze(&self, result: &TestResult, history: &[HistoryEntry]) -> PerformanceAnnotation {
        if result.status == TestStatus::Skipped {
            return PerformanceAnnotation::baseline();
        }

        let Some(average) = mean_duration(history.iter().filter(|e| !e.is_skipped())) else {
            return PerformanceAnnotation::baseline();
        };
        if average <= 0.0 {
            return PerformanceAnnotation::baseline();
        }

        let current = result.duration as f64;
        let diff = (current - average) / average;
        let threshold = self.threshold_for(average);

        let trend = if diff > threshold {
            PerformanceTrend::Slower {
                percent: (diff * 100.0).round() as u32,
            }
        } else if diff < -threshold {
            PerformanceTrend::Faster {
                percent: (-diff * 100.0).round() as u32,
            }
        } else {
            PerformanceTrend::Stable
        };

        let percent_change = round1(diff * 100.0);
        let metrics = PerformanceMetrics {
            average_duration: average,
            current_duration: result.duration,
            percent_change,
            absolute_change: (current - average).round() as i64,
            severity: Severity::from_percent_change(percent_change),
            is_regression: diff > threshold,
            is_improvement: diff < -threshold,
            threshold,
        };

        tracing::debug!(test_id = %result.test_id, %trend, percent_change, "performance");
        PerformanceAnnotation {
            trend,
            metrics: Some(metrics),
        }
    }
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self::new(PerformanceConfig::default())
    }
}
