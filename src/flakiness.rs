//! Flakiness analysis
//!
//! A test's flakiness score is the fraction of its non-skipped historical
//! runs that failed. Skipped history entries never count in either direction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::FlakinessConfig;
use crate::model::{HistoryEntry, TestResult, TestStatus};
use crate::stats::failure_ratio;

/// Classification of a test's historical instability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlakinessIndicator {
    /// The current execution was skipped; history is not judged
    Skipped,
    /// No non-skipped history yet
    New,
    Stable,
    Unstable,
    Flaky,
}

impl FlakinessIndicator {
    pub fn label(&self) -> &'static str {
        match self {
            FlakinessIndicator::Skipped => "Skipped",
            FlakinessIndicator::New => "New",
            FlakinessIndicator::Stable => "Stable",
            FlakinessIndicator::Unstable => "Unstable",
            FlakinessIndicator::Flaky => "Flaky",
        }
    }
}

impl fmt::Display for FlakinessIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flakiness annotation for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakinessAnnotation {
    /// Failure ratio in `[0, 1]`; `None` when the test has no non-skipped history
    pub score: Option<f64>,
    pub indicator: FlakinessIndicator,
}

impl FlakinessAnnotation {
    /// True when the test has no comparable history
    pub fn is_new(&self) -> bool {
        self.score.is_none()
    }
}

/// Computes instability scores from test history
#[derive(Debug, Clone)]
pub struct FlakinessAnalyzer {
    config: FlakinessConfig,
}

impl FlakinessAnalyzer {
    pub fn new(config: FlakinessConfig) -> Self {
        Self { config }
    }

    /// Failure ratio over non-skipped entries, `None` if none remain
    pub fn score(&self, history: &[HistoryEntry]) -> Option<f64> {
        failure_ratio(history.iter().filter(|e| !e.is_skipped()))
    }

    /// Map a score onto stable / unstable / flaky
    pub fn classify(&self, score: f64) -> FlakinessIndicator {
        if score < self.config.stable_threshold {
            FlakinessIndicator::Stable
        } else if score < self.config.unstable_threshold {
            FlakinessIndicator::Unstable
        } else {
            FlakinessIndicator::Flaky
        }
    }

    /// Analyze one test against its history
    ///
    /// # Example
    /// ```
    /// use vigia::config::FlakinessConfig;
    /// use vigia::flakiness::{FlakinessAnalyzer, FlakinessIndicator};
    /// use vigia::model::{TestResult, TestStatus};
    ///
    /// let analyzer = FlakinessAnalyzer::new(FlakinessConfig::default());
    /// let result = TestResult::new("checkout", TestStatus::Passed, 120);
    /// let annotation = analyzer.analyze(&result, &[]);
    /// assert_eq!(annotation.indicator, FlakinessIndicator::New);
    /// assert!(annotation.score.is_none());
    /// ```
    pub fn analyze(&self, result: &TestResult, history: &[HistoryEntry]) -> FlakinessAnnotation {
        let score = self.score(history);

        let indicator = if result.status == TestStatus::Skipped {
            FlakinessIndicator::Skipped
        } else {
            match score {
                Some(score) => self.classify(score),
                None => FlakinessIndicator::New,
            }
        };

        tracing::debug!(test_id = %result.test_id, ?score, %indicator, "flakiness");
        FlakinessAnnotation { score, indicator }
    }
}

impl Default for FlakinessAnalyzer {
    fn default() -> Self {
        Self::new(FlakinessConfig::default())
    }
}
