//! Retry reliability analysis
//!
//! A run with `retry = n` means n attempts failed before the final one. The
//! attempt pattern is therefore `n` failures followed by the final outcome.

use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::model::{HistoryEntry, TestResult, TestStatus};

/// Retry behaviour of one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInfo {
    /// Retries in the current run
    pub total_retries: u32,
    /// Index of the first passing attempt, -1 if no attempt passed
    pub passed_on_retry: i32,
    /// Failed attempts in the current run
    pub failed_retries: u32,
    /// Outcome of every attempt in order (true = passed)
    pub retry_pattern: Vec<bool>,
    /// Retries recorded across retained history
    pub historical_retries: u32,
    /// Number of retained runs that needed at least one retry
    pub runs_with_retries: u32,
    pub needs_attention: bool,
}

impl RetryInfo {
    /// Passed only after at least one retry
    pub fn passed_after_retry(&self) -> bool {
        self.passed_on_retry > 0
    }

    /// Passed on the first attempt
    pub fn clean_pass(&self) -> bool {
        self.passed_on_retry == 0
    }
}

/// Computes retry reliability from the current run and history
#[derive(Debug, Clone)]
pub struct RetryAnalyzer {
    config: RetryConfig,
}

impl RetryAnalyzer {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Analyze retries of one test
    ///
    /// `needs_attention` is set when the current retries plus the retries
    /// recorded in retained history exceed the configured threshold.
    ///
    /// # Example
    /// ```
    /// use vigia::config::RetryConfig;
    /// use vigia::model::{TestResult, TestStatus};
    /// use vigia::retry::RetryAnalyzer;
    ///
    /// let analyzer = RetryAnalyzer::new(RetryConfig::default());
    /// let result = TestResult::new("upload", TestStatus::Passed, 900).with_retry(2);
    /// let info = analyzer.analyze(&result, &[]);
    ///
    /// assert_eq!(info.retry_pattern, vec![false, false, true]);
    /// assert_eq!(info.passed_on_retry, 2);
    /// assert_eq!(info.failed_retries, 2);
    /// assert!(!info.needs_attention);
    /// ```
    pub fn analyze(&self, result: &TestResult, history: &[HistoryEntry]) -> RetryInfo {
        let total_retries = result.retry;

        let mut retry_pattern = vec![false; total_retries as usize];
        if result.status != TestStatus::Skipped {
            retry_pattern.push(result.status == TestStatus::Passed);
        }

        let passed_on_retry = retry_pattern
            .iter()
            .position(|passed| *passed)
            .map(|idx| idx as i32)
            .unwrap_or(-1);
        let failed_retries = retry_pattern.iter().filter(|passed| !**passed).count() as u32;

        let historical_retries: u32 = history.iter().map(HistoryEntry::retries).sum();
        let runs_with_retries = history.iter().filter(|e| e.retries() > 0).count() as u32;

        let needs_attention =
            total_retries.saturating_add(historical_retries) > self.config.attention_threshold;

        if needs_attention {
            tracing::debug!(
                test_id = %result.test_id,
                total_retries,
                historical_retries,
                "retry count above attention threshold"
            );
        }

        RetryInfo {
            total_retries,
            passed_on_retry,
            failed_retries,
            retry_pattern,
            historical_retries,
            runs_with_retries,
            needs_attention,
        }
    }
}

impl Default for RetryAnalyzer {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
