// Configuration for the analysis core
//
// Every threshold is a plain number with a stated default; the entity set
// itself is fixed. Each analyzer receives its own section at construction.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::digest::DigestPeriod;

/// Complete configuration surface
///
/// # Example
/// ```
/// use vigia::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.history.max_runs, 10);
/// assert_eq!(config.flakiness.unstable_threshold, 0.3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub flakiness: FlakinessConfig,
    pub performance: PerformanceConfig,
    pub retry: RetryConfig,
    pub stability: StabilityConfig,
    pub digest: DigestConfig,
}

/// Retention policy for the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of most recent runs kept in every collection
    pub max_runs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_runs: 10 }
    }
}

/// Flakiness classification thresholds (failure ratio, 0-1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlakinessConfig {
    /// Below this ratio a test is stable
    pub stable_threshold: f64,
    /// Below this ratio (and at or above stable) a test is unstable, otherwise flaky
    pub unstable_threshold: f64,
}

impl Default for FlakinessConfig {
    fn default() -> Self {
        Self {
            stable_threshold: 0.1,
            unstable_threshold: 0.3,
        }
    }
}

/// Performance trend detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Relative change versus the historical mean that counts as slower/faster
    ///
    /// 0.2 = a test must be more than 20% slower (or faster) than its average.
    pub regression_threshold: f64,

    /// Use the duration-aware threshold instead of `regression_threshold`
    ///
    /// Very fast tests (<100ms) get 50% tolerance, very slow ones (>10s) 15%.
    pub adaptive_threshold: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            regression_threshold: 0.2,
            adaptive_threshold: false,
        }
    }
}

/// Retry reliability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries above this count flag the test for attention
    pub attention_threshold: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attention_threshold: 3,
        }
    }
}

/// Weights of the three stability sub-scores, used exactly as given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityWeights {
    pub flakiness: f64,
    pub performance: f64,
    pub reliability: f64,
}

impl Default for StabilityWeights {
    fn default() -> Self {
        Self {
            flakiness: 0.4,
            performance: 0.3,
            reliability: 0.3,
        }
    }
}

/// Minimum overall score for each letter grade; anything lower is F
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a: 90,
            b: 80,
            c: 70,
            d: 60,
        }
    }
}

/// Composite stability scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub weights: StabilityWeights,
    pub grades: GradeThresholds,
    /// Overall scores below this need attention
    pub attention_threshold: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            weights: StabilityWeights::default(),
            grades: GradeThresholds::default(),
            attention_threshold: 70,
        }
    }
}

/// Health digest defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub period: DigestPeriod,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys fall back to their defaults. The loaded
    /// configuration is validated before it is returned.
    ///
    /// # Example TOML
    /// ```toml
    /// [history]
    /// max_runs = 20
    ///
    /// [stability.weights]
    /// flakiness = 0.5
    /// performance = 0.2
    /// reliability = 0.3
    /// ```
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Strict preset: flags instability and slowdowns earlier
    pub fn strict() -> Self {
        Self {
            flakiness: FlakinessConfig {
                stable_threshold: 0.05,
                unstable_threshold: 0.2,
            },
            performance: PerformanceConfig {
                regression_threshold: 0.1,
                adaptive_threshold: false,
            },
            retry: RetryConfig {
                attention_threshold: 1,
            },
            stability: StabilityConfig {
                attention_threshold: 80,
                ..StabilityConfig::default()
            },
            ..Self::default()
        }
    }

    /// Lenient preset: tolerates noisy suites, keeps more history
    pub fn lenient() -> Self {
        Self {
            history: HistoryConfig { max_runs: 30 },
            flakiness: FlakinessConfig {
                stable_threshold: 0.15,
                unstable_threshold: 0.4,
            },
            performance: PerformanceConfig {
                regression_threshold: 0.3,
                adaptive_threshold: true,
            },
            retry: RetryConfig {
                attention_threshold: 5,
            },
            stability: StabilityConfig {
                attention_threshold: 60,
                ..StabilityConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.history.max_runs == 0 {
            return Err("history.max_runs must be >= 1, got 0".to_string());
        }

        let flaky = &self.flakiness;
        for (name, value) in [
            ("flakiness.stable_threshold", flaky.stable_threshold),
            ("flakiness.unstable_threshold", flaky.unstable_threshold),
            (
                "performance.regression_threshold",
                self.performance.regression_threshold,
            ),
            ("stability.weights.flakiness", self.stability.weights.flakiness),
            (
                "stability.weights.performance",
                self.stability.weights.performance,
            ),
            (
                "stability.weights.reliability",
                self.stability.weights.reliability,
            ),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                ));
            }
        }

        if flaky.stable_threshold > flaky.unstable_threshold {
            return Err(format!(
                "flakiness.stable_threshold ({}) must not exceed flakiness.unstable_threshold ({})",
                flaky.stable_threshold, flaky.unstable_threshold
            ));
        }

        let grades = &self.stability.grades;
        if grades.a > 100 || !(grades.a > grades.b && grades.b > grades.c && grades.c > grades.d)
        {
            return Err(format!(
                "stability.grades must be strictly descending within 0..=100, got A={} B={} C={} D={}",
                grades.a, grades.b, grades.c, grades.d
            ));
        }

        if self.stability.attention_threshold > 100 {
            return Err(format!(
                "stability.attention_threshold must be in 0..=100, got {}",
                self.stability.attention_threshold
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.history.max_runs, 10);
        assert_eq!(config.flakiness.stable_threshold, 0.1);
        assert_eq!(config.flakiness.unstable_threshold, 0.3);
        assert_eq!(config.performance.regression_threshold, 0.2);
        assert!(!config.performance.adaptive_threshold);
        assert_eq!(config.retry.attention_threshold, 3);
        assert_eq!(config.stability.weights.flakiness, 0.4);
        assert_eq!(config.stability.grades.a, 90);
        assert_eq!(config.stability.attention_threshold, 70);
        assert_eq!(config.digest.period, DigestPeriod::Weekly);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(Config::strict().validate().is_ok());
        assert!(Config::lenient().validate().is_ok());
        assert_eq!(Config::strict().stability.weights.reliability, 0.3);
        assert_eq!(Config::lenient().history.max_runs, 30);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [history]
            max_runs = 5

            [stability.weights]
            flakiness = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.history.max_runs, 5);
        assert_eq!(config.stability.weights.flakiness, 0.5);
        assert_eq!(config.stability.weights.performance, 0.3);
        assert_eq!(config.stability.attention_threshold, 70);
        assert_eq!(config.flakiness.unstable_threshold, 0.3);
    }

    #[test]
    fn test_digest_period_from_toml() {
        let config = Config::from_toml_str("[digest]\nperiod = \"monthly\"\n").unwrap();
        assert_eq!(config.digest.period, DigestPeriod::Monthly);
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_max_runs() {
        let mut config = Config::default();
        config.history.max_runs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_threshold_order() {
        let mut config = Config::default();
        config.flakiness.stable_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_grades() {
        let mut config = Config::default();
        config.stability.grades.b = 95;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(Config::from_toml_str("[performance]\nregression_threshold = -1.0\n").is_err());
        assert!(Config::from_toml_str("not toml at all [").is_err());
    }
}
