// Health Digest: drift report over a trailing window of stored history
//
// The window is [now - period, now]. Run summaries inside it drive the
// pass-rate trend; each test's entries are split at the window start into
// before-period and in-period subsets to detect emergent flakiness,
// recoveries and slowdowns. Skipped entries and entries with unparsable
// timestamps are ignored.

mod render;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{format_timestamp, HistoryEntry, TestHistory};
use crate::stats::{failure_ratio, mean_duration, round1};

/// Failure ratio at which a test counts as flaky in a digest
pub const FLAKY_RATIO: f64 = 0.3;
/// Minimum in-period passes for a previously flaky test to count as recovered
pub const RECOVERY_MIN_PASSES: usize = 3;
/// Slowdown (percent) above which a performance trend is reported
pub const SLOWDOWN_PERCENT: f64 = 20.0;
/// Pass-rate movement (percentage points) needed for an up/down trend
pub const TREND_TOLERANCE: i64 = 1;

/// Trailing window length
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DigestPeriod {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl DigestPeriod {
    pub fn duration(&self) -> Duration {
        match self {
            DigestPeriod::Daily => Duration::hours(24),
            DigestPeriod::Weekly => Duration::days(7),
            DigestPeriod::Monthly => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestPeriod::Daily => "daily",
            DigestPeriod::Weekly => "weekly",
            DigestPeriod::Monthly => "monthly",
        }
    }

    /// "day", "week" or "month", for prose
    pub fn noun(&self) -> &'static str {
        match self {
            DigestPeriod::Daily => "day",
            DigestPeriod::Weekly => "week",
            DigestPeriod::Monthly => "month",
        }
    }
}

impl fmt::Display for DigestPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Pass rate of the earliest and latest in-window run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRateTrend {
    pub direction: TrendDirection,
    pub from: u32,
    pub to: u32,
}

impl PassRateTrend {
    pub fn between(from: u32, to: u32) -> Self {
        let diff = i64::from(to) - i64::from(from);
        let direction = if diff > TREND_TOLERANCE {
            TrendDirection::Up
        } else if diff < -TREND_TOLERANCE {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        };
        Self {
            direction,
            from,
            to,
        }
    }
}

/// A test that became flaky during the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFlakyTest {
    pub test_id: String,
    /// In-period failure ratio (0-1)
    pub failure_rate: f64,
    /// Before-period failure ratio, `None` when the test has no earlier history
    pub previous_failure_rate: Option<f64>,
}

/// A previously flaky test that passed every in-period run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredTest {
    pub test_id: String,
    pub previous_failure_rate: f64,
    pub consecutive_passes: usize,
}

/// A test whose in-period mean duration drifted upward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceDrift {
    pub test_id: String,
    /// Before-period mean duration (ms)
    pub previous_average: f64,
    /// In-period mean duration (ms)
    pub current_average: f64,
    /// One decimal
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestData {
    pub period: DigestPeriod,
    pub start_date: String,
    pub end_date: String,
    pub runs_analyzed: usize,
    pub pass_rate_trend: Option<PassRateTrend>,
    pub new_flaky_tests: Vec<NewFlakyTest>,
    pub recovered_tests: Vec<RecoveredTest>,
    pub performance_trends: Vec<PerformanceDrift>,
    pub summary: String,
}

/// Build the digest for the window ending at `now`
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use vigia::digest::{generate, DigestPeriod};
/// use vigia::model::TestHistory;
///
/// let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
/// let digest = generate(&TestHistory::default(), DigestPeriod::Weekly, now);
///
/// assert_eq!(digest.runs_analyzed, 0);
/// assert!(digest.pass_rate_trend.is_none());
/// assert!(digest.new_flaky_tests.is_empty());
/// ```
pub fn generate(history: &TestHistory, period: DigestPeriod, now: DateTime<Utc>) -> DigestData {
    let start = now - period.duration();
    let in_window = |ts: Option<DateTime<Utc>>| ts.is_some_and(|ts| ts >= start && ts <= now);

    let mut summaries: Vec<_> = history
        .summaries
        .iter()
        .filter_map(|s| {
            let ts = s.parsed_timestamp();
            in_window(ts).then_some((ts, s))
        })
        .collect();
    summaries.sort_by_key(|(ts, _)| *ts);

    let mut digest = DigestData {
        period,
        start_date: format_timestamp(start),
        end_date: format_timestamp(now),
        runs_analyzed: summaries.len(),
        pass_rate_trend: None,
        new_flaky_tests: Vec::new(),
        recovered_tests: Vec::new(),
        performance_trends: Vec::new(),
        summary: String::new(),
    };

    if let (Some((_, first)), Some((_, last))) = (summaries.first(), summaries.last()) {
        digest.pass_rate_trend = Some(PassRateTrend::between(first.pass_rate, last.pass_rate));

        for (test_id, entries) in &history.tests {
            let (before, during) = split_at_window(entries, start, now);
            analyze_test(&mut digest, test_id, &before, &during);
        }

        digest
            .new_flaky_tests
            .sort_by(|a, b| b.failure_rate.total_cmp(&a.failure_rate));
        digest
            .performance_trends
            .sort_by(|a, b| b.percent_change.total_cmp(&a.percent_change));
    } else {
        tracing::debug!(period = %period, "no runs in digest window");
    }

    digest.summary = render::summary_line(&digest);
    tracing::info!(
        period = %period,
        runs = digest.runs_analyzed,
        new_flaky = digest.new_flaky_tests.len(),
        recovered = digest.recovered_tests.len(),
        slower = digest.performance_trends.len(),
        "digest generated"
    );
    digest
}

/// Partition usable entries into before-window and in-window subsets
fn split_at_window(
    entries: &[HistoryEntry],
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (Vec<&HistoryEntry>, Vec<&HistoryEntry>) {
    let mut usable: Vec<(DateTime<Utc>, &HistoryEntry)> = entries
        .iter()
        .filter(|e| !e.is_skipped())
        .filter_map(|e| e.parsed_timestamp().map(|ts| (ts, e)))
        .collect();
    usable.sort_by_key(|(ts, _)| *ts);

    let before = usable
        .iter()
        .filter(|(ts, _)| *ts < start)
        .map(|(_, e)| *e)
        .collect();
    let during = usable
        .iter()
        .filter(|(ts, _)| *ts >= start && *ts <= now)
        .map(|(_, e)| *e)
        .collect();
    (before, during)
}

fn analyze_test(
    digest: &mut DigestData,
    test_id: &str,
    before: &[&HistoryEntry],
    during: &[&HistoryEntry],
) {
    let before_ratio = failure_ratio(before.iter().copied());
    let during_ratio = failure_ratio(during.iter().copied());

    if let Some(ratio) = during_ratio.filter(|r| *r >= FLAKY_RATIO) {
        if before_ratio.map_or(true, |prev| prev < FLAKY_RATIO) {
            tracing::debug!(test_id, ratio, "new flaky test");
            digest.new_flaky_tests.push(NewFlakyTest {
                test_id: test_id.to_string(),
                failure_rate: ratio,
                previous_failure_rate: before_ratio,
            });
        }
    }

    if let Some(prev) = before_ratio.filter(|r| *r >= FLAKY_RATIO) {
        if during.len() >= RECOVERY_MIN_PASSES && during.iter().all(|e| e.passed) {
            tracing::debug!(test_id, passes = during.len(), "recovered test");
            digest.recovered_tests.push(RecoveredTest {
                test_id: test_id.to_string(),
                previous_failure_rate: prev,
                consecutive_passes: during.len(),
            });
        }
    }

    let before_avg = mean_duration(before.iter().copied());
    let during_avg = mean_duration(during.iter().copied());
    if let (Some(previous), Some(current)) = (before_avg, during_avg) {
        if previous > 0.0 {
            let change = (current - previous) / previous * 100.0;
            if change > SLOWDOWN_PERCENT {
                digest.performance_trends.push(PerformanceDrift {
                    test_id: test_id.to_string(),
                    previous_average: round1(previous),
                    current_average: round1(current),
                    percent_change: round1(change),
                });
            }
        }
    }
}
