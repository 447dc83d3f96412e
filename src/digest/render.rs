use super::{DigestData, TrendDirection};

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

fn arrow(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Up => "↑",
        TrendDirection::Down => "↓",
        TrendDirection::Stable => "→",
    }
}

/// Prose summary stored on the digest
pub(super) fn summary_line(digest: &DigestData) -> String {
    let noun = digest.period.noun();
    if digest.runs_analyzed == 0 {
        return format!("No test runs recorded in the last {noun}.");
    }

    let mut line = format!(
        "Analyzed {} over the last {noun}.",
        plural(digest.runs_analyzed, "run")
    );

    if let Some(trend) = &digest.pass_rate_trend {
        line.push_str(&match trend.direction {
            TrendDirection::Up => {
                format!(" Pass rate improved from {}% to {}%.", trend.from, trend.to)
            }
            TrendDirection::Down => {
                format!(" Pass rate dropped from {}% to {}%.", trend.from, trend.to)
            }
            TrendDirection::Stable => format!(" Pass rate held steady at {}%.", trend.to),
        });
    }

    let mut notes = Vec::new();
    if !digest.new_flaky_tests.is_empty() {
        notes.push(plural(digest.new_flaky_tests.len(), "new flaky test"));
    }
    if !digest.recovered_tests.is_empty() {
        notes.push(plural(digest.recovered_tests.len(), "recovered test"));
    }
    if !digest.performance_trends.is_empty() {
        notes.push(plural(digest.performance_trends.len(), "slower test"));
    }

    if notes.is_empty() {
        line.push_str(" No new issues detected.");
    } else {
        line.push_str(&format!(" {}.", notes.join(", ")));
    }
    line
}

impl DigestData {
    /// Markdown report for chat or PR comments
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# Test Health Digest ({})\n\n", self.period));
        output.push_str(&format!("_{} to {}_\n\n", self.start_date, self.end_date));
        output.push_str(&format!("{}\n", self.summary));

        if self.runs_analyzed == 0 {
            return output;
        }

        if let Some(trend) = &self.pass_rate_trend {
            output.push_str("\n## Pass Rate\n\n");
            output.push_str(&format!(
                "{} {}% → {}%\n",
                arrow(trend.direction),
                trend.from,
                trend.to
            ));
        }

        if !self.new_flaky_tests.is_empty() {
            output.push_str("\n## New Flaky Tests\n\n");
            output.push_str("| Test | Failure rate | Before |\n");
            output.push_str("|------|--------------|--------|\n");
            for test in &self.new_flaky_tests {
                let before = test
                    .previous_failure_rate
                    .map(percent)
                    .unwrap_or_else(|| "new".to_string());
                output.push_str(&format!(
                    "| `{}` | {} | {} |\n",
                    test.test_id,
                    percent(test.failure_rate),
                    before
                ));
            }
        }

        if !self.recovered_tests.is_empty() {
            output.push_str("\n## Recovered Tests\n\n");
            for test in &self.recovered_tests {
                output.push_str(&format!(
                    "- `{}`: {} consecutive passes (was failing {})\n",
                    test.test_id,
                    test.consecutive_passes,
                    percent(test.previous_failure_rate)
                ));
            }
        }

        if !self.performance_trends.is_empty() {
            output.push_str("\n## Slower Tests\n\n");
            output.push_str("| Test | Before | Now | Change |\n");
            output.push_str("|------|--------|-----|--------|\n");
            for drift in &self.performance_trends {
                output.push_str(&format!(
                    "| `{}` | {:.0}ms | {:.0}ms | +{:.1}% |\n",
                    drift.test_id,
                    drift.previous_average,
                    drift.current_average,
                    drift.percent_change
                ));
            }
        }

        output
    }

    /// Plain-text report for terminals and logs
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "TEST HEALTH DIGEST ({})\n",
            self.period.as_str().to_uppercase()
        ));
        output.push_str(&format!("Period: {} - {}\n", self.start_date, self.end_date));
        output.push_str(&format!("{}\n", self.summary));

        if self.runs_analyzed == 0 {
            return output;
        }

        if let Some(trend) = &self.pass_rate_trend {
            output.push_str(&format!(
                "Pass rate: {}% -> {}% ({:?})\n",
                trend.from, trend.to, trend.direction
            ));
        }

        if !self.new_flaky_tests.is_empty() {
            output.push_str("\nNew flaky tests:\n");
            for test in &self.new_flaky_tests {
                output.push_str(&format!(
                    "  {} ({} failing)\n",
                    test.test_id,
                    percent(test.failure_rate)
                ));
            }
        }

        if !self.recovered_tests.is_empty() {
            output.push_str("\nRecovered tests:\n");
            for test in &self.recovered_tests {
                output.push_str(&format!(
                    "  {} ({} consecutive passes)\n",
                    test.test_id, test.consecutive_passes
                ));
            }
        }

        if !self.performance_trends.is_empty() {
            output.push_str("\nSlower tests:\n");
            for drift in &self.performance_trends {
                output.push_str(&format!(
                    "  {} {:.0}ms -> {:.0}ms (+{:.1}%)\n",
                    drift.test_id,
                    drift.previous_average,
                    drift.current_average,
                    drift.percent_change
                ));
            }
        }

        output
    }
}
