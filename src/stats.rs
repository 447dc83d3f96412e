//! Numeric helpers shared by the analyzers
//!
//! Every helper returns `None` (or a neutral value) instead of NaN/Infinity
//! when there is nothing to divide by.

use crate::model::HistoryEntry;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean duration (ms) of the given entries
pub fn mean_duration<'a, I>(entries: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let durations: Vec<f64> = entries.into_iter().map(|e| e.duration as f64).collect();
    mean(&durations)
}

/// Fraction of entries that did not pass, `None` for no entries
pub fn failure_ratio<'a, I>(entries: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let mut total = 0usize;
    let mut failures = 0usize;
    for entry in entries {
        total += 1;
        if !entry.passed {
            failures += 1;
        }
    }
    if total == 0 {
        return None;
    }
    Some(failures as f64 / total as f64)
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Rounded integer percentage of `part / whole`, 0 when `whole` is 0
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}
