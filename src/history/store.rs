use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{
    parse_timestamp, HistoryEntry, RunRef, RunSummary, TestHistory, TestResult, TestStatus,
};

/// Errors raised while persisting history
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to write history file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("History store has no backing file")]
    NoBackingFile,
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Rolling test history with retention
///
/// # Example
/// ```
/// use vigia::history::HistoryStore;
/// use vigia::model::{RunSummary, TestResult, TestStatus};
///
/// let mut store = HistoryStore::in_memory(2);
/// for (i, ts) in ["2024-05-01T10:00:00Z", "2024-05-02T10:00:00Z", "2024-05-03T10:00:00Z"]
///     .iter()
///     .enumerate()
/// {
///     let summary = RunSummary {
///         run_id: format!("run-{i}"),
///         timestamp: ts.to_string(),
///         total: 1, passed: 1, failed: 0, skipped: 0,
///         flaky: 0, slow: 0, duration: 10, pass_rate: 100,
///     };
///     store.append(summary, &[TestResult::new("login", TestStatus::Passed, 10)]);
/// }
///
/// assert_eq!(store.get("login").len(), 2);
/// assert_eq!(store.history().runs[0].run_id, "run-1");
/// ```
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    max_runs: usize,
    history: TestHistory,
}

impl HistoryStore {
    /// Load the store at `path`; a missing or corrupt file is an empty history
    pub fn open<P: AsRef<Path>>(path: P, max_runs: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let history = load_history(&path);
        tracing::info!(
            path = %path.display(),
            runs = history.runs.len(),
            tests = history.tests.len(),
            "history loaded"
        );
        Self {
            path: Some(path),
            max_runs: max_runs.max(1),
            history,
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory(max_runs: usize) -> Self {
        Self {
            path: None,
            max_runs: max_runs.max(1),
            history: TestHistory::default(),
        }
    }

    pub fn history(&self) -> &TestHistory {
        &self.history
    }

    /// Chronological entries for `test_id`, empty if unknown
    pub fn get(&self, test_id: &str) -> &[HistoryEntry] {
        self.history.entries(test_id)
    }

    /// Record a completed run and apply retention
    ///
    /// Writes one entry per result, stamped with the summary's run id and
    /// timestamp, plus the summary itself. Afterwards every collection is
    /// deduplicated by run id (the first occurrence wins), sorted ascending
    /// by timestamp and trimmed to the most recent `max_runs`. Test entries
    /// from runs no longer retained are dropped, as are tests left with no
    /// entries.
    pub fn append(&mut self, summary: RunSummary, results: &[TestResult]) {
        let run_id = summary.run_id.clone();
        let timestamp = summary.timestamp.clone();

        self.history.runs.push(RunRef {
            run_id: run_id.clone(),
            timestamp: timestamp.clone(),
        });
        for result in results {
            self.history
                .tests
                .entry(result.test_id.clone())
                .or_default()
                .push(HistoryEntry::from_result(result, &run_id, &timestamp));
        }
        self.history.summaries.push(summary);

        self.apply_retention();
        tracing::info!(
            run_id = %run_id,
            tests = results.len(),
            retained_runs = self.history.runs.len(),
            "run appended to history"
        );
    }

    fn apply_retention(&mut self) {
        let max = self.max_runs;
        let history = &mut self.history;

        dedup_by_run_id(&mut history.runs, |r| Some(r.run_id.as_str()));
        sort_by_timestamp(&mut history.runs, |r| r.timestamp.as_str());
        keep_last(&mut history.runs, max);

        dedup_by_run_id(&mut history.summaries, |s| Some(s.run_id.as_str()));
        sort_by_timestamp(&mut history.summaries, |s| s.timestamp.as_str());
        keep_last(&mut history.summaries, max);

        // Entries tied to a run that fell out of retention go with it
        let retained: HashSet<&str> = history.runs.iter().map(|r| r.run_id.as_str()).collect();
        for entries in history.tests.values_mut() {
            dedup_by_run_id(entries, |e| e.run_id.as_deref());
            entries.retain(|e| e.run_id.as_deref().map_or(true, |id| retained.contains(id)));
            sort_by_timestamp(entries, |e| e.timestamp.as_str());
            keep_last(entries, max);
        }
        history.tests.retain(|_, entries| !entries.is_empty());
    }

    /// Latest stored run and the per-test results it recorded
    ///
    /// Results are rebuilt from history entries carrying the run's id; the
    /// title is the test id since history does not store titles.
    pub fn baseline(&self) -> Option<(RunSummary, HashMap<String, TestResult>)> {
        let summary = self.history.latest_summary()?.clone();

        let results = self
            .history
            .tests
            .iter()
            .filter_map(|(test_id, entries)| {
                let entry = entries
                    .iter()
                    .rev()
                    .find(|e| e.run_id.as_deref() == Some(summary.run_id.as_str()))?;
                let status = if entry.is_skipped() {
                    TestStatus::Skipped
                } else if entry.passed {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                };
                let result = TestResult::new(test_id.clone(), status, entry.duration)
                    .with_retry(entry.retries());
                Some((test_id.clone(), result))
            })
            .collect();

        Some((summary, results))
    }

    /// Write the history back to its file
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the target. In-memory state is untouched on failure.
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or(HistoryError::NoBackingFile)?;
        let json = serde_json::to_string_pretty(&self.history)?;

        let write_err = |source| HistoryError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;

        tracing::debug!(path = %path.display(), "history saved");
        Ok(())
    }
}

fn load_history(path: &Path) -> TestHistory {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no history file, starting empty");
        return TestHistory::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "unreadable history, starting empty"
            );
            return TestHistory::default();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(doc)) => {
            let mut history = TestHistory {
                runs: records(doc.get("runs"), "run"),
                tests: test_records(doc.get("tests")),
                summaries: records(doc.get("summaries"), "summary"),
            };
            sort_chronologically(&mut history);
            history
        }
        Ok(_) => {
            tracing::warn!(path = %path.display(), "history is not a JSON object, starting empty");
            TestHistory::default()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "corrupt history, starting empty");
            TestHistory::default()
        }
    }
}

/// Decode each array element on its own, skipping malformed records
fn records<T: DeserializeOwned>(value: Option<&Value>, kind: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(kind, error = %err, "skipping malformed history record");
                None
            }
        })
        .collect()
}

fn test_records(value: Option<&Value>) -> BTreeMap<String, Vec<HistoryEntry>> {
    let Some(Value::Object(tests)) = value else {
        return BTreeMap::new();
    };
    tests
        .iter()
        .map(|(test_id, entries)| {
            let mut entries: Vec<HistoryEntry> = records(Some(entries), "entry");
            entries.retain(|entry| {
                let valid = entry.parsed_timestamp().is_some();
                if !valid {
                    tracing::warn!(
                        test_id = %test_id,
                        timestamp = %entry.timestamp,
                        "skipping history entry with unparsable timestamp"
                    );
                }
                valid
            });
            (test_id.clone(), entries)
        })
        .filter(|(_, entries)| !entries.is_empty())
        .collect()
}

fn sort_chronologically(history: &mut TestHistory) {
    sort_by_timestamp(&mut history.runs, |r| r.timestamp.as_str());
    sort_by_timestamp(&mut history.summaries, |s| s.timestamp.as_str());
    for entries in history.tests.values_mut() {
        sort_by_timestamp(entries, |e| e.timestamp.as_str());
    }
}

/// Stable ascending sort; unparsable timestamps sort first
fn sort_by_timestamp<T>(items: &mut [T], timestamp: impl Fn(&T) -> &str) {
    items.sort_by_cached_key(|item| parse_timestamp(timestamp(item)));
}

/// Drop later records whose run id was already seen; records without one are kept
fn dedup_by_run_id<T>(items: &mut Vec<T>, run_id: impl Fn(&T) -> Option<&str>) {
    let mut seen = HashSet::new();
    items.retain(|item| match run_id(item) {
        Some(id) => seen.insert(id.to_string()),
        None => true,
    });
}

fn keep_last<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        items.drain(..items.len() - max);
    }
}
