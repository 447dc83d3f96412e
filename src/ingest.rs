//! Loading host test results
//!
//! Two input shapes are accepted for the reporter's own results: a bare JSON
//! array of results, or an object carrying them under `results`. Reports
//! produced by pytest-json-report are converted into the same shape.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{TestOutcome, TestResult, TestStatus};

/// Errors raised while reading test results
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported document shape: {0}")]
    Shape(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read host results from a file
pub fn load_results<P: AsRef<Path>>(path: P) -> Result<Vec<TestResult>> {
    let results = parse_results(&read(path.as_ref())?)?;
    tracing::debug!(path = %path.as_ref().display(), count = results.len(), "results loaded");
    Ok(results)
}

/// Parse host results from a JSON document
///
/// # Example
/// ```
/// use vigia::ingest::parse_results;
///
/// let bare = r#"[{"testId": "a", "status": "passed", "duration": 5}]"#;
/// let wrapped = r#"{"results": [{"testId": "a", "status": "passed", "duration": 5}]}"#;
/// assert_eq!(parse_results(bare).unwrap(), parse_results(wrapped).unwrap());
/// ```
pub fn parse_results(content: &str) -> Result<Vec<TestResult>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => Ok(serde_json::from_value(Value::Array(items))?),
        Value::Object(mut doc) => match doc.remove("results") {
            Some(results @ Value::Array(_)) => Ok(serde_json::from_value(results)?),
            Some(_) => Err(IngestError::Shape("`results` is not an array".to_string())),
            None => Err(IngestError::Shape("object has no `results` array".to_string())),
        },
        _ => Err(IngestError::Shape(
            "expected an array of results or an object with `results`".to_string(),
        )),
    }
}

/// A pytest-json-report converted into host results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PytestConversion {
    pub results: Vec<TestResult>,
    /// Report creation time, epoch milliseconds
    pub start_time: i64,
}

/// Read and convert a pytest-json-report file
pub fn load_pytest_report<P: AsRef<Path>>(path: P) -> Result<PytestConversion> {
    let report: Value = serde_json::from_str(&read(path.as_ref())?)?;
    if !report.is_object() {
        return Err(IngestError::Shape("pytest report is not an object".to_string()));
    }
    Ok(convert_pytest_report(&report))
}

/// Convert a parsed pytest-json-report document
///
/// # Example
/// ```
/// use serde_json::json;
/// use vigia::ingest::convert_pytest_report;
/// use vigia::model::TestStatus;
///
/// let report = json!({
///     "created": 1714557600.5,
///     "tests": [{"nodeid": "tests/test_api.py::test_login", "outcome": "passed", "duration": 0.25}]
/// });
/// let converted = convert_pytest_report(&report);
///
/// let result = &converted.results[0];
/// assert_eq!(result.file, "tests/test_api.py");
/// assert_eq!(result.title, "test_login");
/// assert_eq!(result.status, TestStatus::Passed);
/// assert_eq!(result.duration, 250);
/// assert_eq!(converted.start_time, 1714557600500);
/// ```
pub fn convert_pytest_report(report: &Value) -> PytestConversion {
    let start_time = report
        .get("created")
        .and_then(number)
        .map(|seconds| (seconds * 1000.0) as i64)
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let results: Vec<TestResult> = report
        .get("tests")
        .and_then(Value::as_array)
        .map(|tests| tests.iter().map(convert_test).collect())
        .unwrap_or_default();

    tracing::debug!(count = results.len(), "pytest report converted");
    PytestConversion {
        results,
        start_time,
    }
}

fn convert_test(test: &Value) -> TestResult {
    let nodeid = test
        .get("nodeid")
        .and_then(Value::as_str)
        .unwrap_or("unknown::test");
    let (file, title) = nodeid.split_once("::").unwrap_or(("unknown", nodeid));

    let outcome = test.get("outcome").and_then(Value::as_str);
    let tags = test
        .get("keywords")
        .and_then(Value::as_array)
        .map(|keywords| {
            keywords
                .iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    TestResult {
        test_id: nodeid.to_string(),
        title: title.to_string(),
        file: file.to_string(),
        status: pytest_status(outcome),
        duration: seconds_to_ms(test.get("duration")),
        retry: 0,
        error: extract_error(test),
        outcome: Some(pytest_outcome(outcome)),
        tags,
    }
}

/// Number or numeric string
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Seconds to whole milliseconds, truncating; invalid or missing is 0
fn seconds_to_ms(value: Option<&Value>) -> u64 {
    value
        .and_then(number)
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
        .unwrap_or(0)
}

fn pytest_status(outcome: Option<&str>) -> TestStatus {
    match outcome {
        Some("passed") => TestStatus::Passed,
        Some("skipped") => TestStatus::Skipped,
        _ => TestStatus::Failed,
    }
}

fn pytest_outcome(outcome: Option<&str>) -> TestOutcome {
    match outcome {
        Some("passed") => TestOutcome::Expected,
        Some("skipped") => TestOutcome::Skipped,
        _ => TestOutcome::Unexpected,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// First failing phase's `longrepr`, checked in call, setup, teardown order
fn extract_error(test: &Value) -> Option<String> {
    ["call", "setup", "teardown"].iter().find_map(|phase| {
        let longrepr = test.get(*phase)?.get("longrepr").filter(|v| truthy(v))?;
        Some(match longrepr {
            Value::String(text) => text.clone(),
            Value::Object(map) => match map.get("message").filter(|m| truthy(m)) {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None => longrepr.to_string(),
            },
            other => other.to_string(),
        })
    })
}
