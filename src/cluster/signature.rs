use regex::Regex;
use std::hash::Hasher;
use std::sync::OnceLock;

use crate::model::TestStatus;

/// Label used when no signature can be inferred
pub const UNKNOWN_ERROR: &str = "Unknown Error";

/// Candidate labels longer than this collapse to [`UNKNOWN_ERROR`]
const MAX_LABEL_LEN: usize = 50;

/// A named error signature, checked in declaration order
struct Signature {
    label: &'static str,
    pattern: Regex,
}

const SIGNATURE_PATTERNS: &[(&str, &str)] = &[
    ("TimeoutError", r"(?i)timeout|timed out"),
    ("AssertionError", r"AssertionError"),
    ("TypeError", r"TypeError"),
    ("ReferenceError", r"ReferenceError"),
    (
        "NetworkError",
        r"(?i)networkerror|net::ERR_|ECONNREFUSED|ECONNRESET|ENOTFOUND|EAI_AGAIN|socket hang up",
    ),
    (
        "ElementNotFound",
        r"(?i)element(\s+\w+)?\s+not\s+found|no\s+such\s+element|element\s+is\s+not\s+(attached|visible)",
    ),
    ("Selector", r"(?i)\bselector\b|\blocator\b"),
];

fn signatures() -> &'static [Signature] {
    static SIGNATURES: OnceLock<Vec<Signature>> = OnceLock::new();
    SIGNATURES.get_or_init(|| {
        SIGNATURE_PATTERNS
            .iter()
            .map(|&(label, pattern)| Signature {
                label,
                pattern: Regex::new(pattern).expect("built-in signature pattern is valid"),
            })
            .collect()
    })
}

fn generic_error_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Za-z0-9]*Error):").expect("generic error pattern is valid")
    })
}

fn expectation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bexpected\b|\bexpect\(").expect("expectation pattern is valid")
    })
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI pattern is valid"))
}

/// First non-empty line of the error text with terminal colour codes removed
fn first_line(error: &str) -> Option<String> {
    let clean = ansi_pattern().replace_all(error, "");
    clean
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn bounded(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_LEN {
        UNKNOWN_ERROR.to_string()
    } else {
        label.to_string()
    }
}

/// Infer an error-type label for a failed result
///
/// Checks, in order: the named signatures (timeout, assertion, type,
/// reference, network, missing element, selector), a generic `<Word>Error:`
/// prefix, an "expected" assertion heuristic and finally the first token of
/// the line. A timed-out result without error text is a `TimeoutError`;
/// any other result without error text is [`UNKNOWN_ERROR`].
///
/// # Example
/// ```
/// use vigia::cluster::infer_error_type;
/// use vigia::model::TestStatus;
///
/// let label = infer_error_type(Some("TypeError: x is undefined"), TestStatus::Failed);
/// assert_eq!(label, "TypeError");
///
/// let label = infer_error_type(Some("RangeError: bad length\n    at foo"), TestStatus::Failed);
/// assert_eq!(label, "RangeError");
/// ```
pub fn infer_error_type(error: Option<&str>, status: TestStatus) -> String {
    let Some(line) = error.and_then(first_line) else {
        return if status == TestStatus::TimedOut {
            "TimeoutError".to_string()
        } else {
            UNKNOWN_ERROR.to_string()
        };
    };

    if let Some(signature) = signatures().iter().find(|s| s.pattern.is_match(&line)) {
        return signature.label.to_string();
    }

    if let Some(captures) = generic_error_pattern().captures(&line) {
        return bounded(&captures[1]);
    }

    if expectation_pattern().is_match(&line) {
        return "AssertionError".to_string();
    }

    match line.split_whitespace().next() {
        Some(token) => {
            let token = token.trim_end_matches(':');
            if token.is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                bounded(token)
            }
        }
        None => UNKNOWN_ERROR.to_string(),
    }
}

/// Deterministic cluster id for an error-type label
///
/// 64-bit FNV-1a of the label, as 16 lower-case hex digits.
pub fn cluster_id(error_type: &str) -> String {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(error_type.as_bytes());
    format!("{:016x}", hasher.finish())
}
