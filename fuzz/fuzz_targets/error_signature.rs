#![no_main]

use libfuzzer_sys::fuzz_target;
use vigia::cluster::{cluster_id, infer_error_type, UNKNOWN_ERROR};
use vigia::model::TestStatus;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Labels are never empty and never longer than the collapse limit
        let label = infer_error_type(Some(input), TestStatus::Failed);
        assert!(!label.is_empty());
        assert!(label == UNKNOWN_ERROR || label.chars().count() <= 50);
        assert_eq!(cluster_id(&label).len(), 16);
    }
});
