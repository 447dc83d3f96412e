//! Vigia - test history analytics for end-to-end suites
//!
//! This library ingests per-test outcomes from a test runner, keeps a rolling
//! history of past runs and derives health signals from it: flakiness,
//! performance trends, retry reliability, a composite stability grade,
//! failure clusters, run-to-run comparison and periodic health digests.

pub mod annotate;
pub mod cli;
pub mod cluster;
pub mod comparison;
pub mod config;
pub mod digest;
pub mod flakiness;
pub mod history;
pub mod ingest;
pub mod model;
pub mod performance;
pub mod retry;
pub mod stability;
pub mod stats;
