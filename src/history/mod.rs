// History Store: durable per-test outcome history with rolling retention
//
// The store owns one TestHistory document. It is loaded once at run start,
// queried per test while annotating, appended to at run completion and
// written back. A missing or unreadable document is an empty history.
//
// Single writer only; callers serialize access to one history file.

mod store;

pub use store::{HistoryError, HistoryStore, Result};

#[cfg(test)]
mod tests;
