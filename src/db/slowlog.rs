//! Slow operation log.
//!
//! Operations over the threshold are logged with a truncated statement and
//! kept in a bounded ring buffer. Only slow operations take the mutex.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::config::SlowQueryConfig;
use crate::observability::metrics;

/// One slow operation.
#[derive(Debug, Clone, Serialize)]
pub struct SlowQueryEntry {
    pub id: u64,
    pub timestamp: SystemTime,
    pub duration: Duration,
    /// `query`, `exec`, `batch`, ...
    pub op: &'static str,
    /// Node that served the operation.
    pub target: String,
    /// Statement text cut to `max_statement_len` characters.
    pub statement: String,
}

#[derive(Debug)]
pub struct SlowLog {
    threshold: Duration,
    max_statement_len: usize,
    max_entries: usize,
    inner: Mutex<SlowLogInner>,
}

#[derive(Debug)]
struct SlowLogInner {
    entries: VecDeque<SlowQueryEntry>,
    next_id: u64,
}

impl SlowLog {
    pub fn new(config: &SlowQueryConfig) -> Self {
        Self {
            threshold: Duration::from_millis(config.threshold_ms),
            max_statement_len: config.max_statement_len,
            max_entries: config.max_entries,
            inner: Mutex::new(SlowLogInner {
                entries: VecDeque::with_capacity(config.max_entries.min(1024)),
                next_id: 0,
            }),
        }
    }

    pub fn truncate(&self, statement: &str) -> String {
        truncate_statement(statement, self.max_statement_len)
    }

    /// Record the operation if it exceeded the threshold. Returns true if it did.
    pub fn observe(&self, op: &'static str, target: &str, statement: &str, elapsed: Duration) -> bool {
        if elapsed <= self.threshold {
            return false;
        }

        let statement = self.truncate(statement);
        tracing::warn!(
            op,
            target = %target,
            elapsed_ms = elapsed.as_millis() as u64,
            statement = %statement,
            "Slow query"
        );
        metrics::record_slow_query(op);

        if self.max_entries == 0 {
            return true;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        if inner.entries.len() >= self.max_entries {
            inner.entries.pop_front();
        }
        inner.entries.push_back(SlowQueryEntry {
            id,
            timestamp: SystemTime::now(),
            duration: elapsed,
            op,
            target: target.to_string(),
            statement,
        });
        true
    }

    /// Retained entries, newest first.
    pub fn entries(&self) -> Vec<SlowQueryEntry> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.iter().rev().cloned().collect()
    }
}

/// Cut `statement` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_statement(statement: &str, max_chars: usize) -> String {
    match statement.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &statement[..byte_index]),
        None => statement.to_string(),
    }
}
