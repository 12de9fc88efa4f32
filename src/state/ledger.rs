use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Attempt counts for requests currently being retried.
///
/// Keyed by a per-call ticket from [`ticket`](Self::ticket), so two identical
/// requests in flight at once keep separate counts. An entry exists only
/// between a call's first retryable failure and its final outcome.
#[derive(Debug, Default)]
pub struct RetryLedger {
    attempts: Mutex<HashMap<String, u32>>,
    sequence: AtomicU64,
}

impl RetryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for one call of the request with the given identity.
    pub fn ticket(&self, identity: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{identity}#{seq}")
    }

    /// Record a retryable failure for `key`.
    ///
    /// Returns the number of the retry about to be made (1-based) while the
    /// count is below `ceiling`. At the ceiling the entry is removed and `None`
    /// is returned.
    pub fn begin_retry(&self, key: &str, ceiling: u32) -> Option<u32> {
        let mut attempts = self.attempts.lock();
        let count = attempts.entry(key.to_string()).or_insert(0);
        if *count < ceiling {
            *count += 1;
            Some(*count)
        } else {
            attempts.remove(key);
            None
        }
    }

    /// Drop the entry for `key`.
    pub fn clear(&self, key: &str) {
        self.attempts.lock().remove(key);
    }

    /// Retries recorded so far for `key`.
    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of requests currently being retried.
    pub fn len(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Whether no request is being retried.
    pub fn is_empty(&self) -> bool {
        self.attempts.lock().is_empty()
    }
}
