//! Server statistics fed by the embedding application.
//!
//! Counters are lock-free; only the log tail takes a lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Default number of log lines kept.
pub const DEFAULT_LOG_CAPACITY: usize = 64;

/// Live counters for sessions, transactions, and requests.
pub struct ServerStats {
    /// Server start time.
    started_at: Instant,

    // Session metrics
    active_sessions: AtomicI64,

    // Transaction metrics
    active_transactions: AtomicI64,
    committed_transactions: AtomicU64,
    rolled_back_transactions: AtomicU64,

    // Request metrics
    total_requests: AtomicU64,

    log_tail: Mutex<VecDeque<String>>,
    log_capacity: usize,
}

impl ServerStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Create empty statistics keeping at most `capacity` log lines.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            started_at: Instant::now(),
            active_sessions: AtomicI64::new(0),
            active_transactions: AtomicI64::new(0),
            committed_transactions: AtomicU64::new(0),
            rolled_back_transactions: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            log_tail: Mutex::new(VecDeque::with_capacity(capacity)),
            log_capacity: capacity.max(1),
        }
    }

    /// Record a session being opened.
    pub fn record_session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session being closed.
    pub fn record_session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a transaction starting.
    pub fn record_transaction_begin(&self) {
        self.active_transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transaction commit.
    pub fn record_commit(&self) {
        self.active_transactions.fetch_sub(1, Ordering::Relaxed);
        self.committed_transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transaction rollback.
    pub fn record_rollback(&self) {
        self.active_transactions.fetch_sub(1, Ordering::Relaxed);
        self.rolled_back_transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a served request.
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Append a log line, evicting the oldest when full.
    pub fn record_log(&self, line: impl Into<String>) {
        let mut tail = self.log_tail.lock();
        if tail.len() == self.log_capacity {
            tail.pop_front();
        }
        tail.push_back(line.into());
    }

    // Getters

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Get open sessions.
    pub fn active_sessions(&self) -> i64 {
        self.active_sessions.load(Ordering::Relaxed).max(0)
    }

    /// Get in-flight transactions.
    pub fn active_transactions(&self) -> i64 {
        self.active_transactions.load(Ordering::Relaxed).max(0)
    }

    /// Get committed transaction count.
    pub fn committed_transactions(&self) -> u64 {
        self.committed_transactions.load(Ordering::Relaxed)
    }

    /// Get rolled-back transaction count.
    pub fn rolled_back_transactions(&self) -> u64 {
        self.rolled_back_transactions.load(Ordering::Relaxed)
    }

    /// Get total request count.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Recent log lines joined by newlines, oldest first.
    pub fn log_tail(&self) -> String {
        let tail = self.log_tail.lock();
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// Reset all counters and the log tail (for testing).
    pub fn reset(&self) {
        self.active_sessions.store(0, Ordering::Relaxed);
        self.active_transactions.store(0, Ordering::Relaxed);
        self.committed_transactions.store(0, Ordering::Relaxed);
        self.rolled_back_transactions.store(0, Ordering::Relaxed);
        self.total_requests.store(0, Ordering::Relaxed);
        self.log_tail.lock().clear();
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared statistics handle.
pub type SharedServerStats = Arc<ServerStats>;

/// Create new shared statistics.
pub fn new_shared_stats() -> SharedServerStats {
    Arc::new(ServerStats::new())
}
