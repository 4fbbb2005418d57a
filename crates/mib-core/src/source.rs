//! Metric source contract.

/// Supplies current values for every well-known metric.
///
/// Implementations must not fail: on an internal error return a best-effort
/// value (empty text, zero) instead.
pub trait MetricSource: Send + Sync {
    /// Server name.
    fn server_name(&self) -> String;

    /// Server address.
    fn server_address(&self) -> String;

    /// Human-readable uptime, e.g. `"120s"`.
    fn uptime(&self) -> String;

    /// Currently open sessions.
    fn active_sessions(&self) -> i64;

    /// Memory in use, in bytes.
    fn used_memory(&self) -> i64;

    /// Memory still available, in bytes.
    fn available_memory(&self) -> i64;

    /// Consumed CPU time, in milliseconds.
    fn cpu_time_ms(&self) -> i64;

    /// Transactions currently in flight.
    fn active_transactions(&self) -> i64;

    /// Transactions committed since start.
    fn committed_transactions(&self) -> i64;

    /// Transactions rolled back since start.
    fn rolled_back_transactions(&self) -> i64;

    /// Live worker threads.
    fn active_threads(&self) -> i64;

    /// Requests served since start.
    fn total_requests(&self) -> i64;

    /// Recent server log output.
    fn log(&self) -> Vec<u8>;
}
