//! Metric source backed by the running process.

use std::sync::Arc;

use mib_core::MetricSource;

use crate::stats::ServerStats;

/// USER_HZ on every mainstream Linux build, used when `sysconf` has no answer.
const DEFAULT_CLOCK_TICKS_PER_SEC: i64 = 100;

/// Answers metric queries from [`ServerStats`] and `/proc`.
///
/// Process figures fall back to zero where `/proc` is unavailable.
pub struct ProcessMetricSource {
    server_name: String,
    server_address: String,
    stats: Arc<ServerStats>,
}

impl ProcessMetricSource {
    /// Create a source reporting the given name and address.
    pub fn new(
        server_name: impl Into<String>,
        server_address: impl Into<String>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            server_address: server_address.into(),
            stats,
        }
    }

    /// The statistics this source reads.
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl MetricSource for ProcessMetricSource {
    fn server_name(&self) -> String {
        self.server_name.clone()
    }

    fn server_address(&self) -> String {
        self.server_address.clone()
    }

    fn uptime(&self) -> String {
        format!("{}s", self.stats.uptime_secs())
    }

    fn active_sessions(&self) -> i64 {
        self.stats.active_sessions()
    }

    fn used_memory(&self) -> i64 {
        procfs::read("/proc/self/status")
            .and_then(|status| procfs::kib_field(&status, "VmRSS:"))
            .map(|kib| saturating_i64(kib.saturating_mul(1024)))
            .unwrap_or(0)
    }

    fn available_memory(&self) -> i64 {
        procfs::read("/proc/meminfo")
            .and_then(|meminfo| procfs::kib_field(&meminfo, "MemAvailable:"))
            .map(|kib| saturating_i64(kib.saturating_mul(1024)))
            .unwrap_or(0)
    }

    fn cpu_time_ms(&self) -> i64 {
        procfs::read("/proc/self/stat")
            .and_then(|stat| procfs::cpu_ticks(&stat))
            .map(|ticks| saturating_i64(ticks).saturating_mul(1000) / procfs::clock_ticks_per_sec())
            .unwrap_or(0)
    }

    fn active_transactions(&self) -> i64 {
        self.stats.active_transactions()
    }

    fn committed_transactions(&self) -> i64 {
        saturating_i64(self.stats.committed_transactions())
    }

    fn rolled_back_transactions(&self) -> i64 {
        saturating_i64(self.stats.rolled_back_transactions())
    }

    fn active_threads(&self) -> i64 {
        procfs::read("/proc/self/status")
            .and_then(|status| procfs::count_field(&status, "Threads:"))
            .map(saturating_i64)
            .unwrap_or(0)
    }

    fn total_requests(&self) -> i64 {
        saturating_i64(self.stats.total_requests())
    }

    fn log(&self) -> Vec<u8> {
        self.stats.log_tail().into_bytes()
    }
}

mod procfs {
    /// Read a proc file; `None` off Linux or on any error.
    pub fn read(path: &str) -> Option<String> {
        if cfg!(target_os = "linux") {
            std::fs::read_to_string(path).ok()
        } else {
            None
        }
    }

    fn field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
        text.lines()
            .find_map(|line| line.strip_prefix(key))
            .map(str::trim)
    }

    /// Kernel clock ticks per second for `/proc/<pid>/stat` times.
    #[cfg(unix)]
    pub fn clock_ticks_per_sec() -> i64 {
        // SAFETY: sysconf only reads a configuration value.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if ticks > 0 {
            i64::from(ticks)
        } else {
            super::DEFAULT_CLOCK_TICKS_PER_SEC
        }
    }

    #[cfg(not(unix))]
    pub fn clock_ticks_per_sec() -> i64 {
        super::DEFAULT_CLOCK_TICKS_PER_SEC
    }

    /// Parse a `Key:   1234 kB` line.
    pub fn kib_field(text: &str, key: &str) -> Option<u64> {
        field(text, key)?.split_whitespace().next()?.parse().ok()
    }

    /// Parse a `Key:   12` line.
    pub fn count_field(text: &str, key: &str) -> Option<u64> {
        field(text, key)?.parse().ok()
    }

    /// User plus system ticks from `/proc/<pid>/stat`.
    ///
    /// The command name may contain spaces and parentheses, so fields are
    /// counted from the last `)`; utime and stime are fields 14 and 15.
    pub fn cpu_ticks(stat: &str) -> Option<u64> {
        let rest = &stat[stat.rfind(')')? + 1..];
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        Some(utime + stime)
    }
}
