//! Host resource collection: CPU load, memory, network and disks.
//!
//! `HostCollector` reads the instantaneous `/proc` values; the stateful
//! pieces live next to it — [`counters::CounterStore`] turns monotonic
//! network totals into per-interval deltas using a snapshot persisted
//! across invocations, and [`disks::DiskRegistry`] tracks per-device I/O
//! counter deltas for the configured mount points.

pub mod counters;
pub mod disks;
pub mod parser;

use std::path::Path;

use crate::collector::host::counters::NetCounters;
use crate::collector::host::parser::{LoadAvg, MemInfo, parse_loadavg, parse_meminfo, parse_net_dev};
use crate::collector::traits::FileSystem;

/// Error type for host collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading proc files.
    Io(std::io::Error),
    /// Parse error in proc file content.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Collects system-wide metrics from `/proc`.
pub struct HostCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> HostCollector<F> {
    /// Creates a new host collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Collects load averages from `{proc}/loadavg`.
    pub fn load(&self) -> Result<LoadAvg, CollectError> {
        let path = format!("{}/loadavg", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        parse_loadavg(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Collects memory totals from `{proc}/meminfo`.
    pub fn memory(&self) -> Result<MemInfo, CollectError> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Collects network totals from `{proc}/net/dev`, summed across all
    /// interfaces. The sums are monotonic counters; feed them through a
    /// [`counters::CounterStore`] to obtain per-interval deltas.
    pub fn net_counters(&self) -> Result<NetCounters, CollectError> {
        let path = format!("{}/net/dev", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let devices = parse_net_dev(&content).map_err(|e| CollectError::Parse(e.message))?;

        Ok(NetCounters {
            sent: devices.iter().map(|d| d.tx_bytes).sum(),
            received: devices.iter().map(|d| d.rx_bytes).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    fn host_fs() -> MockFs {
        let mut fs = MockFs::new();
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16384000 kB\nMemFree:         8192000 kB\nMemAvailable:   12000000 kB\n",
        );
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000     10    0    0    0     0          0         0  1000     10    0    0    0     0       0          0
  eth0: 2000     20    0    0    0     0          0         0  3000     30    0    0    0     0       0          0
",
        );
        fs
    }

    #[test]
    fn collects_load_and_memory() {
        let collector = HostCollector::new(host_fs(), "/proc");

        let load = collector.load().unwrap();
        assert!((load.load1 - 0.15).abs() < 1e-9);

        let mem = collector.memory().unwrap();
        assert_eq!(mem.total, 16384000);
        assert_eq!(mem.available, 12000000);
    }

    #[test]
    fn network_counters_sum_all_interfaces() {
        let collector = HostCollector::new(host_fs(), "/proc");

        let counters = collector.net_counters().unwrap();
        assert_eq!(counters.received, 3000);
        assert_eq!(counters.sent, 4000);
    }

    #[test]
    fn missing_proc_file_is_an_io_error() {
        let collector = HostCollector::new(MockFs::new(), "/proc");
        assert!(matches!(
            collector.load().unwrap_err(),
            CollectError::Io(_)
        ));
    }
}
