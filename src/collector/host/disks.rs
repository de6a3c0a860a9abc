//! Mount-point to block-device resolution and per-device I/O deltas.
//!
//! Configured mount paths are resolved to kernel block-device names through
//! the mount table; each collection cycle then matches `/proc/diskstats`
//! rows to those devices and computes per-counter differences against the
//! previous cycle. Filesystem-space queries go straight to statvfs and are
//! independent of the counter logic.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::collector::host::parser::{DiskIoSample, parse_diskstats, parse_mtab};
use crate::collector::traits::FileSystem;

/// Per-device I/O activity between two successive samples.
///
/// All fields are signed differences of the corresponding diskstats
/// counters, except `cur_ios`, which is an instantaneous gauge copied from
/// the newer sample as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiskIoDelta {
    pub reads: i64,
    pub rd_mrg: i64,
    pub rd_sectors: i64,
    pub ms_reading: i64,
    pub writes: i64,
    pub wr_mrg: i64,
    pub wr_sectors: i64,
    pub ms_writing: i64,
    pub cur_ios: u64,
    pub ms_doing_io: i64,
    pub ms_weighted: i64,
}

/// Filesystem-space usage for one mount point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskSpace {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub utilization: f64,
}

/// One configured mount point, resolved to its block device.
#[derive(Debug, Clone)]
pub struct DiskDevice {
    /// Configured mount path, e.g. `/home`.
    pub path: String,
    /// Kernel block-device name, e.g. `sda1`. Empty if the path is not in
    /// the mount table (unmounted is "no device", not an error).
    pub device: String,
    /// Previous diskstats row for this device, if sampled before.
    prev: Option<DiskIoSample>,
    /// Deltas computed on the most recent sampling cycle. `None` until the
    /// device has been seen in two successive cycles.
    pub delta: Option<DiskIoDelta>,
}

/// Mount table consulted for device resolution.
const MTAB_PATH: &str = "/etc/mtab";

/// Registry of configured mounts with per-device delta state.
pub struct DiskRegistry<F: FileSystem> {
    fs: F,
    proc_path: String,
    disks: Vec<DiskDevice>,
}

impl<F: FileSystem> DiskRegistry<F> {
    /// Creates a registry for the given mount paths, resolving each against
    /// the mount table.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to the proc filesystem (usually "/proc")
    /// * `mounts` - Mount paths to track, e.g. `["/home", "/data"]`
    pub fn new(fs: F, proc_path: impl Into<String>, mounts: &[String]) -> Self {
        let mut registry = Self {
            fs,
            proc_path: proc_path.into(),
            disks: mounts
                .iter()
                .map(|path| DiskDevice {
                    path: path.clone(),
                    device: String::new(),
                    prev: None,
                    delta: None,
                })
                .collect(),
        };
        registry.resolve_devices();
        registry
    }

    /// Returns the tracked devices.
    pub fn disks(&self) -> &[DiskDevice] {
        &self.disks
    }

    /// Resolves each configured mount path to a device name by exact
    /// mount-point match. Unresolvable paths keep an empty device name.
    fn resolve_devices(&mut self) {
        let content = match self.fs.read_to_string(Path::new(MTAB_PATH)) {
            Ok(content) => content,
            Err(e) => {
                debug!("cannot read mount table {}: {}", MTAB_PATH, e);
                return;
            }
        };

        let entries = parse_mtab(&content);
        for disk in &mut self.disks {
            disk.device = entries
                .iter()
                .find(|entry| entry.mount_point == disk.path)
                .map(|entry| entry.device.trim_start_matches("/dev/").to_string())
                .unwrap_or_default();
        }
    }

    /// Samples `{proc}/diskstats` and updates per-device deltas.
    ///
    /// A device seen for the first time gets its row stored and its delta
    /// left unset; from the second cycle on, every counter field is the
    /// difference against the previous cycle and `cur_ios` is copied.
    pub fn sample_all(&mut self) {
        let path = format!("{}/diskstats", self.proc_path);
        let content = match self.fs.read_to_string(Path::new(&path)) {
            Ok(content) => content,
            Err(e) => {
                debug!("cannot read {}: {}", path, e);
                return;
            }
        };

        let rows = match parse_diskstats(&content) {
            Ok(rows) => rows,
            Err(e) => {
                debug!("cannot parse {}: {}", path, e);
                return;
            }
        };

        for disk in &mut self.disks {
            if disk.device.is_empty() {
                continue;
            }
            let Some(row) = rows.iter().find(|row| row.device == disk.device) else {
                continue;
            };

            if let Some(prev) = &disk.prev {
                disk.delta = Some(compute_delta(prev, row));
            }
            disk.prev = Some(row.clone());
        }
    }
}

/// Queries filesystem-space usage for `path` via statvfs.
///
/// This is a direct kernel query, independent of the delta state.
pub fn utilization(path: &str) -> std::io::Result<DiskSpace> {
    let stats = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::from)?;

    let frsize = stats.fragment_size() as u64;
    let total = stats.blocks() as u64 * frsize;
    let free = stats.blocks_available() as u64 * frsize;
    let used = total.saturating_sub(stats.blocks_free() as u64 * frsize);

    Ok(DiskSpace {
        total,
        used,
        free,
        utilization: if total > 0 {
            used as f64 / total as f64
        } else {
            0.0
        },
    })
}

/// Signed per-field difference between two diskstats rows; `cur_ios` is a
/// gauge and is copied from the current row.
fn compute_delta(prev: &DiskIoSample, current: &DiskIoSample) -> DiskIoDelta {
    let d = |curr: u64, prev: u64| -> i64 { curr as i64 - prev as i64 };

    DiskIoDelta {
        reads: d(current.reads, prev.reads),
        rd_mrg: d(current.rd_merged, prev.rd_merged),
        rd_sectors: d(current.rd_sectors, prev.rd_sectors),
        ms_reading: d(current.ms_reading, prev.ms_reading),
        writes: d(current.writes, prev.writes),
        wr_mrg: d(current.wr_merged, prev.wr_merged),
        wr_sectors: d(current.wr_sectors, prev.wr_sectors),
        ms_writing: d(current.ms_writing, prev.ms_writing),
        cur_ios: current.cur_ios,
        ms_doing_io: d(current.ms_doing_io, prev.ms_doing_io),
        ms_weighted: d(current.ms_weighted, prev.ms_weighted),
    }
}
