//! Parsers for `/proc` and `/etc/mtab` text content.
//!
//! These are pure functions that parse file content into structured data.
//! They are designed to be easily testable with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parsed data from `/proc/loadavg`.
#[derive(Debug, Clone, Default)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// Parses `/proc/loadavg` content.
///
/// Format: `0.15 0.10 0.05 1/150 1234`
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    let load1 = parts[0]
        .parse()
        .map_err(|_| ParseError::new("invalid load1"))?;
    let load5 = parts[1]
        .parse()
        .map_err(|_| ParseError::new("invalid load5"))?;
    let load15 = parts[2]
        .parse()
        .map_err(|_| ParseError::new("invalid load15"))?;

    Ok(LoadAvg {
        load1,
        load5,
        load15,
    })
}

/// Parsed data from `/proc/meminfo`.
#[derive(Debug, Clone, Default)]
pub struct MemInfo {
    /// MemTotal in kB.
    pub total: u64,
    /// MemAvailable in kB.
    pub available: u64,
}

/// Parses `/proc/meminfo` content.
///
/// Only the fields we report are extracted.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.total = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.available = parse_kb(line);
        }
    }

    Ok(info)
}

/// Parsed per-interface counters from `/proc/net/dev`.
#[derive(Debug, Clone, Default)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, etc.)
    pub interface: String,
    /// Bytes received
    pub rx_bytes: u64,
    /// Bytes transmitted
    pub tx_bytes: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Header lines (containing `|`) are skipped. Each data line is
/// `interface: rx_bytes rx_packets ... tx_bytes tx_packets ...`.
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        // Skip header lines
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let interface = parts[0].trim().to_string();
        let values: Vec<&str> = parts[1].split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface,
            rx_bytes: get_val(0),
            tx_bytes: get_val(8),
        });
    }

    Ok(devices)
}

/// One row of `/proc/diskstats`.
///
/// All fields except `cur_ios` are monotonic counters; `cur_ios` is the
/// number of I/Os currently in flight, a gauge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiskIoSample {
    pub major: u32,
    pub minor: u32,
    pub device: String,
    pub reads: u64,
    pub rd_merged: u64,
    pub rd_sectors: u64,
    pub ms_reading: u64,
    pub writes: u64,
    pub wr_merged: u64,
    pub wr_sectors: u64,
    pub ms_writing: u64,
    pub cur_ios: u64,
    pub ms_doing_io: u64,
    pub ms_weighted: u64,
}

/// Parses `/proc/diskstats` content.
///
/// Rows with fewer than the 14 classic positional fields are skipped;
/// newer kernels append discard/flush fields, which are ignored.
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskIoSample>, ParseError> {
    let mut disks = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed lines
        }

        let major: u32 = parts.first().and_then(|s| s.parse().ok()).unwrap_or(0);
        let minor: u32 = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        disks.push(DiskIoSample {
            major,
            minor,
            device: parts[2].to_string(),
            reads: get_val(3),
            rd_merged: get_val(4),
            rd_sectors: get_val(5),
            ms_reading: get_val(6),
            writes: get_val(7),
            wr_merged: get_val(8),
            wr_sectors: get_val(9),
            ms_writing: get_val(10),
            cur_ios: get_val(11),
            ms_doing_io: get_val(12),
            ms_weighted: get_val(13),
        });
    }

    Ok(disks)
}

/// One mount-table entry from `/etc/mtab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtabEntry {
    /// Device special file, e.g. `/dev/sda1`.
    pub device: String,
    /// Mount point, e.g. `/home`.
    pub mount_point: String,
}

/// Parses `/etc/mtab` content.
///
/// Format: one mount per line, space-separated; field 0 is the device
/// special file, field 1 the mount point.
pub fn parse_mtab(content: &str) -> Vec<MtabEntry> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(device) = parts.next() else {
            continue;
        };
        let Some(mount_point) = parts.next() else {
            continue;
        };

        entries.push(MtabEntry {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
        });
    }

    entries
}
