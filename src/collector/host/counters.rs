//! Persisted network-counter state and delta computation.
//!
//! The kernel reports network traffic as monotonic totals, so turning them
//! into "bytes during the last interval" needs the previous sample. This
//! module persists that sample across collector invocations in a small JSON
//! state file and computes the delta against it on the next run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collector::traits::FileSystem;

/// Default staleness window: a previous sample older than this is discarded
/// and the baseline resets to the current counters.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Current monotonic network totals, summed across interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetCounters {
    pub sent: u64,
    pub received: u64,
}

/// The persisted snapshot: counters as of the last sample.
///
/// Serialized as `{"sent": <int>, "received": <int>, "timestamp": <int>}`
/// with the timestamp in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub sent: u64,
    pub received: u64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

/// Computed traffic during the interval between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkDelta {
    pub sent: u64,
    pub received: u64,
    /// Interval length in seconds.
    pub interval: f64,
}

/// Stateful store for network counter snapshots.
///
/// Every [`CounterStore::delta_at`] call is both a read and a write: the
/// delta is computed against the persisted snapshot, and the current
/// counters are persisted as the new snapshot. The snapshot file is the only
/// cross-invocation state; a missing or corrupt file is a cold start, never
/// an error.
///
/// The write is atomic (write-temp, then rename), so a crashed collector
/// cannot leave a torn file behind. Concurrent collector instances on one
/// host still race on the file; deployments assume a single periodic
/// invocation per host.
pub struct CounterStore<F: FileSystem> {
    fs: F,
    path: PathBuf,
    max_age: Duration,
}

impl<F: FileSystem> CounterStore<F> {
    /// Creates a store persisting to `path` with the given staleness window.
    pub fn new(fs: F, path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            fs,
            path: path.into(),
            max_age,
        }
    }

    /// Loads the previously persisted snapshot.
    ///
    /// Returns `None` if the file is absent or malformed (cold start).
    pub fn load(&self) -> Option<CounterSnapshot> {
        let content = match self.fs.read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no previous counter snapshot at {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(
                    "corrupt counter snapshot at {:?}, treating as cold start: {}",
                    self.path, e
                );
                None
            }
        }
    }

    /// Computes the delta between `current` and the persisted snapshot,
    /// then persists `current` as the new snapshot.
    ///
    /// On a cold start, or when the previous snapshot is older than the
    /// configured staleness window, the baseline resets to `current` and a
    /// zero delta with zero interval is returned instead of a spurious
    /// whole-uptime delta.
    ///
    /// Counter resets (reboot, counter wrap) show up as `current < previous`;
    /// the delta is then clamped to the raw current value, never negative.
    pub fn delta_at(&self, current: NetCounters, now_ms: i64) -> NetworkDelta {
        let prev = self.load().filter(|snapshot| {
            let age_ms = now_ms.saturating_sub(snapshot.timestamp_ms);
            if age_ms >= self.max_age.as_millis() as i64 {
                debug!(
                    "counter snapshot is {}s old (max {}s), resetting baseline",
                    age_ms / 1000,
                    self.max_age.as_secs()
                );
                return false;
            }
            true
        });

        let delta = match prev {
            Some(prev) => NetworkDelta {
                sent: clamped_delta(current.sent, prev.sent),
                received: clamped_delta(current.received, prev.received),
                interval: (now_ms - prev.timestamp_ms) as f64 / 1000.0,
            },
            None => NetworkDelta {
                sent: 0,
                received: 0,
                interval: 0.0,
            },
        };

        self.persist(current, now_ms);
        delta
    }

    /// Writes `current` as the new snapshot. Failures are logged, not
    /// propagated: the delta already computed is still valid and a missed
    /// persist only widens the next interval.
    fn persist(&self, current: NetCounters, now_ms: i64) {
        let snapshot = CounterSnapshot {
            sent: current.sent,
            received: current.received,
            timestamp_ms: now_ms,
        };

        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize counter snapshot: {}", e);
                return;
            }
        };

        if let Err(e) = self.fs.write_atomic(&self.path, &json) {
            warn!("failed to persist counter snapshot to {:?}: {}", self.path, e);
        }
    }
}

/// Monotonic counter delta with reset clamping: a regression means the
/// counter restarted from zero, so the raw current value is the best
/// estimate of activity since then.
fn clamped_delta(current: u64, previous: u64) -> u64 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    const STATE: &str = "/run/afmon.json";

    fn store(fs: MockFs) -> CounterStore<MockFs> {
        CounterStore::new(fs, STATE, DEFAULT_MAX_AGE)
    }

    #[test]
    fn cold_start_returns_zero_delta_and_persists() {
        let store = store(MockFs::new());

        let delta = store.delta_at(
            NetCounters {
                sent: 1000,
                received: 2000,
            },
            50_000,
        );

        assert_eq!(delta.sent, 0);
        assert_eq!(delta.received, 0);
        assert_eq!(delta.interval, 0.0);

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.sent, 1000);
        assert_eq!(snapshot.received, 2000);
        assert_eq!(snapshot.timestamp_ms, 50_000);
    }

    #[test]
    fn successive_samples_yield_counter_difference() {
        let store = store(MockFs::new());

        store.delta_at(
            NetCounters {
                sent: 1000,
                received: 2000,
            },
            50_000,
        );
        let delta = store.delta_at(
            NetCounters {
                sent: 1500,
                received: 2100,
            },
            60_000,
        );

        assert_eq!(delta.sent, 500);
        assert_eq!(delta.received, 100);
        assert!((delta.interval - 10.0).abs() < 1e-9);
    }

    #[test]
    fn counter_reset_clamps_to_current_value() {
        let store = store(MockFs::new());

        store.delta_at(
            NetCounters {
                sent: 9000,
                received: 9000,
            },
            50_000,
        );
        // Reboot: counters restarted from zero.
        let delta = store.delta_at(
            NetCounters {
                sent: 300,
                received: 9500,
            },
            60_000,
        );

        assert_eq!(delta.sent, 300);
        assert_eq!(delta.received, 500);
    }

    #[test]
    fn stale_snapshot_resets_baseline() {
        let store = store(MockFs::new());

        store.delta_at(
            NetCounters {
                sent: 1000,
                received: 1000,
            },
            0,
        );
        // Two hours later: previous snapshot exceeds the 1h window.
        let delta = store.delta_at(
            NetCounters {
                sent: 999_000,
                received: 999_000,
            },
            7_200_000,
        );

        assert_eq!(delta.sent, 0);
        assert_eq!(delta.received, 0);
        assert_eq!(delta.interval, 0.0);

        // An immediately repeated call works off the fresh baseline.
        let delta = store.delta_at(
            NetCounters {
                sent: 999_010,
                received: 999_000,
            },
            7_205_000,
        );
        assert_eq!(delta.sent, 10);
        assert!((delta.interval - 5.0).abs() < 1e-9);
    }

    #[test]
    fn corrupt_state_file_is_cold_start() {
        let mut fs = MockFs::new();
        fs.add_file(STATE, "not json at all");
        let store = store(fs);

        assert!(store.load().is_none());

        let delta = store.delta_at(
            NetCounters {
                sent: 42,
                received: 7,
            },
            1_000,
        );
        assert_eq!(delta.sent, 0);
        assert_eq!(store.load().unwrap().sent, 42);
    }

    #[test]
    fn persisted_snapshot_round_trips_bit_identical() {
        let store = store(MockFs::new());

        let current = NetCounters {
            sent: u64::MAX,
            received: 0,
        };
        store.delta_at(current, 1_234_567_890_123);

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.sent, u64::MAX);
        assert_eq!(snapshot.received, 0);
        assert_eq!(snapshot.timestamp_ms, 1_234_567_890_123);
    }

    #[test]
    fn persisted_file_uses_wire_field_names() {
        let store = CounterStore::new(MockFs::new(), STATE, DEFAULT_MAX_AGE);

        store.delta_at(
            NetCounters {
                sent: 1,
                received: 2,
            },
            3,
        );

        let raw = store.fs.contents(STATE).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["sent"], 1);
        assert_eq!(value["received"], 2);
        assert_eq!(value["timestamp"], 3);
    }
}
