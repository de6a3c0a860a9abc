//! Normalized record types and privacy transforms.
//!
//! Every record posted to the metrics endpoint is one flat JSON object
//! carrying a common header (submission token, record kind, cluster name,
//! and for node-scoped kinds the login node) plus the kind-specific body.
//! Usernames and hostnames can be obfuscated before records leave the
//! host.

pub mod groups;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::collector::condor::QueueSummary;
use crate::collector::condor::parser::JobRecord;
use crate::collector::host::counters::NetworkDelta;
use crate::collector::host::disks::{DiskIoDelta, DiskSpace};

/// Common fields of every posted record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordHeader {
    pub token: String,
    pub kind: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_node: Option<String>,
}

impl RecordHeader {
    /// Header for a cluster-scoped record kind.
    pub fn new(token: &str, kind: &str, cluster: &str) -> Self {
        Self {
            token: token.to_string(),
            kind: kind.to_string(),
            cluster: cluster.to_string(),
            login_node: None,
        }
    }

    /// Header for a node-scoped record kind.
    pub fn on_node(token: &str, kind: &str, cluster: &str, login_node: &str) -> Self {
        Self {
            login_node: Some(login_node.to_string()),
            ..Self::new(token, kind, cluster)
        }
    }
}

/// CPU load record (`kind: "CPU"`).
#[derive(Debug, Clone, Serialize)]
pub struct CpuRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    /// 1-minute load average.
    pub load: f64,
}

/// Memory record (`kind: "MEM"`).
#[derive(Debug, Clone, Serialize)]
pub struct MemRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub total: u64,
    pub available: u64,
}

/// Network traffic record (`kind: "NETWORK"`).
#[derive(Debug, Clone, Serialize)]
pub struct NetworkRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub network: NetworkDelta,
}

/// Disk record (`kind: "DISK"`): space usage plus, when two samples have
/// been taken, the per-device I/O deltas flattened alongside.
#[derive(Debug, Clone, Serialize)]
pub struct DiskRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    /// Block-device name; omitted when the mount path did not resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub mount: String,
    #[serde(flatten)]
    pub space: DiskSpace,
    #[serde(flatten)]
    pub iostat: Option<DiskIoDelta>,
}

/// Batch job record (`kind: "condorjob"`).
#[derive(Debug, Clone, Serialize)]
pub struct CondorJobRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    #[serde(flatten)]
    pub job: JobRecord,
}

/// Queue summary record (`kind: "condorqueue"`).
#[derive(Debug, Clone, Serialize)]
pub struct QueueRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    #[serde(flatten)]
    pub summary: QueueSummary,
}

/// SSH session record (`kind: "ssh"`).
#[derive(Debug, Clone, Serialize)]
pub struct SshRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub ssh_user_count: usize,
    pub users: Vec<String>,
}

/// Jupyter session record (`kind: "jupyter-ml"`, `"jupyter-coffea"`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct JupyterRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub jupyter_user_count: usize,
    pub users: Vec<String>,
}

/// Obfuscates a username: first 8 hex characters of SHA-256(salt ‖ name).
///
/// The salt defends the short digest against precomputed dictionaries of
/// site usernames; the same salt must be used across invocations for the
/// hashes to stay joinable downstream.
pub fn obfuscate_user(salt: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(user.as_bytes());
    let digest = hasher.finalize();

    digest
        .iter()
        .take(4)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Obfuscates every username in place.
pub fn obfuscate_users(salt: &str, users: &mut [String]) {
    for user in users {
        *user = obfuscate_user(salt, user);
    }
}

/// Obfuscates a hostname: `atlas` plus every digit of the hostname in
/// order, under the given reporting domain. An empty domain disables
/// obfuscation and returns the hostname unchanged.
pub fn obfuscate_host(hostname: &str, domain: &str) -> String {
    if domain.is_empty() {
        return hostname.to_string();
    }

    let digits: String = hostname.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("atlas{}.{}", digits, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::condor::parser::JobState;

    #[test]
    fn obfuscated_user_is_a_short_stable_digest() {
        // SHA-256("abc") = ba7816bf...; salt and name concatenate.
        assert_eq!(obfuscate_user("a", "bc"), "ba7816bf");
        assert_eq!(obfuscate_user("", "abc"), "ba7816bf");
        // SHA-256("") = e3b0c442...
        assert_eq!(obfuscate_user("", ""), "e3b0c442");
    }

    #[test]
    fn salt_changes_the_digest() {
        assert_ne!(obfuscate_user("s1", "alice"), obfuscate_user("s2", "alice"));
        assert_eq!(obfuscate_user("s1", "alice"), obfuscate_user("s1", "alice"));
    }

    #[test]
    fn host_obfuscation_extracts_digits_in_order() {
        assert_eq!(
            obfuscate_host("login02.af.uchicago.edu", "example.org"),
            "atlas02.example.org"
        );
        assert_eq!(obfuscate_host("headnode", "example.org"), "atlas.example.org");
        // Empty domain passes the hostname through.
        assert_eq!(obfuscate_host("login02", ""), "login02");
    }

    #[test]
    fn job_record_flattens_header_and_body() {
        let record = CondorJobRecord {
            header: RecordHeader::new("tok", "condorjob", "UC-AF"),
            job: JobRecord {
                owner: "alice".to_string(),
                job_id: "184.0".to_string(),
                runtime_secs: 3600,
                state: JobState::Running,
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["token"], "tok");
        assert_eq!(value["kind"], "condorjob");
        assert_eq!(value["cluster"], "UC-AF");
        assert_eq!(value["users"], "alice");
        assert_eq!(value["jobid"], "184.0");
        assert_eq!(value["state"], "running");
        assert!(value.get("login_node").is_none());
    }

    #[test]
    fn disk_record_omits_device_and_iostat_until_known() {
        let record = DiskRecord {
            header: RecordHeader::on_node("tok", "DISK", "UC-AF", "login01"),
            device: None,
            mount: "/scratch".to_string(),
            space: DiskSpace {
                total: 100,
                used: 40,
                free: 60,
                utilization: 0.4,
            },
            iostat: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["login_node"], "login01");
        assert_eq!(value["mount"], "/scratch");
        assert_eq!(value["total"], 100);
        assert!(value.get("device").is_none());
        assert!(value.get("reads").is_none());
    }

    #[test]
    fn disk_record_flattens_iostat_when_present() {
        let record = DiskRecord {
            header: RecordHeader::on_node("tok", "DISK", "UC-AF", "login01"),
            device: Some("sda1".to_string()),
            mount: "/home".to_string(),
            space: DiskSpace {
                total: 100,
                used: 40,
                free: 60,
                utilization: 0.4,
            },
            iostat: Some(DiskIoDelta {
                reads: 5,
                cur_ios: 2,
                ..DiskIoDelta::default()
            }),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["device"], "sda1");
        assert_eq!(value["reads"], 5);
        assert_eq!(value["cur_ios"], 2);
    }
}
