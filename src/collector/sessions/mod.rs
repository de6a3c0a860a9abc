//! Interactive session collection: SSH logins and Jupyter notebook pods.
//!
//! User lists come from `who` (current logins), `last` (recent logins) and
//! `kubectl` (notebook pods by label selector). Each list is deduplicated
//! preserving first-seen order before it is reported.

use tracing::debug;

use crate::collector::traits::{CommandError, CommandRunner};
use crate::util::dedup_preserving_order;

/// Error type for session collection.
#[derive(Debug)]
pub enum SessionError {
    /// The listing command failed to launch or exited non-zero.
    Query(CommandError),
    /// The listing ran but its output could not be interpreted.
    Parse(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Query(e) => write!(f, "session query failed: {}", e),
            SessionError::Parse(msg) => write!(f, "session output error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CommandError> for SessionError {
    fn from(e: CommandError) -> Self {
        SessionError::Query(e)
    }
}

/// Collects interactive session users through external listing commands.
pub struct SessionCollector<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> SessionCollector<R> {
    /// Creates a new session collector.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Lists users with a live login session (`who`), deduplicated.
    pub fn ssh_users(&self) -> Result<Vec<String>, SessionError> {
        let stdout = self.runner.run("who", &[])?;
        Ok(parse_who(&stdout))
    }

    /// Lists users who logged in during the last five minutes (`last -s`),
    /// deduplicated. Requires a `last` new enough to support `-s`.
    pub fn ssh_history(&self) -> Result<Vec<String>, SessionError> {
        let stdout = self.runner.run("last", &["-s", "-5min"])?;
        Ok(parse_last(&stdout))
    }

    /// Lists owners of Jupyter notebook pods in `namespace`, selected and
    /// keyed by `label`, deduplicated.
    pub fn jupyter_users(&self, namespace: &str, label: &str) -> Result<Vec<String>, SessionError> {
        let stdout = self.runner.run(
            "kubectl",
            &["-n", namespace, "get", "pods", "-l", label, "-o", "json"],
        )?;
        let users = parse_pod_owners(&stdout, label)?;
        debug!("{} notebook users in namespace {}", users.len(), namespace);
        Ok(users)
    }
}

/// Extracts usernames from `who` output (first column per line).
fn parse_who(content: &str) -> Vec<String> {
    dedup_preserving_order(
        content
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|user| user.to_string()),
    )
}

/// Extracts usernames from `last` output.
///
/// The trailer (`wtmp begins ...`) and the `reboot`/`shutdown` pseudo-users
/// are skipped.
fn parse_last(content: &str) -> Vec<String> {
    dedup_preserving_order(
        content
            .lines()
            .filter(|line| !line.starts_with("wtmp begins") && !line.starts_with("btmp begins"))
            .filter_map(|line| line.split_whitespace().next())
            .filter(|user| *user != "reboot" && *user != "shutdown")
            .map(|user| user.to_string()),
    )
}

/// Extracts the `label` value from each pod's metadata labels in a
/// `kubectl get pods -o json` listing.
fn parse_pod_owners(content: &str, label: &str) -> Result<Vec<String>, SessionError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| SessionError::Parse(format!("invalid pod listing JSON: {}", e)))?;

    let items = value
        .get("items")
        .and_then(|items| items.as_array())
        .ok_or_else(|| SessionError::Parse("pod listing has no items array".to_string()))?;

    Ok(dedup_preserving_order(items.iter().filter_map(|item| {
        item.pointer("/metadata/labels")
            .and_then(|labels| labels.get(label))
            .and_then(|owner| owner.as_str())
            .map(|owner| owner.to_string())
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;

    #[test]
    fn who_users_are_deduplicated_in_order() {
        let mut runner = MockRunner::new();
        runner.expect(
            "who",
            "\
alice    pts/0        2026-08-07 09:15 (10.0.0.1)
bob      pts/1        2026-08-07 09:20 (10.0.0.2)
alice    pts/2        2026-08-07 10:01 (10.0.0.1)
",
        );
        let collector = SessionCollector::new(runner);

        let users = collector.ssh_users().unwrap();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn last_skips_pseudo_users_and_trailer() {
        let mut runner = MockRunner::new();
        runner.expect(
            "last",
            "\
carol    pts/0        10.0.0.3         Thu Aug  7 09:40   still logged in
reboot   system boot  6.8.0            Thu Aug  7 08:00   still running
carol    pts/1        10.0.0.3         Thu Aug  7 09:35 - 09:39  (00:04)

wtmp begins Tue Aug  5 00:00:01 2026
",
        );
        let collector = SessionCollector::new(runner);

        let users = collector.ssh_history().unwrap();
        assert_eq!(users, vec!["carol".to_string()]);
    }

    #[test]
    fn jupyter_users_come_from_pod_labels() {
        let listing = r#"{
            "items": [
                {"metadata": {"labels": {"owner": "alice", "app": "jupyter"}}},
                {"metadata": {"labels": {"owner": "bob"}}},
                {"metadata": {"labels": {"app": "jupyter"}}},
                {"metadata": {"labels": {"owner": "alice"}}}
            ]
        }"#;
        let mut runner = MockRunner::new();
        runner.expect("kubectl", listing);
        let collector = SessionCollector::new(runner);

        let users = collector.jupyter_users("af-jupyter", "owner").unwrap();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);

        let calls = collector.runner.calls();
        assert!(calls[0].contains("-n af-jupyter"));
        assert!(calls[0].contains("-l owner"));
    }

    #[test]
    fn malformed_pod_listing_is_a_parse_error() {
        let mut runner = MockRunner::new();
        runner.expect("kubectl", "not json");
        let collector = SessionCollector::new(runner);

        assert!(matches!(
            collector.jupyter_users("ns", "owner").unwrap_err(),
            SessionError::Parse(_)
        ));
    }

    #[test]
    fn failed_listing_is_an_error() {
        let mut runner = MockRunner::new();
        runner.expect_failure("who", 1);
        let collector = SessionCollector::new(runner);

        assert!(matches!(
            collector.ssh_users().unwrap_err(),
            SessionError::Query(_)
        ));
    }
}
