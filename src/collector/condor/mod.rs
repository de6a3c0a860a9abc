//! Batch-scheduler (HTCondor) job and queue collection.
//!
//! Job listings come from `condor_q` / `condor_history` invoked with an
//! explicit field template; queue summaries come from the JSON totals mode
//! of `condor_q`. All invocations go through the [`CommandRunner`]
//! abstraction so tests can script scheduler output.

pub mod parser;

use serde::Serialize;
use tracing::debug;

use crate::collector::traits::{CommandError, CommandRunner};
use parser::{JobRecord, JobState, parse_job_listing, parse_queue_totals};

/// Error type for scheduler collection.
#[derive(Debug)]
pub enum CondorError {
    /// The query command failed to launch or exited non-zero.
    Query(CommandError),
    /// The query ran but its output could not be interpreted.
    Parse(String),
}

impl std::fmt::Display for CondorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CondorError::Query(e) => write!(f, "scheduler query failed: {}", e),
            CondorError::Parse(msg) => write!(f, "scheduler output error: {}", msg),
        }
    }
}

impl std::error::Error for CondorError {}

impl From<CommandError> for CondorError {
    fn from(e: CommandError) -> Self {
        CondorError::Query(e)
    }
}

/// One configured queue: a display name plus the scheduler constraint
/// expression selecting its jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub constraint: String,
}

/// Aggregate counts for one configured queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    #[serde(rename = "queue")]
    pub name: String,
    pub idle: i64,
    pub running: i64,
    pub held: i64,
}

/// Collects job records and queue summaries from the batch scheduler.
pub struct CondorCollector<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> CondorCollector<R> {
    /// Creates a new scheduler collector.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Queries currently queued/running jobs.
    ///
    /// The excluded service account is pushed into the query constraint so
    /// its jobs never leave the scheduler; this is a policy decision, not a
    /// performance one.
    pub fn active_jobs(&self, exclude_owner: &str) -> Result<Vec<JobRecord>, CondorError> {
        let constraint = format!("Owner =!= \"{}\"", exclude_owner);
        let args = [
            "-allusers",
            "-nobatch",
            "-constraint",
            constraint.as_str(),
            "-af",
            "Owner",
            "ClusterId",
            "ProcId",
            "RemoteWallClockTime",
            "JobStatus",
        ];

        let stdout = self.runner.run("condor_q", &args)?;
        debug!("condor_q returned {} bytes", stdout.len());
        Ok(parse_job_listing(&stdout, None))
    }

    /// Queries jobs that reached `status_code` after `completed_after`
    /// (epoch seconds).
    ///
    /// The status equality and completion-time lower bound are both part of
    /// the query; every returned record carries the state the status code
    /// maps to.
    pub fn history_jobs(
        &self,
        status_code: i64,
        completed_after: i64,
        exclude_owner: &str,
    ) -> Result<Vec<JobRecord>, CondorError> {
        let constraint = format!(
            "Owner =!= \"{}\" && JobStatus == {}",
            exclude_owner, status_code
        );
        let since = completed_after.to_string();
        let args = [
            "-constraint",
            constraint.as_str(),
            "-completedsince",
            since.as_str(),
            "-af",
            "Owner",
            "ClusterId",
            "ProcId",
            "RemoteWallClockTime",
        ];

        let stdout = self.runner.run("condor_history", &args)?;
        debug!("condor_history returned {} bytes", stdout.len());
        Ok(parse_job_listing(
            &stdout,
            Some(JobState::from_code(status_code)),
        ))
    }

    /// Runs one JSON totals query per configured queue, in order, and
    /// relabels the aggregate counts under each queue's name.
    ///
    /// Output preserves input order and length. The first failing queue
    /// aborts the whole batch: a summary that silently skipped a queue
    /// would be indistinguishable from an empty queue downstream.
    pub fn summarize_queues(&self, queues: &[QueueSpec]) -> Result<Vec<QueueSummary>, CondorError> {
        let mut summaries = Vec::with_capacity(queues.len());

        for queue in queues {
            let args = [
                "-totals",
                "-json",
                "-allusers",
                "-constraint",
                queue.constraint.as_str(),
            ];
            let stdout = self.runner.run("condor_q", &args)?;
            let totals = parse_queue_totals(&stdout)
                .map_err(|e| CondorError::Parse(format!("queue {}: {}", queue.name, e)))?;

            summaries.push(QueueSummary {
                name: queue.name.clone(),
                idle: totals.idle,
                running: totals.running,
                held: totals.held,
            });
        }

        Ok(summaries)
    }
}
