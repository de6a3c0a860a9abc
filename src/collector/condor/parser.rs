//! Parsers for batch-scheduler query output.
//!
//! `condor_q`/`condor_history` are invoked with a fixed positional field
//! template, so their output is line-oriented whitespace-separated columns.
//! The JSON totals query is parsed with serde_json. All parsers here are
//! pure functions over the captured stdout.

use serde::Serialize;
use tracing::warn;

use crate::collector::ParseError;

/// Normalized scheduler job state.
///
/// The numeric status codes come from a closed lookup table; anything the
/// table does not know maps to [`JobState::Unknown`] rather than failing,
/// so a scheduler upgrade cannot break collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unexpanded,
    Idle,
    Running,
    Removed,
    Finished,
    Held,
    SubmissionErr,
    Unknown,
}

impl JobState {
    /// Maps a scheduler status code to a job state.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => JobState::Unexpanded,
            1 => JobState::Idle,
            2 => JobState::Running,
            3 => JobState::Removed,
            4 => JobState::Finished,
            5 => JobState::Held,
            6 => JobState::SubmissionErr,
            _ => JobState::Unknown,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Unexpanded => "unexpanded",
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Removed => "removed",
            JobState::Finished => "finished",
            JobState::Held => "held",
            JobState::SubmissionErr => "submission_err",
            JobState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One normalized job row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    /// Job owner (unix account).
    #[serde(rename = "users")]
    pub owner: String,
    /// `<cluster>.<proc>` job identifier.
    #[serde(rename = "jobid")]
    pub job_id: String,
    /// Accumulated wall-clock runtime in seconds.
    #[serde(rename = "runtime")]
    pub runtime_secs: i64,
    /// Normalized job state.
    pub state: JobState,
}

/// Parses line-oriented job-query output.
///
/// Expected columns per line: owner, cluster id (the field template emits a
/// trailing dot), proc id, runtime seconds, and — when `default_state` is
/// `None` — a numeric status code. With a `default_state` (history queries,
/// where the state is part of the query constraint) the status column is
/// absent and every record gets that state.
///
/// Malformed lines (wrong column count, non-numeric numbers) are dropped
/// with a warning; one bad line never aborts the batch.
pub fn parse_job_listing(content: &str, default_state: Option<JobState>) -> Vec<JobRecord> {
    let mut records = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_job_line(line, default_state) {
            Ok(record) => records.push(record),
            Err(e) => warn!("dropping malformed job line {:?}: {}", line, e),
        }
    }

    records
}

fn parse_job_line(line: &str, default_state: Option<JobState>) -> Result<JobRecord, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let expected = if default_state.is_some() { 4 } else { 5 };
    if fields.len() != expected {
        return Err(ParseError::new(format!(
            "expected {} fields, got {}",
            expected,
            fields.len()
        )));
    }

    let owner = fields[0].to_string();
    let cluster: u64 = fields[1]
        .trim_end_matches('.')
        .parse()
        .map_err(|_| ParseError::new("invalid cluster id"))?;
    let proc: u64 = fields[2]
        .parse()
        .map_err(|_| ParseError::new("invalid proc id"))?;
    let runtime_secs: i64 = fields[3]
        .parse()
        .map_err(|_| ParseError::new("invalid runtime"))?;

    let state = match default_state {
        Some(state) => state,
        None => {
            let code: i64 = fields[4]
                .parse()
                .map_err(|_| ParseError::new("invalid status code"))?;
            JobState::from_code(code)
        }
    };

    Ok(JobRecord {
        owner,
        job_id: format!("{}.{}", cluster, proc),
        runtime_secs,
        state,
    })
}

/// Aggregate counts extracted from one JSON totals query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueTotals {
    pub idle: i64,
    pub running: i64,
    pub held: i64,
}

/// Parses the JSON totals output of a summary query.
///
/// The scheduler emits a JSON array whose first element carries the
/// aggregate `Idle`/`Running`/`Held` integers. A missing count field reads
/// as zero; an empty array or non-array output is an error.
pub fn parse_queue_totals(content: &str) -> Result<QueueTotals, ParseError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ParseError::new(format!("invalid totals JSON: {}", e)))?;

    let first = value
        .as_array()
        .and_then(|rows| rows.first())
        .ok_or_else(|| ParseError::new("totals JSON has no aggregate row"))?;

    let count = |key: &str| -> i64 { first.get(key).and_then(|v| v.as_i64()).unwrap_or(0) };

    Ok(QueueTotals {
        idle: count("Idle"),
        running: count("Running"),
        held: count("Held"),
    })
}
