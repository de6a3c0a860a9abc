//! Scripted command runner for testing subprocess-backed collectors.

use crate::collector::traits::{CommandError, CommandRunner};
use std::io;
use std::sync::Mutex;

/// A scripted [`CommandRunner`] double.
///
/// Responses are registered against a substring of the full command line
/// (program plus arguments joined with spaces); the first matching entry
/// wins. Command lines with no matching entry behave like a missing
/// program. All invocations are recorded for assertions.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: Vec<(String, Result<String, i32>)>,
    calls: Mutex<Vec<String>>,
}

impl MockRunner {
    /// Creates a new runner with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers stdout for command lines containing `pattern`.
    pub fn expect(&mut self, pattern: impl Into<String>, stdout: impl Into<String>) {
        self.responses.push((pattern.into(), Ok(stdout.into())));
    }

    /// Registers a non-zero exit for command lines containing `pattern`.
    pub fn expect_failure(&mut self, pattern: impl Into<String>, code: i32) {
        self.responses.push((pattern.into(), Err(code)));
    }

    /// Returns the full command lines run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let mut cmdline = program.to_string();
        for arg in args {
            cmdline.push(' ');
            cmdline.push_str(arg);
        }
        self.calls.lock().unwrap().push(cmdline.clone());

        for (pattern, response) in &self.responses {
            if cmdline.contains(pattern.as_str()) {
                return match response {
                    Ok(stdout) => Ok(stdout.clone()),
                    Err(code) => Err(CommandError::Failed {
                        program: program.to_string(),
                        code: Some(*code),
                        stderr: String::new(),
                    }),
                };
            }
        }

        Err(CommandError::Launch(
            program.to_string(),
            io::Error::new(io::ErrorKind::NotFound, "no scripted response"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_by_substring_and_records_calls() {
        let mut runner = MockRunner::new();
        runner.expect("who", "alice pts/0\n");

        let out = runner.run("who", &[]).unwrap();
        assert_eq!(out, "alice pts/0\n");
        assert_eq!(runner.calls(), vec!["who".to_string()]);
    }

    #[test]
    fn unmatched_command_fails_to_launch() {
        let runner = MockRunner::new();
        let err = runner.run("condor_q", &["-allusers"]).unwrap_err();
        assert!(matches!(err, CommandError::Launch(_, _)));
    }

    #[test]
    fn scripted_failure_reports_exit_code() {
        let mut runner = MockRunner::new();
        runner.expect_failure("condor_q", 1);

        let err = runner.run("condor_q", &["-totals"]).unwrap_err();
        match err {
            CommandError::Failed { code, .. } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {}", other),
        }
    }
}
