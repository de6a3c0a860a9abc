//! Abstractions for filesystem and subprocess access to enable testing and mocking.
//!
//! The `FileSystem` trait allows collectors to work with the real `/proc` and
//! `/etc` files on Linux or with in-memory doubles in tests. The
//! `CommandRunner` trait does the same for external query commands
//! (`condor_q`, `who`, `kubectl`, ...).

use std::io;
use std::path::Path;
use std::process::Command;

/// Abstraction for filesystem operations.
///
/// Collectors read proc/etc files and persist collector state through this
/// trait, so tests can substitute an in-memory implementation.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Writes a file atomically: the content lands under `path` either
    /// completely or not at all, never as a partial file.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        // Write to a sibling temp file, then rename over the target. Rename
        // within one filesystem is atomic, so readers never observe a torn
        // file even if we crash mid-write.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)
    }
}

/// Error type for external command invocation.
#[derive(Debug)]
pub enum CommandError {
    /// The command could not be launched (not installed, permissions, ...).
    Launch(String, io::Error),
    /// The command ran but exited non-zero.
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Launch(program, e) => {
                write!(f, "failed to launch {}: {}", program, e)
            }
            CommandError::Failed {
                program,
                code,
                stderr,
            } => match code {
                Some(code) => write!(f, "{} exited with code {}: {}", program, code, stderr),
                None => write!(f, "{} terminated by signal: {}", program, stderr),
            },
        }
    }
}

impl std::error::Error for CommandError {}

/// Abstraction for running external query commands.
///
/// Implementations run the program to completion and return its stdout.
/// A non-zero exit status is an error, not empty output, so callers can
/// distinguish "the query matched nothing" from "the query failed".
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and returns its stdout as a string.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

/// Real command runner that spawns blocking subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealRunner;

impl RealRunner {
    /// Creates a new `RealRunner` instance.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| CommandError::Launch(program.to_string(), e))?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_real_fs_write_atomic_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let fs = RealFs::new();
        fs.write_atomic(&path, "{\"sent\":1}").unwrap();

        assert!(fs.exists(&path));
        assert_eq!(fs.read_to_string(&path).unwrap(), "{\"sent\":1}");
        // No temp file left behind.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_real_fs_read_missing_file() {
        let fs = RealFs::new();
        assert!(
            fs.read_to_string(Path::new("/nonexistent/path/12345"))
                .is_err()
        );
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn test_real_runner_missing_program() {
        let runner = RealRunner::new();
        let err = runner.run("afmon-no-such-program-12345", &[]).unwrap_err();
        assert!(matches!(err, CommandError::Launch(_, _)));
    }
}
