//! In-memory mock filesystem for testing collectors without real `/proc`.

use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory filesystem for testing.
///
/// Stores file contents in memory, allowing tests to simulate various
/// `/proc` and `/etc` states without actual Linux access. Writes performed
/// through [`FileSystem::write_atomic`] land in the same map, so tests can
/// observe what a collector persisted.
#[derive(Debug, Default)]
pub struct MockFs {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Returns the current content of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trip() {
        let mut fs = MockFs::new();
        fs.add_file("/etc/mtab", "/dev/sda1 /home ext4 rw 0 0\n");

        assert!(fs.exists(Path::new("/etc/mtab")));
        assert!(
            fs.read_to_string(Path::new("/etc/mtab"))
                .unwrap()
                .starts_with("/dev/sda1")
        );

        fs.write_atomic(Path::new("/run/state.json"), "{}").unwrap();
        assert_eq!(fs.contents("/run/state.json").unwrap(), "{}");
    }

    #[test]
    fn missing_file_is_not_found() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/proc/diskstats")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
