//! File-backed classification log.

use super::ClassLog;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Appends labels to a text file, opening it for every write.
///
/// Holding no handle between writes lets the file be rotated or removed
/// while the agent runs.
#[derive(Debug, Clone)]
pub struct FileClassLog {
    path: PathBuf,
}

impl FileClassLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ClassLog for FileClassLog {
    fn append_label(&mut self, label: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{label}")
    }
}
