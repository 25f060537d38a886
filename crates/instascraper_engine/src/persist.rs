use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("metadata encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure a directory exists, creating it if missing, and that it accepts new files.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    check_writable(dir)
}

/// Check that an existing directory accepts new files. Never creates `dir`.
pub fn check_writable(dir: &Path) -> Result<(), PersistError> {
    if !dir.is_dir() {
        return Err(PersistError::OutputDir(format!(
            "{} is not an existing directory",
            dir.display()
        )));
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // A re-run of the same scrape overwrites earlier files.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
