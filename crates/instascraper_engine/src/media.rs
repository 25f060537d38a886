use std::path::{Path, PathBuf};

use crate::persist::{AtomicFileWriter, PersistError};

/// Name of the folder holding per-post files: the output filename without
/// its last extension.
pub fn files_folder_name(output_filename: &str) -> String {
    Path::new(output_filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| output_filename.to_string())
}

/// Writes media payloads and metadata documents as `{thread_id}.{ext}`.
pub struct MediaStore {
    writer: AtomicFileWriter,
}

impl MediaStore {
    pub fn new(folder: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(folder),
        }
    }

    pub fn folder(&self) -> &Path {
        self.writer.dir()
    }

    pub fn save_media(
        &self,
        thread_id: &str,
        extension: &str,
        payload: &[u8],
    ) -> Result<PathBuf, PersistError> {
        self.writer.write(&format!("{thread_id}.{extension}"), payload)
    }

    pub fn save_metadata(
        &self,
        thread_id: &str,
        document: &serde_json::Value,
    ) -> Result<PathBuf, PersistError> {
        let content = serde_json::to_vec_pretty(document)?;
        self.writer.write(&format!("{thread_id}.json"), &content)
    }
}
