//! Result table writer.
//!
//! The dialect is fixed by the spreadsheet tools the table is imported into:
//! comma separated, every field quoted, quotes escaped with a backslash
//! rather than doubled, bare `\n` line endings. Backslashes are escaped as
//! well so that a file re-parses to exactly the values that were written.

use std::fs::{File, Permissions};
use std::io;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use tempfile::NamedTempFile;

use crate::record::{ResultRecord, BASE_COLUMNS, METADATA_FILE_COLUMN, PHOTO_FILE_COLUMN};

const ESCAPE: u8 = b'\\';

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no records to export")]
    NoRecords,
    #[error("could not create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<&'static str>,
}

/// One parsed row as ordered `(column, value)` pairs.
pub type ExportedRow = Vec<(String, String)>;

/// Header for a record set: the union of every record's columns, in
/// canonical order, so rows with extra file columns are never truncated.
pub fn export_header(records: &[ResultRecord]) -> Vec<&'static str> {
    let photo = records.iter().any(|r| r.photo_file.is_some());
    let metadata = records.iter().any(|r| r.metadata_file.is_some());
    let mut header = BASE_COLUMNS.to_vec();
    if photo {
        header.push(PHOTO_FILE_COLUMN);
    }
    if metadata {
        header.push(METADATA_FILE_COLUMN);
    }
    header
}

/// Writes `records` to `destination`. The parent directory must already
/// exist; the file appears only once it is complete.
pub fn export_records(
    destination: &Path,
    records: &[ResultRecord],
) -> Result<ExportSummary, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }
    let create_error = |source: io::Error| ExportError::Create {
        path: destination.to_path_buf(),
        source,
    };
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let existing = match std::fs::metadata(destination) {
        Ok(meta) => Some(meta.permissions()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => return Err(create_error(err)),
    };
    if existing.as_ref().is_some_and(Permissions::readonly) {
        return Err(create_error(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "destination file is read-only",
        )));
    }
    let mut tmp = NamedTempFile::new_in(dir).map_err(create_error)?;

    let header = export_header(records);
    {
        let mut writer = dialect_writer().from_writer(tmp.as_file_mut());
        writer.write_record(header.iter().map(|column| escape_backslashes(column)))?;
        for record in records {
            writer.write_record(header.iter().map(|column| {
                escape_backslashes(&record.value(column).unwrap_or_default())
            }))?;
        }
        writer.flush()?;
    }
    tmp.as_file_mut().sync_all()?;
    let permissions = match existing {
        Some(permissions) => permissions,
        None => new_file_permissions(&tmp)?,
    };
    std::fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(destination)
        .map_err(|err| create_error(err.error))?;

    Ok(ExportSummary {
        path: destination.to_path_buf(),
        rows: records.len(),
        columns: header,
    })
}

/// Parses a file written by [`export_records`] back into rows.
pub fn read_records(path: &Path) -> Result<Vec<ExportedRow>, ExportError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .quote(b'"')
        .double_quote(false)
        .escape(Some(ESCAPE))
        .terminator(Terminator::Any(b'\n'))
        .has_headers(true)
        .from_reader(file);

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(
            header
                .iter()
                .cloned()
                .zip(row.iter().map(str::to_string))
                .collect(),
        );
    }
    Ok(rows)
}

/// Mode for a freshly created export; the temp file itself is private.
#[cfg(unix)]
fn new_file_permissions(_tmp: &NamedTempFile) -> io::Result<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions(tmp: &NamedTempFile) -> io::Result<Permissions> {
    Ok(tmp.as_file().metadata()?.permissions())
}

fn dialect_writer() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote(b'"')
        .quote_style(QuoteStyle::Always)
        .double_quote(false)
        .escape(ESCAPE)
        .terminator(Terminator::Any(b'\n'));
    builder
}

fn escape_backslashes(value: &str) -> String {
    value.replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backslash_escaping_doubles_only_backslashes() {
        assert_eq!(escape_backslashes(r"C:\data"), r"C:\\data");
        assert_eq!(escape_backslashes("say \"hi\""), "say \"hi\"");
    }

    #[test]
    fn empty_record_set_is_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = export_records(&temp.path().join("out.csv"), &[]);
        assert!(matches!(result, Err(ExportError::NoRecords)));
        assert!(!temp.path().join("out.csv").exists());
    }
}
