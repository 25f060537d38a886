use std::fmt;
use std::path::PathBuf;

use crate::query::Query;
use crate::record::ResultRecord;

/// Progress value that tells the UI to pulse instead of showing a fraction.
pub const INDETERMINATE_PROGRESS: f64 = -1.0;

/// Notification sent from the worker to the UI, consumed once and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    Log(String),
    /// Completed fraction in `0.0..=1.0`; negative means indeterminate.
    Progress(f64),
    Status(ScrapeStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Done,
    Interrupted,
}

/// Immutable parameters of a single scrape run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfiguration {
    pub queries: Vec<Query>,
    pub max_items_per_query: usize,
    pub scrape_comments: bool,
    pub scrape_files: bool,
    pub scrape_metadata: bool,
    pub output_directory: PathBuf,
    pub output_filename: String,
}

impl ScrapeConfiguration {
    pub const DEFAULT_MAX_ITEMS: usize = 50;

    /// Where the export writer puts the result table.
    pub fn export_path(&self) -> PathBuf {
        self.output_directory.join(&self.output_filename)
    }

    /// Folder for per-post media and metadata files.
    pub fn files_folder(&self) -> PathBuf {
        self.output_directory
            .join(crate::media::files_folder_name(&self.output_filename))
    }

    pub fn captures_files(&self) -> bool {
        self.scrape_files || self.scrape_metadata
    }
}

/// Result of joining a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Completed(Vec<ResultRecord>),
    Interrupted,
}

impl ScrapeOutcome {
    pub fn into_records(self) -> Option<Vec<ResultRecord>> {
        match self {
            ScrapeOutcome::Completed(records) => Some(records),
            ScrapeOutcome::Interrupted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    NotFound,
    Network,
    HttpStatus(u16),
    RateLimited,
    Parse,
    RunFailed(String),
    TooLarge { max_bytes: u64, actual: Option<u64> },
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::NotFound => write!(f, "not found"),
            ProviderErrorKind::Network => write!(f, "network error"),
            ProviderErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            ProviderErrorKind::RateLimited => write!(f, "rate limited"),
            ProviderErrorKind::Parse => write!(f, "unexpected response shape"),
            ProviderErrorKind::RunFailed(status) => write!(f, "provider run ended as {status}"),
            ProviderErrorKind::TooLarge { max_bytes, actual } => {
                write!(f, "payload too large (max {max_bytes}, actual {actual:?})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(filename: &str) -> ScrapeConfiguration {
        ScrapeConfiguration {
            queries: Vec::new(),
            max_items_per_query: 5,
            scrape_comments: false,
            scrape_files: false,
            scrape_metadata: true,
            output_directory: PathBuf::from("/data"),
            output_filename: filename.to_string(),
        }
    }

    #[test]
    fn paths_derive_from_output_fields() {
        let config = config("instagram-scrape.csv");
        assert_eq!(config.export_path(), PathBuf::from("/data/instagram-scrape.csv"));
        assert_eq!(config.files_folder(), PathBuf::from("/data/instagram-scrape"));
        assert!(config.captures_files());
    }

    #[test]
    fn provider_error_display_includes_kind() {
        let err = ProviderError::new(ProviderErrorKind::HttpStatus(503), "busy");
        assert_eq!(err.to_string(), "http status 503: busy");
    }
}
