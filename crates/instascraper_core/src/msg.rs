use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Free text with `#tag` / `@handle` tokens.
    QueryChanged(String),
    ItemsPerQueryChanged(String),
    CommentsToggled(bool),
    FilesToggled(bool),
    MetadataToggled(bool),
    OutputDirChanged(String),
    OutputFilenameChanged(String),
    /// The single start/stop button.
    ScrapeButtonClicked,
    /// The run could not be started, e.g. the destination is not writable.
    ScrapeRejected(String),
    ScrapeLog(String),
    /// Negative means indeterminate.
    ScrapeProgress(f64),
    ScrapeFinished,
    ScrapeInterrupted,
    /// The worker has been joined after a stop request.
    ScrapeStopped,
    ExportCompleted(ExportReport),
    RetryExportClicked,
    QuitRequested,
    RestoreSettings(crate::SettingsSnapshot),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReport {
    NoResults,
    Written { path: PathBuf, rows: usize },
    Failed { reason: String },
}
