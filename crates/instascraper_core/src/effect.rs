use std::path::PathBuf;

/// Everything the worker needs for one run.
pub type ScrapeRequest = instascraper_engine::ScrapeConfiguration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartScrape(ScrapeRequest),
    StopScrape,
    ExportResults { destination: PathBuf },
    /// Re-export the results kept from the last finished run.
    RetryExport { destination: PathBuf },
    PersistSettings(crate::SettingsSnapshot),
}
