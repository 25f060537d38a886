use std::fs;
use std::path::{Path, PathBuf};

use instascraper_core::SettingsSnapshot;
use instascraper_engine::AtomicFileWriter;
use scrape_logging::{scrape_error, scrape_info, scrape_warn};
use serde::{Deserialize, Serialize};

const SETTINGS_FILENAME: &str = ".instascraper_settings.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSettings {
    query: String,
    items_per_query: String,
    #[serde(default)]
    scrape_comments: bool,
    #[serde(default)]
    scrape_files: bool,
    #[serde(default)]
    scrape_metadata: bool,
    output_directory: String,
    output_filename: String,
}

impl From<&SettingsSnapshot> for PersistedSettings {
    fn from(settings: &SettingsSnapshot) -> Self {
        Self {
            query: settings.query_text.clone(),
            items_per_query: settings.items_per_query.clone(),
            scrape_comments: settings.scrape_comments,
            scrape_files: settings.scrape_files,
            scrape_metadata: settings.scrape_metadata,
            output_directory: settings.output_directory.clone(),
            output_filename: settings.output_filename.clone(),
        }
    }
}

impl From<PersistedSettings> for SettingsSnapshot {
    fn from(saved: PersistedSettings) -> Self {
        Self {
            query_text: saved.query,
            items_per_query: saved.items_per_query,
            scrape_comments: saved.scrape_comments,
            scrape_files: saved.scrape_files,
            scrape_metadata: saved.scrape_metadata,
            output_directory: saved.output_directory,
            output_filename: saved.output_filename,
        }
    }
}

/// Form defaults for a first launch: results land in `~/Documents` when
/// that folder exists, otherwise in the working directory.
pub(crate) fn default_settings() -> SettingsSnapshot {
    let documents = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Documents"))
        .filter(|dir| dir.is_dir());
    SettingsSnapshot {
        output_directory: documents
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| ".".to_string()),
        ..SettingsSnapshot::default()
    }
}

pub(crate) fn load_settings(settings_dir: &Path) -> Option<SettingsSnapshot> {
    let path = settings_dir.join(SETTINGS_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            scrape_warn!("Failed to read saved settings from {:?}: {}", path, err);
            return None;
        }
    };

    match ron::from_str::<PersistedSettings>(&content) {
        Ok(saved) => {
            scrape_info!("Loaded saved settings from {:?}", path);
            Some(saved.into())
        }
        Err(err) => {
            scrape_warn!("Failed to parse saved settings from {:?}: {}", path, err);
            None
        }
    }
}

pub(crate) fn save_settings(settings_dir: &Path, settings: &SettingsSnapshot) {
    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&PersistedSettings::from(settings), pretty) {
        Ok(text) => text,
        Err(err) => {
            scrape_error!("Failed to serialize settings: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(settings_dir.to_path_buf());
    if let Err(err) = writer.write(SETTINGS_FILENAME, content.as_bytes()) {
        scrape_error!("Failed to save settings to {:?}: {}", settings_dir, err);
    }
}
