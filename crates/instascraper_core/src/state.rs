use std::path::PathBuf;

use instascraper_engine::{parse_queries, ScrapeConfiguration};

use crate::view_model::{AppViewModel, ProgressView};
use crate::ScrapeRequest;

pub const DEFAULT_ITEMS_PER_QUERY: usize = ScrapeConfiguration::DEFAULT_MAX_ITEMS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scraping,
    /// Stop requested; waiting for the worker to be joined.
    Stopping,
}

/// The user-editable form, as persisted between launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub query_text: String,
    pub items_per_query: String,
    pub scrape_comments: bool,
    pub scrape_files: bool,
    pub scrape_metadata: bool,
    pub output_directory: String,
    pub output_filename: String,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            query_text: "#blessed\n@djkhaled".to_string(),
            items_per_query: DEFAULT_ITEMS_PER_QUERY.to_string(),
            scrape_comments: false,
            scrape_files: false,
            scrape_metadata: false,
            output_directory: ".".to_string(),
            output_filename: "instagram-scrape.csv".to_string(),
        }
    }
}

impl SettingsSnapshot {
    pub fn export_path(&self) -> PathBuf {
        PathBuf::from(&self.output_directory).join(&self.output_filename)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    form: SettingsSnapshot,
    session: SessionState,
    log_lines: Vec<String>,
    progress: ProgressView,
    export_retry_available: bool,
    quit_requested: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(form: SettingsSnapshot) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            form: self.form.clone(),
            form_enabled: self.session == SessionState::Idle,
            scrape_button_label: match self.session {
                SessionState::Idle => "Scrape!",
                SessionState::Scraping => "Stop scraping",
                SessionState::Stopping => "Stopping...",
            },
            log_lines: self.log_lines.clone(),
            progress: self.progress,
            export_retry_available: self.export_retry_available,
            quit_requested: self.quit_requested,
            dirty: self.dirty,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn settings(&self) -> &SettingsSnapshot {
        &self.form
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn form_mut(&mut self) -> Option<&mut SettingsSnapshot> {
        if self.session != SessionState::Idle {
            return None;
        }
        self.dirty = true;
        Some(&mut self.form)
    }

    pub(crate) fn replace_form(&mut self, form: SettingsSnapshot) {
        self.form = form;
        self.dirty = true;
    }

    pub(crate) fn log(&mut self, line: impl Into<String>) {
        self.log_lines.push(line.into());
        self.dirty = true;
    }

    pub(crate) fn set_progress(&mut self, progress: ProgressView) {
        self.progress = progress;
        self.dirty = true;
    }

    pub(crate) fn set_session(&mut self, session: SessionState) {
        self.session = session;
        if session == SessionState::Idle {
            self.progress = ProgressView::Disabled;
        }
        self.dirty = true;
    }

    pub(crate) fn export_retry_available(&self) -> bool {
        self.export_retry_available
    }

    pub(crate) fn set_export_retry_available(&mut self, available: bool) {
        self.export_retry_available = available;
        self.dirty = true;
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn request_quit(&mut self) {
        self.quit_requested = true;
        self.dirty = true;
    }

    /// Builds the run configuration from the form. An unusable item count
    /// falls back to the default and the field is rewritten to show it;
    /// unusable query tokens are logged and left out.
    pub(crate) fn take_scrape_request(&mut self) -> ScrapeRequest {
        let max_items = match self.form.items_per_query.trim().parse::<usize>() {
            Ok(count) if count > 0 => count,
            _ => {
                self.form.items_per_query = DEFAULT_ITEMS_PER_QUERY.to_string();
                DEFAULT_ITEMS_PER_QUERY
            }
        };

        let parsed = parse_queries(&self.form.query_text);
        for (token, err) in &parsed.rejected {
            self.log(format!("Skipping query '{token}': {err}"));
        }

        ScrapeConfiguration {
            queries: parsed.queries,
            max_items_per_query: max_items,
            scrape_comments: self.form.scrape_comments,
            scrape_files: self.form.scrape_files,
            scrape_metadata: self.form.scrape_metadata,
            output_directory: PathBuf::from(&self.form.output_directory),
            output_filename: self.form.output_filename.clone(),
        }
    }
}
