use crate::{SessionState, SettingsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ProgressView {
    #[default]
    Disabled,
    Pulsing,
    /// Completed share of the enumeration phase, `0.0..=1.0`.
    Fraction(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub form: SettingsSnapshot,
    pub form_enabled: bool,
    pub scrape_button_label: &'static str,
    pub log_lines: Vec<String>,
    pub progress: ProgressView,
    pub export_retry_available: bool,
    pub quit_requested: bool,
    pub dirty: bool,
}

impl AppViewModel {
    /// Nothing left to do: idle, and either asked to quit or without a
    /// failed export the user may still retry.
    pub fn finished(&self) -> bool {
        self.session == SessionState::Idle && (self.quit_requested || !self.export_retry_available)
    }
}
