//! Instascraper core: pure controller state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, ScrapeRequest};
pub use msg::{ExportReport, Msg};
pub use state::{AppState, SessionState, SettingsSnapshot, DEFAULT_ITEMS_PER_QUERY};
pub use update::update;
pub use view_model::{AppViewModel, ProgressView};
