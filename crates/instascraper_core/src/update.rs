use crate::view_model::ProgressView;
use crate::{AppState, Effect, ExportReport, Msg, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::QueryChanged(text) => edit_form(&mut state, |form| form.query_text = text),
        Msg::ItemsPerQueryChanged(text) => {
            edit_form(&mut state, |form| form.items_per_query = text)
        }
        Msg::CommentsToggled(on) => edit_form(&mut state, |form| form.scrape_comments = on),
        Msg::FilesToggled(on) => edit_form(&mut state, |form| form.scrape_files = on),
        Msg::MetadataToggled(on) => edit_form(&mut state, |form| form.scrape_metadata = on),
        Msg::OutputDirChanged(dir) => edit_form(&mut state, |form| form.output_directory = dir),
        Msg::OutputFilenameChanged(name) => {
            edit_form(&mut state, |form| form.output_filename = name)
        }
        Msg::RestoreSettings(settings) => {
            if state.session() == SessionState::Idle {
                state.replace_form(settings);
            }
            Vec::new()
        }
        Msg::ScrapeButtonClicked => match state.session() {
            SessionState::Idle => start_scrape(&mut state),
            SessionState::Scraping => request_stop(&mut state),
            SessionState::Stopping => Vec::new(),
        },
        Msg::ScrapeRejected(reason) => {
            state.log(reason);
            state.set_session(SessionState::Idle);
            Vec::new()
        }
        Msg::ScrapeLog(line) => {
            state.log(line);
            Vec::new()
        }
        Msg::ScrapeProgress(value) => {
            if state.session() == SessionState::Scraping {
                let progress = if value < 0.0 {
                    ProgressView::Pulsing
                } else {
                    ProgressView::Fraction(value.min(1.0))
                };
                state.set_progress(progress);
            }
            Vec::new()
        }
        Msg::ScrapeFinished => {
            if state.session() == SessionState::Scraping {
                state.log("Writing results to file...");
                vec![Effect::ExportResults {
                    destination: state.settings().export_path(),
                }]
            } else {
                Vec::new()
            }
        }
        Msg::ScrapeInterrupted => {
            // A stop we asked for is finished off by `ScrapeStopped`.
            if state.session() == SessionState::Scraping {
                state.log("Scrape interrupted");
                state.set_session(SessionState::Idle);
            }
            Vec::new()
        }
        Msg::ScrapeStopped => {
            if state.session() == SessionState::Stopping {
                state.log("Scrape stopped.");
                state.set_session(SessionState::Idle);
            }
            Vec::new()
        }
        Msg::ExportCompleted(report) => {
            apply_export_report(&mut state, report);
            Vec::new()
        }
        Msg::RetryExportClicked => {
            if state.session() == SessionState::Idle && state.export_retry_available() {
                state.log("Writing results to file...");
                vec![Effect::RetryExport {
                    destination: state.settings().export_path(),
                }]
            } else {
                Vec::new()
            }
        }
        Msg::QuitRequested => {
            if state.quit_requested() {
                return (state, Vec::new());
            }
            state.request_quit();
            if state.session() == SessionState::Scraping {
                request_stop(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn edit_form(
    state: &mut AppState,
    edit: impl FnOnce(&mut crate::SettingsSnapshot),
) -> Vec<Effect> {
    if let Some(form) = state.form_mut() {
        edit(form);
    }
    Vec::new()
}

fn start_scrape(state: &mut AppState) -> Vec<Effect> {
    state.set_export_retry_available(false);
    let request = state.take_scrape_request();
    state.log("Scrape started");
    state.set_session(SessionState::Scraping);
    state.set_progress(ProgressView::Pulsing);
    vec![
        Effect::PersistSettings(state.settings().clone()),
        Effect::StartScrape(request),
    ]
}

fn request_stop(state: &mut AppState) -> Vec<Effect> {
    state.log("Scrape interrupted");
    state.log("Waiting for scrape to stop...");
    state.set_session(SessionState::Stopping);
    vec![Effect::StopScrape]
}

fn apply_export_report(state: &mut AppState, report: ExportReport) {
    match report {
        ExportReport::NoResults => {
            state.log("No results!");
            state.set_export_retry_available(false);
        }
        ExportReport::Written { path, .. } => {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            state.log(format!("Done! Results written to {filename}"));
            state.set_export_retry_available(false);
        }
        ExportReport::Failed { .. } => {
            state.log("Could not create file. Try writing to another directory.");
            state.set_export_retry_available(true);
        }
    }
    state.set_session(SessionState::Idle);
}
