use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use instascraper_core::{Effect, ExportReport, Msg, ScrapeRequest};
use instascraper_engine::{
    check_writable, export_records, ChannelEventSink, ExportError, PostSource, ResultRecord,
    ScrapeEvent, ScrapeHandle, ScrapeStatus,
};
use scrape_logging::{scrape_info, scrape_warn};

use super::persistence;

pub struct EffectRunner {
    msg_tx: mpsc::Sender<Msg>,
    source: Arc<dyn PostSource>,
    settings_dir: PathBuf,
    scrape: Option<ScrapeHandle>,
    /// Results of the last finished run, kept for a retried export.
    last_results: Vec<ResultRecord>,
}

impl EffectRunner {
    pub fn new(
        msg_tx: mpsc::Sender<Msg>,
        source: Arc<dyn PostSource>,
        settings_dir: PathBuf,
    ) -> Self {
        Self {
            msg_tx,
            source,
            settings_dir,
            scrape: None,
            last_results: Vec::new(),
        }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistSettings(settings) => {
                    persistence::save_settings(&self.settings_dir, &settings);
                }
                Effect::StartScrape(request) => self.start(request),
                Effect::StopScrape => self.stop(),
                Effect::ExportResults { destination } => {
                    self.last_results = self.collect_results();
                    self.export(&destination);
                }
                Effect::RetryExport { destination } => self.export(&destination),
            }
        }
    }

    /// Cancels and joins a run that is still active.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.scrape.take() {
            handle.cancel();
            handle.join();
        }
    }

    fn start(&mut self, request: ScrapeRequest) {
        if let Err(err) = check_writable(&request.output_directory) {
            scrape_warn!("Refusing to start scrape: {}", err);
            self.send(Msg::ScrapeRejected(format!(
                "Cannot write to {}. Choose another output directory.",
                request.output_directory.display()
            )));
            return;
        }

        scrape_info!(
            "Starting scrape of {} queries, {} posts each",
            request.queries.len(),
            request.max_items_per_query
        );
        self.last_results.clear();
        let (sink, events) = ChannelEventSink::pair();
        self.spawn_event_forwarder(events);
        self.scrape = Some(ScrapeHandle::start(
            request,
            self.source.clone(),
            Arc::new(sink),
        ));
    }

    fn stop(&mut self) {
        match self.scrape.take() {
            Some(handle) => {
                handle.cancel();
                let msg_tx = self.msg_tx.clone();
                thread::spawn(move || {
                    handle.join();
                    let _ = msg_tx.send(Msg::ScrapeStopped);
                });
            }
            None => self.send(Msg::ScrapeStopped),
        }
    }

    fn collect_results(&mut self) -> Vec<ResultRecord> {
        self.scrape
            .take()
            .and_then(|handle| handle.join().into_records())
            .unwrap_or_default()
    }

    fn export(&self, destination: &Path) {
        let report = match export_records(destination, &self.last_results) {
            Ok(summary) => {
                scrape_info!(
                    "Wrote {} rows with {} columns to {:?}",
                    summary.rows,
                    summary.columns.len(),
                    summary.path
                );
                ExportReport::Written {
                    path: summary.path,
                    rows: summary.rows,
                }
            }
            Err(ExportError::NoRecords) => ExportReport::NoResults,
            Err(err) => {
                scrape_warn!("Export to {:?} failed: {}", destination, err);
                ExportReport::Failed {
                    reason: err.to_string(),
                }
            }
        };
        self.send(Msg::ExportCompleted(report));
    }

    fn spawn_event_forwarder(&self, events: mpsc::Receiver<ScrapeEvent>) {
        let msg_tx = self.msg_tx.clone();
        // Ends once the worker drops its sink.
        thread::spawn(move || {
            for event in events {
                if msg_tx.send(map_event(event)).is_err() {
                    break;
                }
            }
        });
    }

    fn send(&self, msg: Msg) {
        let _ = self.msg_tx.send(msg);
    }
}

fn map_event(event: ScrapeEvent) -> Msg {
    match event {
        ScrapeEvent::Log(line) => Msg::ScrapeLog(line),
        ScrapeEvent::Progress(value) => Msg::ScrapeProgress(value),
        ScrapeEvent::Status(ScrapeStatus::Done) => Msg::ScrapeFinished,
        ScrapeEvent::Status(ScrapeStatus::Interrupted) => Msg::ScrapeInterrupted,
    }
}
