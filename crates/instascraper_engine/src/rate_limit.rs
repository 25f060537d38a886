use std::sync::LazyLock;

use regex::Regex;
use scrape_logging::scrape_warn;

use crate::{ClientObserver, EventSink, ScrapeEvent};

static RETRY_NOTICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The request will be retried in ([0-9]+) seconds, at ([0-9:]+)\.")
        .expect("retry notice pattern")
});

/// A provider back-off notice pulled out of a client diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub seconds: u64,
    pub resume_at: String,
}

impl RateLimitSignal {
    pub fn parse(message: &str) -> Option<Self> {
        let caps = RETRY_NOTICE.captures(message)?;
        Some(Self {
            seconds: caps[1].parse().ok()?,
            resume_at: caps[2].to_string(),
        })
    }

    pub fn user_message(&self) -> String {
        format!(
            "Uh oh, Instagram noticed us! Waiting until {} before continuing...",
            self.resume_at
        )
    }
}

/// Turns the client's retry notices into log events for the UI. Anything
/// else the client reports goes to the diagnostic log only.
pub struct RateLimitObserver<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> RateLimitObserver<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }
}

impl ClientObserver for RateLimitObserver<'_> {
    fn on_client_error(&self, message: &str) {
        match RateLimitSignal::parse(message) {
            Some(signal) => self.sink.emit(ScrapeEvent::Log(signal.user_message())),
            None => scrape_warn!("Scraping client reported: {}", message),
        }
    }
}
