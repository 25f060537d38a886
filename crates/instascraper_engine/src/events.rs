use std::sync::mpsc;

use crate::ScrapeEvent;

/// Receiver side of worker notifications.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ScrapeEvent);
}

/// Unbounded FIFO hand-off to a single consumer, typically the UI loop.
pub struct ChannelEventSink {
    tx: mpsc::Sender<ScrapeEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<ScrapeEvent>) -> Self {
        Self { tx }
    }

    /// Builds a sink together with the receiver the UI should drain.
    pub fn pair() -> (Self, mpsc::Receiver<ScrapeEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ScrapeEvent) {
        // A closed receiver means the UI is gone; nothing left to notify.
        let _ = self.tx.send(event);
    }
}
